use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context;
use keymap_compiler::{
    compile_and_validate, compile_with_options, extract_preserved_blocks, CompileError,
    CompileOptions, CompiledConfig, EngineValidator, PreservedBlock, DEFAULT_ONE_SHOT_TIMEOUT_MS,
};
use keymap_schema::{LeaderKeyPreference, Milliseconds, PhysicalLayout, RuleCollection};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// User preferences that shape a compile. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub leader_key: Option<LeaderKeyPreference>,
    pub physical_layout: PhysicalLayout,
    pub allow_conflicts: bool,
    pub one_shot_timeout_ms: Milliseconds,
    pub process_unmapped_keys: bool,
    pub engine_binary: Option<PathBuf>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            leader_key: None,
            physical_layout: PhysicalLayout::default(),
            allow_conflicts: false,
            one_shot_timeout_ms: DEFAULT_ONE_SHOT_TIMEOUT_MS,
            process_unmapped_keys: true,
            engine_binary: None,
        }
    }
}

impl Preferences {
    pub fn compile_options(&self, preserved_blocks: Vec<PreservedBlock>) -> CompileOptions {
        CompileOptions {
            leader_key: self.leader_key.clone(),
            physical_layout: self.physical_layout.clone(),
            allow_conflicts: self.allow_conflicts,
            one_shot_timeout_ms: self.one_shot_timeout_ms,
            process_unmapped_keys: self.process_unmapped_keys,
            preserved_blocks,
        }
    }
}

fn read_input(path: &Path, what: &str) -> anyhow::Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        CompileError::new("E3001", format!("failed to read {what}: {e}"))
            .with_context(path.display().to_string())
            .into()
    })
}

fn json_error(what: &str, e: &serde_json::Error) -> CompileError {
    CompileError::new("E3002", format!("invalid {what} json: {e}")).with_line(e.line())
}

pub fn load_collections_from_path(path: impl AsRef<Path>) -> anyhow::Result<Vec<RuleCollection>> {
    let path = path.as_ref();
    let bytes = read_input(path, "collections")?;
    let collections: Vec<RuleCollection> = serde_json::from_slice(&bytes)
        .map_err(|e| json_error("collections", &e))
        .with_context(|| format!("failed to load collections: {}", path.display()))?;
    debug!(count = collections.len(), path = %path.display(), "collections loaded");
    Ok(collections)
}

pub fn load_collections_from_str(json: &str) -> anyhow::Result<Vec<RuleCollection>> {
    let collections: Vec<RuleCollection> =
        serde_json::from_str(json).map_err(|e| json_error("collections", &e))?;
    Ok(collections)
}

pub fn load_preferences_from_path(path: impl AsRef<Path>) -> anyhow::Result<Preferences> {
    let path = path.as_ref();
    let bytes = read_input(path, "preferences")?;
    let prefs: Preferences = serde_json::from_slice(&bytes)
        .map_err(|e| json_error("preferences", &e))
        .with_context(|| format!("failed to load preferences: {}", path.display()))?;
    Ok(prefs)
}

pub fn load_preferences_from_str(json: &str) -> anyhow::Result<Preferences> {
    let prefs: Preferences =
        serde_json::from_str(json).map_err(|e| json_error("preferences", &e))?;
    Ok(prefs)
}

/// Preserved sections of a previously generated config. A missing file has
/// none.
pub fn read_preserved_blocks(path: impl AsRef<Path>) -> anyhow::Result<Vec<PreservedBlock>> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(text) => Ok(extract_preserved_blocks(&text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).with_context(|| format!("failed to read existing config: {}", path.display())),
    }
}

/// Compiles and, only on success, writes the config to `output`. Preserved
/// sections of the file being replaced are carried over.
pub fn save_config(
    collections: &[RuleCollection],
    prefs: &Preferences,
    output: impl AsRef<Path>,
    validator: Option<&dyn EngineValidator>,
) -> anyhow::Result<CompiledConfig> {
    let output = output.as_ref();
    let options = prefs.compile_options(read_preserved_blocks(output)?);
    let compiled = match validator {
        Some(v) => compile_and_validate(collections, &options, v),
        None => compile_with_options(collections, &options),
    }
    .map_err(|e| anyhow::anyhow!(e.to_string()))
    .with_context(|| format!("not writing {}", output.display()))?;

    fs::write(output, &compiled.text)
        .with_context(|| format!("failed to write: {}", output.display()))?;
    debug!(path = %output.display(), bytes = compiled.text.len(), "config written");
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("keymap_loader_{name}_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    const COLLECTIONS: &str = r#"[
  {
    "id": "vim",
    "name": "Vim Navigation",
    "target_layer": "nav",
    "mappings": [{ "input": "h", "output": "left" }],
    "momentary_activator": { "input": "space", "source_layer": "base", "target_layer": "nav" }
  }
]"#;

    #[test]
    fn preferences_default_every_field() {
        let prefs = load_preferences_from_str("{}").unwrap();
        assert_eq!(prefs, Preferences::default());
        assert!(prefs.process_unmapped_keys);
        assert_eq!(prefs.one_shot_timeout_ms, 2000);

        let prefs = load_preferences_from_str(r#"{ "leader_key": {}, "allow_conflicts": true }"#).unwrap();
        assert_eq!(prefs.leader_key, Some(LeaderKeyPreference::default()));
        assert!(prefs.compile_options(Vec::new()).allow_conflicts);
    }

    #[test]
    fn collections_load_from_json() {
        let collections = load_collections_from_str(COLLECTIONS).unwrap();
        assert_eq!(collections.len(), 1);
        assert!(collections[0].is_enabled);
        assert!(collections[0].momentary_activator.is_some());
    }

    #[test]
    fn invalid_json_reports_e3002_with_line() {
        let err = load_collections_from_str("[\n  { \"id\": 1 }\n]").unwrap_err();
        let compile_err = err.downcast_ref::<CompileError>().unwrap();
        assert_eq!(compile_err.code, "E3002");
        assert_eq!(compile_err.line, Some(2));
    }

    #[test]
    fn missing_file_reports_e3001() {
        let missing = temp_dir("missing").join("nope.json");
        let err = load_collections_from_path(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("E3001: failed to read collections"));
    }

    #[test]
    fn save_writes_only_after_successful_compile() {
        let dir = temp_dir("save");
        let out = dir.join("keymap.kbd");
        let _ = fs::remove_file(&out);

        let conflicting = load_collections_from_str(
            r#"[
  { "id": "a", "name": "A", "mappings": [{ "input": "f", "output": "g" }] },
  { "id": "b", "name": "B", "mappings": [{ "input": "f", "output": "h" }] }
]"#,
        )
        .unwrap();
        let err = save_config(&conflicting, &Preferences::default(), &out, None).unwrap_err();
        assert!(format!("{err:#}").contains("E1001"));
        assert!(!out.exists());

        let collections = load_collections_from_str(COLLECTIONS).unwrap();
        let compiled = save_config(&collections, &Preferences::default(), &out, None).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), compiled.text);
    }

    #[test]
    fn save_carries_preserved_sections_forward() {
        let dir = temp_dir("preserve");
        let out = dir.join("keymap.kbd");
        fs::write(
            &out,
            ";; === BEGIN PRESERVED: mine ===\n(defvar x 1)\n;; === END PRESERVED: mine ===\n",
        )
        .unwrap();

        let collections = load_collections_from_str(COLLECTIONS).unwrap();
        save_config(&collections, &Preferences::default(), &out, None).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        assert!(text.contains(";; === BEGIN PRESERVED: mine ===\n(defvar x 1)\n"));
        assert!(text.contains("(deflayer nav"));
    }
}
