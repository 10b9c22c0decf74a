use std::{
    env, fs,
    path::{Path, PathBuf},
    process::Command,
};

use keymap_compiler::{EngineValidator, ValidationFailure};
use tracing::debug;

/// Runs the engine binary in check-only mode against a temporary copy of
/// the generated config.
#[derive(Debug, Clone)]
pub struct ProcessValidator {
    binary: PathBuf,
}

impl ProcessValidator {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn scratch_path() -> PathBuf {
        env::temp_dir().join(format!("keymapc_check_{}.kbd", std::process::id()))
    }

    fn run(&self, cfg: &Path) -> Result<(), ValidationFailure> {
        let output = Command::new(&self.binary)
            .arg("--check")
            .arg("--cfg")
            .arg(cfg)
            .output()
            .map_err(|e| {
                ValidationFailure::Unavailable(format!("{}: {e}", self.binary.display()))
            })?;
        debug!(status = ?output.status, "engine check finished");
        if output.status.success() {
            return Ok(());
        }
        let mut diagnostic = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            if !diagnostic.is_empty() {
                diagnostic.push('\n');
            }
            diagnostic.push_str(stdout.trim());
        }
        if diagnostic.is_empty() {
            diagnostic = format!("engine exited with {}", output.status);
        }
        Err(ValidationFailure::Rejected(diagnostic))
    }
}

impl EngineValidator for ProcessValidator {
    fn check(&self, config_text: &str) -> Result<(), ValidationFailure> {
        let path = Self::scratch_path();
        fs::write(&path, config_text).map_err(|e| {
            ValidationFailure::Unavailable(format!("failed to write {}: {e}", path.display()))
        })?;
        let result = self.run(&path);
        let _ = fs::remove_file(&path);
        result
    }
}
