use std::{env, fs, path::PathBuf, process::Command};

fn norm_newlines(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "")
}

const VIM_NAV: &str = r#"[
  {
    "id": "vim",
    "name": "Vim Navigation",
    "target_layer": "nav",
    "mappings": [
      { "input": "h", "output": "left" },
      { "input": "l", "output": "right" }
    ],
    "momentary_activator": { "input": "space", "source_layer": "base", "target_layer": "nav" }
  }
]"#;

const CONFLICTING: &str = r#"[
  { "id": "a", "name": "Alpha", "mappings": [{ "input": "f", "output": "g" }] },
  { "id": "b", "name": "Beta", "mappings": [{ "input": "f", "output": "h" }] }
]"#;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("keymap_cli_{name}_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn conflict_fails_without_writing_output() {
    let exe = env!("CARGO_BIN_EXE_keymap_cli");
    let dir = scratch_dir("conflict");
    let input = dir.join("collections.json");
    let out = dir.join("keymap.kbd");
    let _ = fs::remove_file(&out);
    fs::write(&input, CONFLICTING).unwrap();

    let output = Command::new(exe)
        .args(["compile", input.to_str().unwrap(), "-o", out.to_str().unwrap()])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));

    let stderr = norm_newlines(&String::from_utf8_lossy(&output.stderr));
    assert!(stderr.contains("Error: compile failed: "));
    assert!(stderr.contains("Caused by:"));
    assert!(stderr.contains("E1001: key 'f' in layer 'base' is claimed by: Alpha, Beta"));
    assert!(!out.exists());
}

#[test]
fn allow_conflicts_flag_compiles_anyway() {
    let exe = env!("CARGO_BIN_EXE_keymap_cli");
    let dir = scratch_dir("allow");
    let input = dir.join("collections.json");
    fs::write(&input, CONFLICTING).unwrap();

    let output = Command::new(exe)
        .args(["compile", input.to_str().unwrap(), "--allow-conflicts"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = norm_newlines(&String::from_utf8_lossy(&output.stdout));
    assert!(stdout.contains("(deflayer base"));
    assert!(stdout.contains("  g"));
}

#[test]
fn compile_missing_input_file_is_e3001() {
    let exe = env!("CARGO_BIN_EXE_keymap_cli");
    let missing = env::temp_dir().join(format!("keymap_cli_missing_{}.json", std::process::id()));
    let _ = fs::remove_file(&missing);

    let output = Command::new(exe)
        .args(["compile", missing.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = norm_newlines(&String::from_utf8_lossy(&output.stderr));
    // The OS message after the prefix varies by platform.
    assert!(stderr.contains("E3001: failed to read collections:"));
}

#[test]
fn compile_success_writes_output() {
    let exe = env!("CARGO_BIN_EXE_keymap_cli");
    let dir = scratch_dir("success");
    let input = dir.join("collections.json");
    let out = dir.join("keymap.kbd");
    fs::write(&input, VIM_NAV).unwrap();

    let output = Command::new(exe)
        .args(["compile", input.to_str().unwrap(), "--output", out.to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with(";; Generated by keymapc."));
    assert!(text.contains("(defsrc"));
    assert!(text.contains("(deflayer nav"));
}

#[test]
fn write_failure_is_reported() {
    let exe = env!("CARGO_BIN_EXE_keymap_cli");
    let dir = scratch_dir("unwritable");
    let input = dir.join("collections.json");
    fs::write(&input, VIM_NAV).unwrap();
    let out = dir.join("no_such_dir").join("keymap.kbd");

    let output = Command::new(exe)
        .args(["compile", input.to_str().unwrap(), "-o", out.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = norm_newlines(&String::from_utf8_lossy(&output.stderr));
    assert!(stderr.contains("failed to write: "));
}

#[test]
fn missing_engine_binary_is_e4002() {
    let exe = env!("CARGO_BIN_EXE_keymap_cli");
    let dir = scratch_dir("engine");
    let input = dir.join("collections.json");
    fs::write(&input, VIM_NAV).unwrap();
    let engine = dir.join("no_such_engine");

    let output = Command::new(exe)
        .args([
            "compile",
            input.to_str().unwrap(),
            "--engine",
            engine.to_str().unwrap(),
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = norm_newlines(&String::from_utf8_lossy(&output.stderr));
    assert!(stderr.contains("E4002: engine could not be run:"));
}

#[test]
fn conflicts_subcommand_lists_each_conflict() {
    let exe = env!("CARGO_BIN_EXE_keymap_cli");
    let dir = scratch_dir("conflicts_cmd");
    let input = dir.join("collections.json");
    fs::write(&input, CONFLICTING).unwrap();

    let output = Command::new(exe)
        .args(["conflicts", input.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stdout = norm_newlines(&String::from_utf8_lossy(&output.stdout));
    assert!(stdout.contains("E1001: key 'f' in layer 'base'"));

    let clean = dir.join("clean.json");
    fs::write(&clean, VIM_NAV).unwrap();
    let output = Command::new(exe)
        .args(["conflicts", clean.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(norm_newlines(&String::from_utf8_lossy(&output.stdout)), "no conflicts\n");
}

#[test]
fn parse_action_prints_json() {
    let exe = env!("CARGO_BIN_EXE_keymap_cli");

    let output = Command::new(exe)
        .args(["parse-action", "(tap-hold 200 200 a lctl)"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"lctl\""));

    let output = Command::new(exe)
        .args(["parse-action", "esc"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(norm_newlines(&String::from_utf8_lossy(&output.stdout)), "null\n");
}

#[test]
fn help_lists_subcommands() {
    let exe = env!("CARGO_BIN_EXE_keymap_cli");

    let output = Command::new(exe).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("keymapc"));
    assert!(stdout.contains("compile"));
    assert!(stdout.contains("parse-action"));
}

#[test]
fn aliases_subcommand_reads_back_generated_config() {
    let exe = env!("CARGO_BIN_EXE_keymap_cli");
    let dir = scratch_dir("aliases");
    let input = dir.join("collections.json");
    let out = dir.join("keymap.kbd");
    fs::write(&input, VIM_NAV).unwrap();

    let status = Command::new(exe)
        .args(["compile", input.to_str().unwrap(), "-o", out.to_str().unwrap()])
        .status()
        .unwrap();
    assert!(status.success());

    let output = Command::new(exe)
        .args(["aliases", out.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"lyr_base_spc\""));
}
