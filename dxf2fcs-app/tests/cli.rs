use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cli(workdir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_dxf2fcs"));
    command.current_dir(workdir).env_remove("DXF2FCS_CONFIG");
    command
}

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("../dxf2fcs-io/tests/data");
    path.push(name);
    path
}

/// 把夹具复制到临时目录，返回目录与输入路径。
fn staged_input(name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let input = dir.path().join(name);
    fs::copy(fixture(name), &input).expect("copy fixture");
    (dir, input)
}

#[test]
fn help_lists_options() {
    let dir = TempDir::new().expect("create temp dir");
    cli(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--precision"))
        .stdout(predicate::str::contains("--vertex-style"));
}

#[test]
fn converts_to_default_output_path() {
    let (dir, input) = staged_input("basic_entities.dxf");
    cli(dir.path())
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Done."))
        .stdout(predicate::str::contains("curves"));

    let script = fs::read_to_string(dir.path().join("basic_entities.fcs")).expect("output written");
    assert!(script.contains("curve {c1} vertex {v1a} {v1b}"));
}

#[test]
fn missing_input_fails_without_output() {
    let dir = TempDir::new().expect("create temp dir");
    let input = dir.path().join("nothing.dxf");
    cli(dir.path())
        .arg(&input)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error: the dxf file does not exist:"));
    assert!(!dir.path().join("nothing.fcs").exists());
}

#[test]
fn flags_override_precision_and_unit() {
    let (dir, input) = staged_input("basic_entities.dxf");
    let output = dir.path().join("custom.fcs");
    cli(dir.path())
        .arg(&input)
        .args(["-o"])
        .arg(&output)
        .args(["-p", "1", "-u", "m", "--vertex-style", "verbose"])
        .assert()
        .success();

    let script = fs::read_to_string(&output).expect("output written");
    assert!(script.contains("vertex {v1b} xyz 1000 0 0"));
    assert!(!script.contains("v = (x,y,z)"));
}

#[test]
fn config_file_sets_output_extension() {
    let (dir, input) = staged_input("hatch_paths.dxf");
    let config = dir.path().join("dxf2fcs.toml");
    fs::write(&config, "[output]\nextension = \"txt\"\n").expect("write config");

    cli(dir.path())
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    let script = fs::read_to_string(dir.path().join("hatch_paths.txt")).expect("output written");
    assert!(script.contains("area {a1} boundary curve"));
}

#[test]
fn unknown_vertex_style_is_an_error() {
    let (dir, input) = staged_input("basic_entities.dxf");
    cli(dir.path())
        .arg(&input)
        .args(["--vertex-style", "fancy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown vertex style"));
    assert!(!dir.path().join("basic_entities.fcs").exists());
}
