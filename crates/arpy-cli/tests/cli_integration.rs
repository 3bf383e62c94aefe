//! CLI subprocess integration tests.
//!
//! These tests invoke the `arpy` binary as a subprocess and check exit
//! codes, stdout content, and JSON output shape.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn arpy_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_arpy"));
    cmd.env_remove("ARPY_LOG");
    cmd
}

fn arpy(args: &[&str]) -> Output {
    arpy_bin().args(args).output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

fn demo_project(dir: &Path) -> PathBuf {
    let src = dir.join("demo");
    write_tree(
        &src,
        &[
            (
                "app/__main__.py",
                "import sys\nfrom app.util import ANSWER\nif ANSWER == 42:\n    print('ok')\nif len(sys.argv) > 1:\n    print(sys.argv[1])\n",
            ),
            ("app/util.py", "ANSWER = 42\n"),
        ],
    );
    src
}

fn build_demo(dir: &Path) -> PathBuf {
    let src = demo_project(dir);
    let archive = dir.join("demo.arpy");
    let output = arpy(&[
        "build",
        &src.to_string_lossy(),
        "-o",
        &archive.to_string_lossy(),
        "-m",
        "app.__main__",
    ]);
    assert!(output.status.success(), "build failed: {}", stderr(&output));
    archive
}

#[test]
fn cli_version_exits_zero() {
    let output = arpy(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("arpy"));
}

#[test]
fn cli_help_lists_commands() {
    let output = arpy(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for cmd in ["build", "run", "list", "extract", "verify"] {
        assert!(text.contains(cmd), "help must list '{cmd}': {text}");
    }
}

#[test]
fn cli_build_list_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let archive = build_demo(dir.path());
    assert!(archive.exists());

    let output = arpy(&["--json", "list", &archive.to_string_lossy()]);
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(
        json["modules"],
        serde_json::json!(["app.__main__", "app.util"])
    );
    assert_eq!(json["packages"], serde_json::json!(["app"]));
    assert_eq!(json["manifest"]["main_module"], "app.__main__");
    assert_eq!(json["manifest"]["name"], "demo");

    let output = arpy(&["run", &archive.to_string_lossy()]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "ok\n");
}

#[test]
fn cli_run_passes_program_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let archive = build_demo(dir.path());
    let output = arpy(&["run", &archive.to_string_lossy(), "--extra"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "ok\n--extra\n");
}

#[test]
fn cli_run_exits_with_program_status() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("quit");
    write_tree(&src, &[("__main__.py", "import sys\nsys.exit(4)\n")]);
    let archive = dir.path().join("quit.arpy");
    let output = arpy(&[
        "build",
        &src.to_string_lossy(),
        "-o",
        &archive.to_string_lossy(),
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let output = arpy(&["run", &archive.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn cli_run_program_error_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("broken");
    write_tree(&src, &[("__main__.py", "print(missing_name)\n")]);
    let archive = dir.path().join("broken.arpy");
    arpy(&[
        "build",
        &src.to_string_lossy(),
        "-o",
        &archive.to_string_lossy(),
    ]);
    let output = arpy(&["run", &archive.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("NameError"), "{}", stderr(&output));
}

#[test]
fn cli_run_missing_archive_is_archive_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = arpy(&["run", &dir.path().join("absent.arpy").to_string_lossy()]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).starts_with("error: not found:"));
}

#[test]
fn cli_run_missing_entry_is_archive_error() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("noentry");
    write_tree(&src, &[("lib.py", "print('should not run')\n")]);
    let archive = dir.path().join("noentry.arpy");
    arpy(&[
        "build",
        &src.to_string_lossy(),
        "-o",
        &archive.to_string_lossy(),
    ]);
    let output = arpy(&["run", &archive.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("no entry module '__main__'"));
}

#[test]
fn cli_build_invalid_config_is_manifest_error() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("cfg");
    write_tree(
        &src,
        &[("arpy.toml", "[package]\nunknown = true\n"), ("__main__.py", "")],
    );
    let output = arpy(&["build", &src.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(2), "{}", stderr(&output));
}

#[test]
fn cli_build_ambiguous_layout_fails() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("amb");
    write_tree(&src, &[("pkg.py", ""), ("pkg/sub.py", "")]);
    let output = arpy(&["build", &src.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("ambiguous layout"));
    assert!(!dir.path().join("amb.arpy").exists());
}

#[test]
fn cli_build_json_reports_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let src = demo_project(dir.path());
    let archive = dir.path().join("out.arpy");
    let output = arpy(&[
        "--json",
        "build",
        &src.to_string_lossy(),
        "-o",
        &archive.to_string_lossy(),
        "-n",
        "named",
        "-v",
        "0.3.0",
        "-m",
        "app.__main__",
        "-a",
        "someone",
        "-d",
        "demo project",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["manifest"]["name"], "named");
    assert_eq!(json["manifest"]["version"], "0.3.0");
    assert_eq!(json["manifest"]["author"], "someone");
    assert_eq!(json["manifest"]["description"], "demo project");
    assert_eq!(json["manifest"]["checksum"].as_str().unwrap().len(), 16);
}

#[test]
fn cli_extract_round_trips_sources() {
    let dir = tempfile::tempdir().unwrap();
    let archive = build_demo(dir.path());
    let dest = dir.path().join("unpacked");
    let output = arpy(&[
        "extract",
        &archive.to_string_lossy(),
        "-o",
        &dest.to_string_lossy(),
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        fs::read_to_string(dest.join("app/util.py")).unwrap(),
        "ANSWER = 42\n"
    );
    assert!(dest.join("META-INF/manifest.json").exists());
}

#[test]
fn cli_extract_defaults_to_archive_stem() {
    let dir = tempfile::tempdir().unwrap();
    let archive = build_demo(dir.path());
    let output = arpy(&["extract", &archive.to_string_lossy()]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(dir.path().join("demo/app/__main__.py").exists());
}

#[test]
fn cli_verify_untouched_archive() {
    let dir = tempfile::tempdir().unwrap();
    let archive = build_demo(dir.path());
    let output = arpy(&["--json", "verify", &archive.to_string_lossy()]);
    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["recorded"], json["computed"]);
}

#[test]
fn cli_completions_bash() {
    let output = arpy(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("arpy"));
}

#[test]
fn cli_man_pages_written() {
    let dir = tempfile::tempdir().unwrap();
    let man = dir.path().join("man");
    let output = arpy(&["man-pages", &man.to_string_lossy()]);
    assert!(output.status.success());
    assert!(man.join("arpy.1").exists());
    assert!(man.join("arpy-build.1").exists());
}
