//! Integration tests for the wfref CLI
//!
//! These tests run the actual binary. Nothing here touches the network:
//! remote commands are only exercised against local specs or failures
//! that happen before any remote call.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Binary with an isolated, absent config file
fn wfref_cmd(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("wfref").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(tmp.path().join("absent.toml"));
    cmd
}

#[test]
fn test_help_lists_commands() {
    let tmp = TempDir::new().unwrap();
    wfref_cmd(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("parse"))
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("collect"));
}

// ============================================================================
// parse
// ============================================================================

#[test]
fn test_parse_shorthand() {
    let tmp = TempDir::new().unwrap();
    wfref_cmd(&tmp)
        .args(["parse", "owner/repo/workflow@v1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("repo:    owner/repo"))
        .stdout(predicate::str::contains("version: v1.0.0"))
        .stdout(predicate::str::contains("path:    workflows/workflow.md"))
        .stdout(predicate::str::contains("name:    workflow"))
        .stdout(predicate::str::contains("source:  owner/repo/workflows/workflow.md@v1.0.0"));
}

#[test]
fn test_parse_url() {
    let tmp = TempDir::new().unwrap();
    wfref_cmd(&tmp)
        .args(["parse", "https://github.com/o/r/blob/main/workflows/x.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("version: main"))
        .stdout(predicate::str::contains("path:    workflows/x.md"));
}

#[test]
fn test_parse_repo_flag() {
    let tmp = TempDir::new().unwrap();
    wfref_cmd(&tmp)
        .args(["parse", "--repo", "octo/tools@v2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("repo:    octo/tools"))
        .stdout(predicate::str::contains("version: v2"));
}

#[test]
fn test_parse_error_has_fix() {
    let tmp = TempDir::new().unwrap();
    wfref_cmd(&tmp)
        .args(["parse", "o/r/docs/readme.txt"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("WFREF-006"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn test_resolve_rejects_bad_repo_before_any_call() {
    let tmp = TempDir::new().unwrap();
    wfref_cmd(&tmp)
        .args(["resolve", "not a repo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

// ============================================================================
// config
// ============================================================================

#[test]
fn test_malformed_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("config.toml");
    fs::write(&config, "[timeouts\napi_secs = ").unwrap();

    Command::cargo_bin("wfref")
        .unwrap()
        .env("NO_COLOR", "1")
        .arg("--config")
        .arg(&config)
        .args(["parse", "o/r/x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("WFREF-090"));
}

#[test]
fn test_bad_timeout_env_is_reported() {
    let tmp = TempDir::new().unwrap();
    wfref_cmd(&tmp)
        .env("WFREF_API_TIMEOUT", "soon")
        .args(["parse", "o/r/x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("WFREF_API_TIMEOUT"));
}

// ============================================================================
// fetch (local specs never reach the network)
// ============================================================================

#[test]
fn test_fetch_local_to_stdout() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("wf.md"), "# Local\n").unwrap();

    wfref_cmd(&tmp)
        .current_dir(tmp.path())
        .args(["fetch", "./wf.md"])
        .assert()
        .success()
        .stdout("# Local\n");
}

#[test]
fn test_fetch_local_to_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("wf.md"), "# Local\n").unwrap();
    let out = tmp.path().join("copy.md");

    wfref_cmd(&tmp)
        .current_dir(tmp.path())
        .args(["fetch", "./wf.md", "-o"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    assert_eq!(fs::read_to_string(&out).unwrap(), "# Local\n");
}

#[test]
fn test_fetch_missing_local_file() {
    let tmp = TempDir::new().unwrap();
    wfref_cmd(&tmp)
        .current_dir(tmp.path())
        .args(["fetch", "./missing.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("WFREF-091"));
}

// ============================================================================
// collect
// ============================================================================

#[cfg(unix)]
#[test]
fn test_collect_prints_sorted_closure() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let compiler = root.join("compile.sh");
    fs::write(&compiler, "#!/bin/sh\ntouch \"${1%.md}.lock.yml\"\n").unwrap();
    fs::set_permissions(&compiler, fs::Permissions::from_mode(0o755)).unwrap();

    let wf = root.join("wf");
    fs::create_dir_all(wf.join("shared")).unwrap();
    fs::write(wf.join("main.md"), "---\nimports:\n  - shared/a.md\n---\n# Main\n").unwrap();
    fs::write(wf.join("shared/a.md"), "---\nimports: [b.md]\n---\n").unwrap();
    fs::write(wf.join("shared/b.md"), "# b\n").unwrap();

    let expected = [
        wf.join("main.lock.yml"),
        wf.join("main.md"),
        wf.join("shared/a.md"),
        wf.join("shared/b.md"),
    ]
    .iter()
    .map(|p| format!("{}\n", p.display()))
    .collect::<String>();

    wfref_cmd(&tmp)
        .env("WFREF_COMPILE_CMD", compiler.to_str().unwrap())
        .arg("collect")
        .arg(wf.join("main.md"))
        .assert()
        .success()
        .stdout(expected);
}

#[cfg(unix)]
#[test]
fn test_collect_reports_compile_failure() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("main.md"), "# Main\n").unwrap();

    wfref_cmd(&tmp)
        .env("WFREF_COMPILE_CMD", "false")
        .arg("collect")
        .arg(tmp.path().join("main.md"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("WFREF-041"));
}
