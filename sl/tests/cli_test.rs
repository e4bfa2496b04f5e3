//! Command-line behavior of the sortline binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn sortline() -> Command {
    Command::cargo_bin("sortline").unwrap()
}

#[test]
fn test_help_lists_subcommands() {
    sortline()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("devices"))
        .stdout(predicate::str::contains("lights"));
}

#[test]
fn test_config_prints_effective_yaml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sortline.yml");
    std::fs::write(&path, "quota:\n  per-color: 3\n").unwrap();

    sortline()
        .current_dir(dir.path())
        .args(["--config", path.to_str().unwrap(), "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("per-color: 3"))
        .stdout(predicate::str::contains("VirtualUarm1"));
}

#[test]
fn test_missing_config_file_fails() {
    let dir = tempdir().unwrap();
    sortline()
        .current_dir(dir.path())
        .args(["--config", "does-not-exist.yml", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sortline.yml");
    std::fs::write(&path, "quota:\n  per-color: 0\n").unwrap();

    sortline()
        .current_dir(dir.path())
        .args(["--config", path.to_str().unwrap(), "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("per-color"));
}
