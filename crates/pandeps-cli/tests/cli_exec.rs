use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[allow(deprecated)]
fn pandeps_cmd() -> Command {
    Command::cargo_bin("pandeps").unwrap()
}

#[test]
fn test_exec_runs_command() {
    let tmp = TempDir::new().unwrap();

    pandeps_cmd()
        .current_dir(tmp.path())
        .args(["exec", "sh", "-c", "echo \"$PERL5LIB\""])
        .assert()
        .success()
        .stdout(predicate::str::contains("local/lib/perl5"));
}

#[test]
fn test_exec_uses_install_dir_flag() {
    let tmp = TempDir::new().unwrap();

    pandeps_cmd()
        .current_dir(tmp.path())
        .args(["exec", "-L", "vendor", "sh", "-c", "echo \"$PATH\""])
        .assert()
        .success()
        .stdout(predicate::str::contains("vendor/bin"));
}

#[test]
fn test_exec_failing_command_fails() {
    let tmp = TempDir::new().unwrap();

    pandeps_cmd()
        .current_dir(tmp.path())
        .args(["exec", "sh", "-c", "exit 4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Process exited with code 4"));
}
