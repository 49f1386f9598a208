//! End-to-end tests of the `gvt` binary in throwaway directories.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use tempfile::TempDir;

struct Run {
    code: i32,
    stdout: String,
    stderr: String,
}

fn gvt(dir: &Path, args: &[&str]) -> Run {
    let output = Command::cargo_bin("gvt")
        .expect("gvt binary")
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("run gvt");
    Run {
        code: output.status.code().expect("exit code"),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

fn initialized() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    let run = gvt(dir.path(), &["init"]);
    assert_eq!(run.code, 0);
    assert_eq!(run.stdout, "Current directory initialized successfully.\n");
    dir
}

#[test]
fn no_command() {
    let dir = TempDir::new().unwrap();
    let run = gvt(dir.path(), &[]);
    assert_eq!(run.code, 1);
    assert_eq!(run.stderr, "Please specify command.\n");
}

#[test]
fn unknown_command() {
    let dir = TempDir::new().unwrap();
    let run = gvt(dir.path(), &["frobnicate"]);
    assert_eq!(run.code, 1);
    assert_eq!(run.stderr, "Unknown command frobnicate.\n");
}

#[test]
fn init_twice() {
    let dir = initialized();
    assert!(dir.path().join(".gvt/repo.json").is_file());
    assert!(dir.path().join(".gvt/0/meta.json").is_file());
    let run = gvt(dir.path(), &["init"]);
    assert_eq!(run.code, 10);
    assert_eq!(run.stderr, "Current directory is already initialized.\n");
}

#[test]
fn commands_require_init() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    let cases: [&[&str]; 4] = [&["add", "a.txt"], &["history"], &["version"], &["checkout", "0"]];
    for args in cases {
        let run = gvt(dir.path(), args);
        assert_ne!(run.code, 0);
        assert!(run.stderr.contains("Current directory is not initialized."));
    }
}

#[test]
fn add_commit_history() {
    let dir = initialized();
    fs::write(dir.path().join("a.txt"), "one").unwrap();
    let run = gvt(dir.path(), &["add", "a.txt"]);
    assert_eq!(run.stdout, "File a.txt added successfully.\n");

    fs::write(dir.path().join("a.txt"), "two").unwrap();
    let run = gvt(dir.path(), &["commit", "a.txt", "-m", "second pass"]);
    assert_eq!(run.stdout, "File a.txt committed successfully.\n");

    let run = gvt(dir.path(), &["history", "--last", "2"]);
    assert_eq!(run.code, 0);
    assert_eq!(run.stdout, "1: Added file: a.txt\n2: Committed file: a.txt\n");

    let run = gvt(dir.path(), &["history", "--last", "-2"]);
    assert_eq!(run.code, 0);
    assert_eq!(run.stdout, "");

    let run = gvt(dir.path(), &["history", "--last", "many"]);
    assert_eq!(run.stdout.lines().count(), 3);

    let run = gvt(dir.path(), &["history"]);
    assert_eq!(run.stdout.lines().count(), 3);
    assert!(run.stdout.starts_with("0: GVT initialized.\n"));

    let run = gvt(dir.path(), &["version"]);
    assert_eq!(run.stdout, "Version: 2\nCommitted file: a.txt\nsecond pass\n");
}

#[test]
fn add_informational_and_missing() {
    let dir = initialized();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    gvt(dir.path(), &["add", "a.txt", "-m", "first"]);
    let run = gvt(dir.path(), &["add", "a.txt"]);
    assert_eq!(run.code, 0);
    assert_eq!(run.stdout, "File already added. File: a.txt\n");

    let run = gvt(dir.path(), &["add", "missing.txt"]);
    assert_eq!(run.code, 21);
    assert_eq!(run.stderr, "File not found. File: missing.txt\n");

    let run = gvt(dir.path(), &["add"]);
    assert_eq!(run.code, 20);

    let run = gvt(dir.path(), &["version", "1"]);
    assert_eq!(run.stdout, "Version: 1\nfirst.\n");
}

#[test]
fn detach_and_commit_untracked() {
    let dir = initialized();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    let run = gvt(dir.path(), &["detach", "a.txt"]);
    assert_eq!(run.stdout, "File a.txt is not added to gvt.\n");
    let run = gvt(dir.path(), &["commit", "a.txt"]);
    assert_eq!(run.stdout, "File is not added to gvt. File: a.txt\n");
    let run = gvt(dir.path(), &["commit", "gone.txt"]);
    assert_eq!(run.code, 51);

    gvt(dir.path(), &["add", "a.txt"]);
    let run = gvt(dir.path(), &["detach", "a.txt", "-m", "no longer needed"]);
    assert_eq!(run.stdout, "File a.txt detached successfully.\n");
    let run = gvt(dir.path(), &["history", "--last", "1"]);
    assert_eq!(run.stdout, "2: Detached file: a.txt\n");
}

#[test]
fn checkout_restores_and_rejects() {
    let dir = initialized();
    let file = dir.path().join("a.txt");
    fs::write(&file, "one").unwrap();
    gvt(dir.path(), &["add", "a.txt"]);
    fs::write(&file, "two").unwrap();
    gvt(dir.path(), &["commit", "a.txt"]);
    fs::write(&file, "scratch").unwrap();

    let run = gvt(dir.path(), &["checkout", "1"]);
    assert_eq!(run.stdout, "Checkout successful for version: 1\n");
    assert_eq!(fs::read_to_string(&file).unwrap(), "one");

    let repo_before = fs::read_to_string(dir.path().join(".gvt/repo.json")).unwrap();
    let run = gvt(dir.path(), &["checkout", "7"]);
    assert_eq!(run.code, 40);
    assert_eq!(run.stderr, "Invalid version number: 7\n");
    let run = gvt(dir.path(), &["checkout", "seven"]);
    assert_eq!(run.code, 60);
    assert_eq!(fs::read_to_string(&file).unwrap(), "one");
    assert_eq!(
        fs::read_to_string(dir.path().join(".gvt/repo.json")).unwrap(),
        repo_before
    );

    let run = gvt(dir.path(), &["version"]);
    assert!(run.stdout.starts_with("Version: 2\n"));
}

#[test]
fn version_rejects_unknown() {
    let dir = initialized();
    let run = gvt(dir.path(), &["version", "3"]);
    assert_eq!(run.code, 60);
    assert_eq!(run.stderr, "Invalid version number: 3.\n");
    let run = gvt(dir.path(), &["version", "-1"]);
    assert_eq!(run.stdout, "Version: 0\nGVT initialized.\n");
}

#[test]
fn recover_removes_orphans() {
    let dir = initialized();
    fs::create_dir_all(dir.path().join(".gvt/1/files")).unwrap();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    let run = gvt(dir.path(), &["add", "a.txt"]);
    assert_ne!(run.code, 0);
    let detail = "version directory 1 already exists";
    assert_eq!(run.stderr.matches(detail).count(), 1);

    let run = gvt(dir.path(), &["recover"]);
    assert_eq!(run.stdout, "Removed orphaned version 1\n");
    let run = gvt(dir.path(), &["add", "a.txt"]);
    assert_eq!(run.code, 0);
}

#[test]
fn cwd_flag() {
    let dir = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    let path = dir.path().to_str().unwrap();
    let run = gvt(elsewhere.path(), &["--cwd", path, "init"]);
    assert_eq!(run.code, 0);
    assert!(dir.path().join(".gvt").is_dir());
    assert!(!elsewhere.path().join(".gvt").exists());
}
