use pandeps_util::fs::{absolute, ensure_dir};
use tempfile::TempDir;

#[test]
fn test_ensure_dir_creates_nested() {
    let tmp = TempDir::new().unwrap();
    let deep = tmp.path().join("x").join("y").join("z");
    assert!(!deep.exists());
    ensure_dir(&deep).unwrap();
    assert!(deep.is_dir());
}

#[test]
fn test_ensure_dir_idempotent() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("already");
    std::fs::create_dir(&dir).unwrap();
    ensure_dir(&dir).unwrap();
    assert!(dir.is_dir());
}

#[test]
fn test_absolute_keeps_absolute_paths() {
    let tmp = TempDir::new().unwrap();
    assert_eq!(absolute(tmp.path()).unwrap(), tmp.path());
}

#[test]
fn test_absolute_joins_relative_paths() {
    let abs = absolute(std::path::Path::new(".pandeps/cache")).unwrap();
    assert!(abs.is_absolute());
    assert!(abs.ends_with(".pandeps/cache"));
}
