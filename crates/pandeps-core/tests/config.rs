use pandeps_core::config::{Config, CONFIG_FILE};
use std::path::PathBuf;

#[test]
fn test_default_jobs_nonzero() {
    let config = Config::default();
    assert!(config.jobs > 0, "jobs should be > 0");
    assert_eq!(config.resolve_jobs, 8);
}

#[test]
fn test_default_paths() {
    let config = Config::default();
    assert_eq!(config.requirements, PathBuf::from("cpanfile"));
    assert_eq!(config.cache_dir, PathBuf::from(".pandeps/cache"));
    assert_eq!(config.install_dir, PathBuf::from("local"));
}

#[test]
fn test_default_sources_enabled() {
    let config: Config = toml::from_str("").unwrap();
    assert!(config.sources.default_cpan);
    assert!(config.sources.default_backpan);
    assert!(!config.sources.metacpan);
    assert_eq!(config.sources.archive_mirrors.len(), 2);
    assert_eq!(config.install.command, "cpanm");
    assert_eq!(config.resolver.command, "cpanm");
}

#[test]
fn test_parse_from_toml() {
    let toml = r#"
jobs = 2
resolve-jobs = 3
install-dir = "vendor"
no-install = true

[tests]
skip = ["Moo", "Plack"]

[sources]
default-backpan = false
cpan = ["10:http://mirror.example.com"]
smart = ["http://smartpan.example.com"]

[install]
command = "/opt/bin/cpanm"
"#;
    let config = Config::parse_toml(toml).unwrap();
    assert_eq!(config.jobs, 2);
    assert_eq!(config.resolve_jobs, 3);
    assert_eq!(config.install_dir, PathBuf::from("vendor"));
    assert!(config.no_install);
    assert!(config.sources.default_cpan);
    assert!(!config.sources.default_backpan);
    assert_eq!(config.sources.cpan, vec!["10:http://mirror.example.com"]);
    assert_eq!(config.install.command, "/opt/bin/cpanm");
    assert!(config.tests.skip_tests("Moo"));
    assert!(!config.tests.skip_tests("JSON"));
}

#[test]
fn test_never_test_skips_everything() {
    let config = Config::parse_toml("[tests]\nnever = true\n").unwrap();
    assert!(config.tests.skip_tests("Anything"));
}

#[test]
fn test_invalid_toml_is_config_error() {
    let err = Config::parse_toml("jobs = \"many\"").unwrap_err();
    assert!(err.to_string().contains("Configuration error"), "got: {err}");
}

#[test]
fn test_load_missing_file_gives_defaults() {
    let tmp = tempfile::TempDir::new().unwrap();
    let config = Config::load(tmp.path()).unwrap();
    assert_eq!(config.install_dir, PathBuf::from("local"));
}

#[test]
fn test_load_reads_project_file() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::write(tmp.path().join(CONFIG_FILE), "cache-dir = \"/tmp/pcache\"\n").unwrap();
    let config = Config::load(tmp.path()).unwrap();
    assert_eq!(config.cache_dir, PathBuf::from("/tmp/pcache"));
}

#[test]
fn test_validate_rejects_zero_jobs() {
    let config = Config {
        jobs: 0,
        ..Config::default()
    };
    assert!(config.validate().is_err());
    assert!(Config::default().validate().is_ok());
}
