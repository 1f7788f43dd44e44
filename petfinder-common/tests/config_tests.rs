//! Configuration loading and root folder resolution
//!
//! Tests that manipulate PETFINDER_ROOT_FOLDER are marked with #[serial]
//! so they never race each other.

use petfinder_common::config::{
    ensure_root_folder, get_default_root_folder, resolve_root_folder, MatcherKind, ServiceConfig,
    DEFAULT_PUSH_ENDPOINT, ROOT_FOLDER_ENV,
};
use petfinder_common::matcher::{MatchMode, TargetMode};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[test]
fn test_defaults() {
    let config = ServiceConfig::default();
    assert_eq!(config.listen_addr(), "127.0.0.1:5780");
    assert_eq!(config.public_base_url(), "http://127.0.0.1:5780");
    assert!(config.strict_requests);
    assert_eq!(config.matcher.kind, MatcherKind::Spoof);
    assert_eq!(config.matcher.k, 1);
    assert!((config.matcher.decay - 0.03).abs() < f64::EPSILON);
    assert!(config.embedding.url.is_none());
    assert!(!config.push.enabled);
    assert_eq!(config.push.endpoint, DEFAULT_PUSH_ENDPOINT);
    assert_eq!(config.push.timeout_secs, 5);
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = ServiceConfig::from_toml_str(
        r#"
        port = 8080
        public_base_url = "https://pets.example.org/"

        [matcher]
        kind = "ranked"
        k = 3

        [embedding]
        url = "http://localhost:9000"
        "#,
    )
    .unwrap();

    assert_eq!(config.port, 8080);
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.public_base_url(), "https://pets.example.org");
    assert_eq!(config.matcher.kind, MatcherKind::Ranked);
    assert_eq!(config.matcher.k, 3);
    assert_eq!(config.matcher.match_mode, MatchMode::Always);
    assert_eq!(config.embedding.url.as_deref(), Some("http://localhost:9000"));
    assert_eq!(config.embedding.timeout_secs, 10);
}

#[test]
fn test_spoof_modes_from_toml() {
    let config = ServiceConfig::from_toml_str(
        r#"
        [matcher]
        match_mode = "alternating"
        target_mode = "random"
        seed = 7
        "#,
    )
    .unwrap();
    assert_eq!(config.matcher.match_mode, MatchMode::Alternating);
    assert_eq!(config.matcher.target_mode, TargetMode::Random);
    assert_eq!(config.matcher.seed, Some(7));
}

#[test]
fn test_invalid_toml_is_config_error() {
    let err = ServiceConfig::from_toml_str("port = \"not a port\"").unwrap_err();
    assert!(err.to_string().contains("Configuration error"));

    let err = ServiceConfig::from_toml_str("[matcher]\nmatch_mode = \"sometimes\"").unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
fn test_load_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("petfinder.toml");
    std::fs::write(&path, "port = 6000\nstrict_requests = false\n").unwrap();

    let config = ServiceConfig::load(Some(&path)).unwrap();
    assert_eq!(config.port, 6000);
    assert!(!config.strict_requests);
}

#[test]
fn test_load_missing_explicit_path_fails() {
    let result = ServiceConfig::load(Some(Path::new("/nonexistent/petfinder.toml")));
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_cli_argument_has_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/petfinder-env");
    let mut config = ServiceConfig::default();
    config.root_folder = Some(PathBuf::from("/tmp/petfinder-toml"));

    let root = resolve_root_folder(Some(Path::new("/tmp/petfinder-cli")), &config);
    assert_eq!(root, PathBuf::from("/tmp/petfinder-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/petfinder-env");
    let mut config = ServiceConfig::default();
    config.root_folder = Some(PathBuf::from("/tmp/petfinder-toml"));

    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/tmp/petfinder-env"));

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/tmp/petfinder-toml"));
}

#[test]
#[serial]
fn test_falls_back_to_default_root() {
    env::remove_var(ROOT_FOLDER_ENV);
    let root = resolve_root_folder(None, &ServiceConfig::default());
    assert_eq!(root, get_default_root_folder());
    assert!(!root.as_os_str().is_empty());
}

#[test]
fn test_ensure_root_folder_creates_layout() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("data");

    let db_path = ensure_root_folder(&root).unwrap();
    assert!(root.join("images").is_dir());
    assert_eq!(db_path, root.join("petfinder.db"));
}
