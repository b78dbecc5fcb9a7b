//! Unit tests for configuration and graceful degradation
//!
//! Tests that manipulate DPR_DATA_FOLDER or DPR_CONFIG are marked with
//! #[serial] so they do not race on the process environment.

use dpr_common::config::{
    CompiledDefaults, DataFolderInitializer, DataFolderResolver, TomlConfig, CONFIG_FILE_ENV,
    DATA_FOLDER_ENV, SAVED_ITEMS_FILE,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();
    assert!(!defaults.data_folder.as_os_str().is_empty());
    assert_eq!(defaults.log_level, "info");
    assert!(defaults.sparql_endpoint.starts_with("http://"));
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(DATA_FOLDER_ENV);

    let resolver = DataFolderResolver::new("test-module");
    let folder = resolver.resolve_data_folder(&TomlConfig::default());

    assert_eq!(folder, CompiledDefaults::for_current_platform().data_folder);
}

#[test]
#[serial]
fn test_resolver_priority_order() {
    let config = TomlConfig {
        data_folder: Some(PathBuf::from("/tmp/dpr-from-toml")),
        ..TomlConfig::default()
    };

    env::remove_var(DATA_FOLDER_ENV);
    let resolver = DataFolderResolver::new("test-module");
    assert_eq!(resolver.resolve_data_folder(&config), PathBuf::from("/tmp/dpr-from-toml"));

    env::set_var(DATA_FOLDER_ENV, "/tmp/dpr-from-env");
    assert_eq!(resolver.resolve_data_folder(&config), PathBuf::from("/tmp/dpr-from-env"));

    let resolver = resolver.with_cli_data_folder(Some(PathBuf::from("/tmp/dpr-from-cli")));
    assert_eq!(resolver.resolve_data_folder(&config), PathBuf::from("/tmp/dpr-from-cli"));

    // Cleanup
    env::remove_var(DATA_FOLDER_ENV);
}

#[test]
#[serial]
fn test_config_file_path_overrides() {
    env::remove_var(CONFIG_FILE_ENV);
    let resolver = DataFolderResolver::new("dpr-server");
    if let Some(path) = resolver.config_file_path() {
        assert!(path.ends_with("dpr/dpr-server.toml"));
    }

    env::set_var(CONFIG_FILE_ENV, "/tmp/dpr-env.toml");
    assert_eq!(resolver.config_file_path(), Some(PathBuf::from("/tmp/dpr-env.toml")));

    let resolver = resolver.with_cli_config_file(Some(PathBuf::from("/tmp/dpr-cli.toml")));
    assert_eq!(resolver.config_file_path(), Some(PathBuf::from("/tmp/dpr-cli.toml")));

    // Cleanup
    env::remove_var(CONFIG_FILE_ENV);
}

#[test]
fn test_missing_config_file_does_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = TomlConfig::load_or_default(Some(&dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.backend.problem_root, "onto:Problem");
    assert_eq!(config.server.explore_page_size, 20);
    assert_eq!(config.server.recommendation_page_size, 18);
    assert_eq!(config.server.session_ttl_minutes, 60);

    let config = TomlConfig::load_or_default(None).unwrap();
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dpr-server.toml");
    std::fs::write(
        &path,
        r#"
data_folder = "/srv/dpr"

[backend]
sparql_endpoint = "http://fuseki:3030/patterns/query"

[server]
explore_page_size = 50
"#,
    )
    .unwrap();

    let config = TomlConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(config.data_folder, Some(PathBuf::from("/srv/dpr")));
    assert_eq!(
        config.backend.sparql_endpoint.as_deref(),
        Some("http://fuseki:3030/patterns/query")
    );
    assert_eq!(config.backend.explore_root, "owl:Thing");
    assert_eq!(config.server.explore_page_size, 50);
    assert_eq!(config.server.recommendation_page_size, 18);
}

#[test]
fn test_malformed_toml_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "data_folder = [unterminated").unwrap();

    let result = TomlConfig::load_or_default(Some(&path));
    assert!(matches!(result, Err(dpr_common::Error::Config(_))));
}

#[test]
fn test_toml_roundtrip() {
    let config = TomlConfig {
        data_folder: Some(PathBuf::from("/data")),
        ..TomlConfig::default()
    };
    let text = toml::to_string(&config).unwrap();
    let parsed: TomlConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_initializer_creates_nested_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("level1").join("level2");

    let initializer = DataFolderInitializer::new(root.clone());
    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(root.is_dir());

    // Safe to call multiple times
    assert!(initializer.ensure_directory_exists().is_ok());
    assert_eq!(initializer.saved_items_path(), root.join(SAVED_ITEMS_FILE));
}
