//! Tests for configuration parsing

use cpg_core::config::CONFIG_FILE_NAME;
use cpg_core::{CpgBuilder, CpgConfig};
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = CpgConfig::default();
    assert!(config.build.parallel);
    assert!(config.build.respect_gitignore);
    assert!(config.build.include.iter().any(|g| g == "**/*.ts"));
    assert!(config.build.include.iter().any(|g| g == "**/*.tsx"));
    assert!(config.build.exclude_dirs.is_empty());
    assert_eq!(config.query.max_paths, 10_000);
}

#[test]
fn test_serialize_config() {
    let config = CpgConfig::default();
    let toml_str = toml::to_string(&config).unwrap();
    assert!(toml_str.contains("exclude_dirs"));
    assert!(toml_str.contains("max_paths"));
}

#[test]
fn test_partial_config_fills_defaults() {
    let toml_str = r#"
[build]
parallel = false

[query]
max_paths = 50
"#;

    let config: CpgConfig = toml::from_str(toml_str).unwrap();
    assert!(!config.build.parallel);
    assert!(config.build.respect_gitignore);
    assert_eq!(config.build.include, CpgConfig::default().build.include);
    assert_eq!(config.query.max_paths, 50);
}

#[test]
fn test_empty_config_is_default() {
    let config: CpgConfig = toml::from_str("").unwrap();
    assert_eq!(config, CpgConfig::default());
}

#[test]
fn test_custom_include_and_exclude() {
    let toml_str = r#"
[build]
include = ["src/**/*.ts"]
exclude_dirs = ["generated"]
"#;

    let config: CpgConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(config.build.include, vec!["src/**/*.ts"]);
    assert_eq!(config.build.exclude_dirs, vec!["generated"]);
}

#[test]
fn test_find_and_load_walks_up() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "[build]\nrespect_gitignore = false\n",
    )
    .unwrap();
    let nested = dir.path().join("packages").join("app");
    std::fs::create_dir_all(&nested).unwrap();

    let config = CpgConfig::find_and_load(&nested).unwrap();
    assert!(!config.build.respect_gitignore);
}

#[test]
fn test_invalid_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "[build]\nparallel = \"sometimes\"\n").unwrap();

    assert!(CpgConfig::from_file(&path).is_err());
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);

    let mut config = CpgConfig::default();
    config.build.exclude_dirs.push("vendor".to_string());
    config.query.max_paths = 7;
    config.save(&path).unwrap();

    let loaded = CpgConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_builder_uses_query_limit() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chain.ts");
    std::fs::write(&path, "function a() { b(); }\nfunction b() { c(); }\nfunction c() {}\n").unwrap();

    let mut config = CpgConfig::default();
    config.query.max_paths = 2;
    let builder = CpgBuilder::with_config(config);
    let graph = builder.build_from_file(&path);

    let q = cpg_core::GraphQuery::new().max_depth(3);
    let paths = builder.query(&graph).run(&q).paths.unwrap();
    assert_eq!(paths.len(), 2);
}
