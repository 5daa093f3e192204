use std::fs;
use std::path::Path;

use tempfile::tempdir;

use super::*;

#[test]
fn test_format_from_path() {
    assert_eq!(ConfigFormat::from_path(Path::new("a/session.json")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(Path::new("session.JSON")), Some(ConfigFormat::Json));
    #[cfg(feature = "yaml-config")]
    assert_eq!(ConfigFormat::from_path(Path::new("session.yml")), Some(ConfigFormat::Yaml));
    #[cfg(feature = "toml-config")]
    assert_eq!(ConfigFormat::from_path(Path::new("session.toml")), Some(ConfigFormat::Toml));
    assert_eq!(ConfigFormat::from_path(Path::new("session.ini")), None);
    assert_eq!(ConfigFormat::from_path(Path::new("session")), None);
}

#[test]
fn test_defaults_from_empty_json() {
    let config = SessionConfig::parse("{}", ConfigFormat::Json).expect("empty object parses");
    assert_eq!(config, SessionConfig::default());
    assert_eq!(config.startup_failure_policy, StartupFailurePolicy::Aggregate);
}

#[test]
fn test_parse_json_overrides() {
    let text = r#"{
        "identity": "svc",
        "startup_failure_policy": "log_and_continue",
        "disabled_plugins": ["noisy"],
        "components": {
            "cache": { "order": 5, "await_start": false },
            "db": { "shutdown_order": 99, "depends_on": ["disk"] }
        }
    }"#;
    let config = SessionConfig::parse(text, ConfigFormat::Json).expect("valid json");

    assert_eq!(config.identity.as_deref(), Some("svc"));
    assert_eq!(config.startup_failure_policy, StartupFailurePolicy::LogAndContinue);
    assert!(config.is_plugin_disabled("noisy"));
    assert!(!config.is_plugin_disabled("quiet"));

    let cache = &config.components["cache"];
    assert_eq!(cache.order, Some(5));
    assert_eq!(cache.await_start, Some(false));
    assert_eq!(cache.shutdown_order, None);

    let db = &config.components["db"];
    assert_eq!(db.shutdown_order, Some(99));
    assert_eq!(db.depends_on, vec!["disk".to_string()]);
}

#[cfg(feature = "toml-config")]
#[test]
fn test_load_toml_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("session.toml");
    fs::write(
        &path,
        r#"
identity = "keel-test"
log_level = "debug"

[components.heartbeat]
order = 20
await_start = false
"#,
    )
    .expect("write config");

    let config = SessionConfig::load(&path).expect("load toml");
    assert_eq!(config.identity.as_deref(), Some("keel-test"));
    assert_eq!(config.log_level.as_deref(), Some("debug"));
    assert_eq!(config.components["heartbeat"].order, Some(20));
    assert_eq!(config.components["heartbeat"].await_start, Some(false));
}

#[cfg(feature = "yaml-config")]
#[test]
fn test_serialize_then_load_yaml() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("session.yaml");

    let mut config = SessionConfig::default();
    config.identity = Some("yaml-session".to_string());
    config.components.insert(
        "db".to_string(),
        MetadataOverride { order: Some(1), ..Default::default() },
    );
    fs::write(&path, config.serialize(ConfigFormat::Yaml).expect("serialize")).expect("write");

    let loaded = SessionConfig::load(&path).expect("load yaml");
    assert_eq!(loaded, config);
}

#[test]
fn test_load_rejects_unknown_extension() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("session.ini");
    fs::write(&path, "identity=x").expect("write");

    match SessionConfig::load(&path) {
        Err(ConfigError::UnsupportedFormat(p)) => assert_eq!(p, path),
        other => panic!("expected UnsupportedFormat, got {:?}", other),
    }
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("missing.json");
    assert!(matches!(SessionConfig::load(&path), Err(ConfigError::Io { .. })));
}

#[test]
fn test_parse_invalid_json() {
    let err = SessionConfig::parse("{ not json", ConfigFormat::Json).unwrap_err();
    assert!(matches!(err, ConfigError::Deserialization { format: "json", .. }));
}
