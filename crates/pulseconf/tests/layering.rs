//! File layering tests: later files win field by field, env wins over files.

use pulseconf::{ConfigError, PulseConfig};
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn later_files_override_earlier_ones() {
    let dir = TempDir::new().unwrap();
    let system = write_config(
        &dir,
        "system.toml",
        r#"
[endpoint]
host = "system-collector"
port = 9000

[activity]
environment = "indoor"
"#,
    );
    let local = write_config(
        &dir,
        "local.toml",
        r#"
[endpoint]
host = "local-collector"
"#,
    );

    let (config, sources) = PulseConfig::load_files(&[system.clone(), local.clone()], |_| None)
        .unwrap();

    assert_eq!(config.endpoint.host, "local-collector");
    assert_eq!(config.endpoint.port, 9000);
    assert_eq!(config.activity.environment, "indoor");
    assert_eq!(sources.files, vec![system, local]);
}

#[test]
fn env_overrides_files() {
    let dir = TempDir::new().unwrap();
    let file = write_config(
        &dir,
        "pulsewire.toml",
        r#"
[endpoint]
host = "file-host"
"#,
    );

    let (config, sources) = PulseConfig::load_files(&[file], |key| match key {
        "PULSEWIRE_ENDPOINT_HOST" => Some("env-host".to_string()),
        _ => None,
    })
    .unwrap();

    assert_eq!(config.endpoint.host, "env-host");
    assert_eq!(sources.env_overrides, vec!["PULSEWIRE_ENDPOINT_HOST"]);
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = PulseConfig::load_files(&[missing.clone()], |_| None).unwrap_err();
    match err {
        ConfigError::FileRead { path, .. } => assert_eq!(path, missing),
        other => panic!("expected read error, got {:?}", other),
    }
}

#[test]
fn malformed_file_names_the_file() {
    let dir = TempDir::new().unwrap();
    let bad = write_config(&dir, "bad.toml", "[endpoint\nhost = ");

    let err = PulseConfig::load_files(&[bad.clone()], |_| None).unwrap_err();
    assert!(err.to_string().contains("bad.toml"));
}

#[test]
fn cli_override_replaces_local_file() {
    let dir = TempDir::new().unwrap();
    let explicit = write_config(&dir, "explicit.toml", "[endpoint]\nport = 1234\n");

    let files = pulseconf::discover_config_files_with_override(Some(&explicit));
    assert_eq!(files.last(), Some(&explicit));
}

#[test]
fn missing_explicit_config_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("typo.toml");

    let files = pulseconf::discover_config_files_with_override(Some(&missing));
    assert_eq!(files.last(), Some(&missing));

    match PulseConfig::load_from(Some(&missing)).unwrap_err() {
        ConfigError::FileRead { path, .. } => assert_eq!(path, missing),
        other => panic!("expected read error, got {:?}", other),
    }
}
