use std::collections::HashMap;

use super::*;

fn lookup_from(pairs: Vec<(&str, String)>) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    move |key| map.get(key).cloned()
}

fn workspace() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

#[test]
fn defaults_when_only_workspace_set() {
    let dir = workspace();
    let cfg = ServerConfig::from_lookup(lookup_from(vec![("WORKSPACE_PATH", dir.path().display().to_string())]))
        .unwrap();
    let root = std::fs::canonicalize(dir.path()).unwrap();
    assert_eq!(cfg.workspace_path, root);
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.env, AppEnv::Development);
    assert_eq!(cfg.settings_path, root.join(".ide-server/settings.json"));
}

#[test]
fn parses_port_env_and_settings_path() {
    let dir = workspace();
    let cfg = ServerConfig::from_lookup(lookup_from(vec![
        ("WORKSPACE_PATH", dir.path().display().to_string()),
        ("PORT", "8080".into()),
        ("NODE_ENV", "production".into()),
        ("SETTINGS_PATH", "/tmp/assistant.json".into()),
    ]))
    .unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.env, AppEnv::Production);
    assert_eq!(cfg.env.as_str(), "production");
    assert_eq!(cfg.settings_path, PathBuf::from("/tmp/assistant.json"));
}

#[test]
fn missing_workspace_errors() {
    let err = ServerConfig::from_lookup(lookup_from(vec![])).unwrap_err();
    assert!(matches!(err, ConfigError::MissingWorkspace));
}

#[test]
fn nonexistent_workspace_errors() {
    let err = ServerConfig::from_lookup(lookup_from(vec![("WORKSPACE_PATH", "/definitely/not/here".into())]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::WorkspaceUnavailable { .. }));
}

#[test]
fn invalid_port_errors() {
    let dir = workspace();
    let err = ServerConfig::from_lookup(lookup_from(vec![
        ("WORKSPACE_PATH", dir.path().display().to_string()),
        ("PORT", "eighty".into()),
    ]))
    .unwrap_err();
    assert!(err.to_string().contains("invalid PORT"));
}

#[test]
fn invalid_node_env_errors() {
    let dir = workspace();
    let err = ServerConfig::from_lookup(lookup_from(vec![
        ("WORKSPACE_PATH", dir.path().display().to_string()),
        ("NODE_ENV", "staging".into()),
    ]))
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnv(ref v) if v == "staging"));
}
