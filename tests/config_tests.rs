// Config loading and validation tests

use khan::config::{AppConfig, IdentityMode};

const VALID_CONFIG: &str = r#"
[server]
port = 8080
host = "0.0.0.0"

[node]
name = "node-1"

[identity]
mode = "cluster"
resync_interval_secs = 30

[conntrack]
script_path = "/opt/khan/conntrack.sh"
resync_interval_secs = 15
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.node.name, "node-1");
    assert_eq!(config.identity.mode, IdentityMode::Cluster);
    assert_eq!(config.identity.resync_interval_secs, 30);
    assert_eq!(config.conntrack.script_path, "/opt/khan/conntrack.sh");
    assert_eq!(config.conntrack.resync_interval_secs, 15);
}

#[test]
fn test_config_intervals_default_to_thirty_seconds() {
    let minimal = r#"
[server]
port = 8080
host = "0.0.0.0"

[node]
name = "node-1"

[identity]

[conntrack]
script_path = "/opt/khan/conntrack.sh"
"#;
    let config = AppConfig::load_from_str(minimal).expect("load_from_str");
    assert_eq!(config.identity.resync_interval_secs, 30);
    assert_eq!(config.conntrack.resync_interval_secs, 30);
    assert_eq!(config.identity.mode, IdentityMode::Cluster);
}

#[test]
fn test_config_parses_push_mode() {
    let pushed = VALID_CONFIG.replace("mode = \"cluster\"", "mode = \"push\"");
    let config = AppConfig::load_from_str(&pushed).expect("load_from_str");
    assert_eq!(config.identity.mode, IdentityMode::Push);
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 8080", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_empty_node_name() {
    let bad = VALID_CONFIG.replace("name = \"node-1\"", "name = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("node.name"));
}

#[test]
fn test_config_validation_rejects_zero_identity_interval() {
    let bad = VALID_CONFIG.replace("resync_interval_secs = 30", "resync_interval_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("identity.resync_interval_secs"));
}

#[test]
fn test_config_validation_rejects_zero_conntrack_interval() {
    let bad = VALID_CONFIG.replace("resync_interval_secs = 15", "resync_interval_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("conntrack.resync_interval_secs"));
}

#[test]
fn test_config_validation_rejects_empty_script_path() {
    let bad = VALID_CONFIG.replace(
        "script_path = \"/opt/khan/conntrack.sh\"",
        "script_path = \"\"",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("conntrack.script_path"));
}

#[test]
fn test_config_rejects_unknown_identity_mode() {
    let bad = VALID_CONFIG.replace("mode = \"cluster\"", "mode = \"gossip\"");
    assert!(AppConfig::load_from_str(&bad).is_err());
}
