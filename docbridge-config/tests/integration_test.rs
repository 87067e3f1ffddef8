//! Integration tests for docbridge-config

use docbridge_config::*;
use std::io::Write;
use std::time::Duration;
use temp_env::with_vars;

#[test]
fn test_default_config_validation() {
    let config = DocbridgeConfig::default();
    assert!(config.validate_all().is_ok());

    assert_eq!(config.server.socket_address(), "127.0.0.1:3000");
    assert_eq!(config.server.endpoint, "/mcp");
    assert_eq!(config.session.header_name, "mcp-session-id");
    assert_eq!(config.session.idle_timeout, Duration::from_secs(1800));
    assert_eq!(config.docs.minimum_tokens, 5000);
    assert!(!config.session.strict_unknown_session);
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("DOCBRIDGE_SERVER_PORT", Some("8088")),
        ("DOCBRIDGE_SESSION_IDLE_TIMEOUT", Some("600")),
        ("DOCBRIDGE_SESSION_STRICT_UNKNOWN", Some("true")),
        ("DOCBRIDGE_DOCS_BASE_URL", Some("http://localhost:9999/api")),
        ("DOCBRIDGE_LOG_LEVEL", Some("debug")),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();

        assert_eq!(config.server.port, 8088);
        assert_eq!(config.session.idle_timeout, Duration::from_secs(600));
        assert!(config.session.strict_unknown_session);
        assert_eq!(config.docs.base_url, "http://localhost:9999/api");
        assert_eq!(config.logging.level, LogLevel::Debug);
    });
}

#[test]
fn test_invalid_env_value_is_reported() {
    with_vars(vec![("DOCBRIDGE_SERVER_PORT", Some("eighty"))], || {
        let result = ConfigLoader::new().from_env();
        assert!(matches!(result, Err(ConfigError::EnvError(_))));
    });
}

#[test]
fn test_yaml_file_with_env_override() {
    let yaml = r#"
server:
  bind_address: "0.0.0.0"
  port: 9090
  endpoint: "/rpc"

session:
  header_name: "x-session"
  idle_timeout: 120
  cleanup_interval: 10
  max_sessions: 8

docs:
  timeout: 5

logging:
  level: warn
  format: json
"#;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    with_vars(vec![("DOCBRIDGE_SERVER_PORT", Some("7070"))], || {
        let config = ConfigLoader::new().load(Some(file.path())).unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.server.port, 7070);
        assert_eq!(config.server.endpoint, "/rpc");
        assert_eq!(config.session.header_name, "x-session");
        assert_eq!(config.session.cleanup_interval, Duration::from_secs(10));
        assert_eq!(config.session.max_sessions, 8);
        assert_eq!(config.docs.timeout, Duration::from_secs(5));
        assert_eq!(config.docs.base_url, "https://context7.com/api");
        assert_eq!(config.logging.format, LogFormat::Json);
    });
}

#[test]
fn test_validation_failures() {
    let mut config = DocbridgeConfig::default();
    config.session.max_sessions = 0;
    assert!(matches!(
        config.validate_all(),
        Err(ConfigError::DomainError { ref domain, .. }) if domain == "session"
    ));

    let mut config = DocbridgeConfig::default();
    config.docs.base_url = "not a url".to_string();
    assert!(config.validate_all().is_err());

    let mut config = DocbridgeConfig::default();
    config.session.cleanup_interval = Duration::from_secs(3600);
    assert!(config.validate_all().is_err());

    let mut config = DocbridgeConfig::default();
    config.session.idle_timeout = Duration::ZERO;
    config.session.cleanup_interval = Duration::ZERO;
    assert!(config.validate_all().is_ok());
}

#[test]
fn test_sample_config_parses_back() {
    let sample = DocbridgeConfig::generate_sample();
    let parsed: DocbridgeConfig = serde_yaml::from_str(&sample).unwrap();
    assert!(parsed.validate_all().is_ok());
    assert!(sample.contains("mcp-session-id"));
}

#[test]
fn test_missing_file_is_read_error() {
    let result = ConfigLoader::new().load(Some("/definitely/not/here.yaml"));
    assert!(matches!(result, Err(ConfigError::FileReadError(_))));
}
