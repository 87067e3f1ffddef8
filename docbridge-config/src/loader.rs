//! Configuration loading and environment variable handling

use crate::domains::DocbridgeConfig;
use crate::error::{ConfigError, ConfigResult};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "DOCBRIDGE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<DocbridgeConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: DocbridgeConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<DocbridgeConfig> {
        let mut config = DocbridgeConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<DocbridgeConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut DocbridgeConfig) -> ConfigResult<()> {
        self.apply_server_overrides(&mut config.server)?;
        self.apply_session_overrides(&mut config.session)?;
        self.apply_docs_overrides(&mut config.docs)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply server config overrides
    fn apply_server_overrides(
        &self,
        config: &mut crate::domains::server::ServerConfig,
    ) -> ConfigResult<()> {
        if let Ok(bind) = self.get_env_var("SERVER_BIND_ADDRESS") {
            config.bind_address = bind;
        }
        if let Some(port) = self.parse_env_var("SERVER_PORT")? {
            config.port = port;
        }
        if let Ok(endpoint) = self.get_env_var("SERVER_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(enabled) = self.parse_env_var("SERVER_ENABLE_TRACING")? {
            config.enable_tracing = enabled;
        }
        Ok(())
    }

    /// Apply session config overrides
    fn apply_session_overrides(
        &self,
        config: &mut crate::domains::session::SessionConfig,
    ) -> ConfigResult<()> {
        if let Ok(header) = self.get_env_var("SESSION_HEADER") {
            config.header_name = header;
        }
        if let Some(seconds) = self.parse_env_var::<u64>("SESSION_IDLE_TIMEOUT")? {
            config.idle_timeout = Duration::from_secs(seconds);
        }
        if let Some(seconds) = self.parse_env_var::<u64>("SESSION_CLEANUP_INTERVAL")? {
            config.cleanup_interval = Duration::from_secs(seconds);
        }
        if let Some(max) = self.parse_env_var("SESSION_MAX_SESSIONS")? {
            config.max_sessions = max;
        }
        if let Some(strict) = self.parse_env_var("SESSION_STRICT_UNKNOWN")? {
            config.strict_unknown_session = strict;
        }
        Ok(())
    }

    /// Apply docs service overrides
    fn apply_docs_overrides(
        &self,
        config: &mut crate::domains::docs::DocsConfig,
    ) -> ConfigResult<()> {
        if let Ok(base_url) = self.get_env_var("DOCS_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(seconds) = self.parse_env_var::<u64>("DOCS_TIMEOUT")? {
            config.timeout = Duration::from_secs(seconds);
        }
        if let Some(tokens) = self.parse_env_var("DOCS_DEFAULT_TOKENS")? {
            config.default_tokens = tokens;
        }
        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Some(level) = self.parse_env_var("LOG_LEVEL")? {
            config.level = level;
        }
        if let Some(format) = self.parse_env_var("LOG_FORMAT")? {
            config.format = format;
        }
        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }

    /// Parse a prefixed environment variable if it is set
    fn parse_env_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", name, e))),
            Err(_) => Ok(None),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
