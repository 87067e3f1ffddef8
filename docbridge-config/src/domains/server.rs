//! HTTP server configuration

use crate::error::ConfigResult;
use crate::validation::{validate_port_range, validate_required_string, validate_route_path, Validatable};
use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path the MCP endpoint is mounted on
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Wrap the app in an HTTP trace layer
    #[serde(default = "crate::domains::utils::default_true")]
    pub enable_tracing: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            endpoint: default_endpoint(),
            enable_tracing: true,
        }
    }
}

impl ServerConfig {
    /// `address:port` string suitable for binding
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Validatable for ServerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.bind_address, "bind_address", self.domain_name())?;
        validate_port_range(self.port, "port", self.domain_name())?;
        validate_route_path(&self.endpoint, "endpoint", self.domain_name())?;
        if self.endpoint == "/health" {
            return Err(self.validation_error("endpoint cannot be /health"));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "server"
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_endpoint() -> String {
    "/mcp".to_string()
}
