//! Domain-driven configuration for the docbridge MCP server
//!
//! Configuration is split by functional domain (server, session, docs,
//! logging), loaded from YAML, overridden by `DOCBRIDGE_*` environment
//! variables and validated per domain.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    docs::DocsConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    server::ServerConfig,
    session::SessionConfig,
    DocbridgeConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration;
