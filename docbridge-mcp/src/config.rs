//! Router configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::protocol::ServerInfo;

/// Header carrying the session id on requests and responses
pub const DEFAULT_SESSION_HEADER: &str = "mcp-session-id";

/// MCP router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRouterConfig {
    /// Path the router is mounted on
    pub endpoint: String,

    /// Session header name
    pub session_header: String,

    /// Server identity reported during the handshake
    pub server_info: ServerInfo,

    /// Usage hints returned in the initialize result
    pub instructions: Option<String>,

    /// Session configuration
    pub session: SessionConfig,

    /// Answer GET without a usable session with 400 instead of 405
    pub strict_unknown_session: bool,
}

impl Default for McpRouterConfig {
    fn default() -> Self {
        Self {
            endpoint: "/mcp".to_string(),
            session_header: DEFAULT_SESSION_HEADER.to_string(),
            server_info: ServerInfo::default(),
            instructions: None,
            session: SessionConfig::default(),
            strict_unknown_session: false,
        }
    }
}

impl McpRouterConfig {
    /// Mount the router on a different path
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_session_header(mut self, header: impl Into<String>) -> Self {
        self.session_header = header.into();
        self
    }

    pub fn with_server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.server_info = ServerInfo {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn with_strict_unknown_session(mut self, strict: bool) -> Self {
        self.strict_unknown_session = strict;
        self
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session without a push stream is closed
    pub idle_timeout: Duration,

    /// How often the sweeper looks for idle sessions
    pub cleanup_interval: Duration,

    /// Maximum number of open sessions
    pub max_sessions: usize,

    /// Pushes queued per session while no stream is attached
    pub max_pending_pushes: usize,

    /// Interval of SSE keep-alive comments
    pub keep_alive: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(1800), // 30 minutes
            cleanup_interval: Duration::from_secs(60),
            max_sessions: 1024,
            max_pending_pushes: 256,
            keep_alive: Duration::from_secs(15),
        }
    }
}

impl SessionConfig {
    pub fn with_idle_timeout(mut self, idle_timeout: Duration, cleanup_interval: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self.cleanup_interval = cleanup_interval;
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }
}
