//! Session lifecycle configuration

use crate::error::ConfigResult;
use crate::validation::{validate_header_name, validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Header carrying the session id
    #[serde(default = "default_header_name")]
    pub header_name: String,

    /// Close sessions idle this long (seconds); 0 disables expiry
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_idle_timeout")]
    pub idle_timeout: Duration,

    /// How often idle sessions are swept (seconds)
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_cleanup_interval")]
    pub cleanup_interval: Duration,

    /// Maximum number of open sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Push messages kept per session while no stream is attached
    #[serde(default = "default_max_pending_pushes")]
    pub max_pending_pushes: usize,

    /// SSE keep-alive interval (seconds)
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_push_keep_alive")]
    pub push_keep_alive: Duration,

    /// Answer GET without a usable session with 400 instead of 405
    #[serde(default = "crate::domains::utils::default_false")]
    pub strict_unknown_session: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            header_name: default_header_name(),
            idle_timeout: default_idle_timeout(),
            cleanup_interval: default_cleanup_interval(),
            max_sessions: default_max_sessions(),
            max_pending_pushes: default_max_pending_pushes(),
            push_keep_alive: default_push_keep_alive(),
            strict_unknown_session: false,
        }
    }
}

impl SessionConfig {
    /// Whether idle sessions should be expired at all
    pub fn expiry_enabled(&self) -> bool {
        !self.idle_timeout.is_zero()
    }
}

impl Validatable for SessionConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_header_name(&self.header_name, "header_name", self.domain_name())?;
        validate_positive(self.max_sessions, "max_sessions", self.domain_name())?;
        validate_positive(
            self.push_keep_alive.as_secs(),
            "push_keep_alive",
            self.domain_name(),
        )?;

        if self.expiry_enabled() {
            validate_positive(
                self.cleanup_interval.as_secs(),
                "cleanup_interval",
                self.domain_name(),
            )?;
            if self.cleanup_interval > self.idle_timeout {
                return Err(self.validation_error(
                    "cleanup_interval cannot be longer than idle_timeout",
                ));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "session"
    }
}

fn default_header_name() -> String {
    "mcp-session-id".to_string()
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(1800)
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_max_sessions() -> usize {
    1024
}

fn default_max_pending_pushes() -> usize {
    256
}

fn default_push_keep_alive() -> Duration {
    Duration::from_secs(15)
}
