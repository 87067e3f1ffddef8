//! Upstream documentation service configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Documentation service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Base URL of the documentation API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout (seconds)
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_timeout")]
    pub timeout: Duration,

    /// Token budget used when the caller gives none
    #[serde(default = "default_tokens")]
    pub default_tokens: u32,

    /// Smallest token budget ever requested upstream
    #[serde(default = "default_tokens")]
    pub minimum_tokens: u32,

    /// Value of the `X-Context7-Source` request header
    #[serde(default = "default_source_header")]
    pub source_header: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            default_tokens: default_tokens(),
            minimum_tokens: default_tokens(),
            source_header: default_source_header(),
        }
    }
}

impl Validatable for DocsConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.base_url, "base_url", self.domain_name())?;
        validate_positive(self.timeout.as_secs(), "timeout", self.domain_name())?;
        validate_positive(self.minimum_tokens, "minimum_tokens", self.domain_name())?;
        validate_required_string(&self.source_header, "source_header", self.domain_name())?;

        if self.default_tokens < self.minimum_tokens {
            return Err(self.validation_error(format!(
                "default_tokens ({}) cannot be below minimum_tokens ({})",
                self.default_tokens, self.minimum_tokens
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "docs"
    }
}

fn default_base_url() -> String {
    "https://context7.com/api".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_tokens() -> u32 {
    5000
}

fn default_source_header() -> String {
    "mcp-server".to_string()
}
