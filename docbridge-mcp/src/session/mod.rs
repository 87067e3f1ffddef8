//! Session identity, per-session channels and the session registry

mod channel;
mod registry;

pub use channel::{Channel, ChannelOptions, ChannelState, PushDelivery, PushStream};
pub use registry::{RemoveOutcome, SessionRegistry};

use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt};
use uuid::Uuid;

/// Opaque server-generated session identifier (hyphenated UUID v4)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Why a channel was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent DELETE
    ClientRequested,
    /// Idle longer than the configured timeout
    Expired,
    /// Process is shutting down
    Shutdown,
    /// Handshake could not be completed
    HandshakeFailed,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CloseReason::ClientRequested => "client requested",
            CloseReason::Expired => "expired",
            CloseReason::Shutdown => "shutdown",
            CloseReason::HandshakeFailed => "handshake failed",
        };
        f.write_str(text)
    }
}

/// Lifecycle notifications emitted by channels and consumed by the registry reaper
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Created { session_id: SessionId },
    Closed { session_id: SessionId, reason: CloseReason },
}
