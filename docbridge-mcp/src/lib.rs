//! # docbridge-mcp: session-scoped MCP router for Axum
//!
//! This crate serves the Model Context Protocol over a single HTTP endpoint.
//! Clients open a session with an `initialize` request, exchange JSON-RPC
//! messages on it, receive server pushes over a Server-Sent Events stream,
//! and close it with DELETE.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docbridge_mcp::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> McpResult<()> {
//!     let tools = ToolRegistry::new().with_tool(
//!         "echo",
//!         "Echo the input message",
//!         json!({
//!             "type": "object",
//!             "properties": { "message": { "type": "string" } },
//!             "required": ["message"]
//!         }),
//!         handler_fn(|args: Value, _ctx: ToolContext| async move {
//!             let message = args["message"].as_str().unwrap_or_default();
//!             Ok(ToolsCallResult::text(format!("Echo: {}", message)))
//!         }),
//!     )?;
//!
//!     let state = McpRouterState::new(McpRouterConfig::default(), tools)?;
//!     state.spawn_sweeper();
//!     let app = mcp_routes(state);
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - JSON-RPC 2.0 envelopes and MCP payloads
//! - [`registry`] - Named tool handlers with JSON Schema argument checks
//! - [`session`] - Session ids, per-session [`Channel`]s and the [`SessionRegistry`]
//! - [`transport`] - The Axum router classifying POST, GET and DELETE
//! - [`error`] - Error type mapped to HTTP status and JSON-RPC codes
//!
//! ## Session lifecycle
//!
//! A channel is created per handshake and moves `Initializing -> Active ->
//! Closed`. The registry maps ids only to active channels. Closing happens on
//! DELETE, idle expiry, or shutdown; closed channels emit a
//! [`SessionEvent`] that the router's reaper task consumes.

pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

pub use config::{McpRouterConfig, SessionConfig, DEFAULT_SESSION_HEADER};
pub use error::{McpError, McpResult};

pub use protocol::{
    InitializeParams, InitializeResult, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, McpMethod, ServerInfo, Tool, ToolContent, ToolsCallResult,
    LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};

pub use registry::{
    handler_fn, FnHandler, PushSink, ToolContext, ToolFailure, ToolHandler, ToolName,
    ToolOutcome, ToolRegistry,
};

pub use session::{
    Channel, ChannelOptions, ChannelState, CloseReason, PushDelivery, PushStream,
    RemoveOutcome, SessionEvent, SessionId, SessionRegistry,
};

pub use transport::{mcp_routes, McpRouterState};

// Convenience re-exports for common use cases
pub mod prelude {
    //! Commonly used types and traits

    pub use crate::{
        config::{McpRouterConfig, SessionConfig},
        error::{McpError, McpResult},
        protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Tool, ToolsCallResult},
        registry::{handler_fn, ToolContext, ToolFailure, ToolHandler, ToolOutcome, ToolRegistry},
        session::{CloseReason, SessionId},
        transport::{mcp_routes, McpRouterState},
    };

    pub use async_trait::async_trait;
    pub use serde_json::{json, Value};
}
