//! HTTP transport: the session-aware router for POST, GET and DELETE

pub mod sse;
pub mod streamable_http;

pub use sse::push_stream_response;
pub use streamable_http::{mcp_routes, McpRouterState};
