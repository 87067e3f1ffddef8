//! MCP protocol types: JSON-RPC 2.0 envelopes and MCP message payloads

pub mod jsonrpc;
pub mod messages;

pub use jsonrpc::{
    JsonRpcError, JsonRpcErrorCode, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JSONRPC_VERSION,
};
pub use messages::{
    ClientCapabilities, ClientInfo, InitializeParams, InitializeResult, McpMethod,
    ProgressNotification, RequestMeta, ServerCapabilities, ServerInfo, Tool, ToolContent,
    ToolsCallParams, ToolsCallResult, ToolsCapability, ToolsListResult,
};

use serde_json::Value;

/// Latest protocol revision this server speaks
pub const LATEST_PROTOCOL_VERSION: &str = "2025-03-26";

/// Protocol revisions accepted during the handshake, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-03-26", "2024-11-05", "2024-10-07"];

/// Pick the protocol version to answer an initialize request with.
///
/// A supported client version is echoed back; anything else gets the latest.
pub fn negotiate_protocol_version(requested: &str) -> String {
    if SUPPORTED_PROTOCOL_VERSIONS.contains(&requested) {
        requested.to_string()
    } else {
        LATEST_PROTOCOL_VERSION.to_string()
    }
}

/// Decode `body` as a well-formed initialization request.
///
/// Well-formed means: a JSON-RPC request for `initialize`, carrying a
/// correlation id, whose params decode as [`InitializeParams`].
pub fn parse_initialize_request(body: &Value) -> Option<(JsonRpcRequest, InitializeParams)> {
    let request: JsonRpcRequest = serde_json::from_value(body.clone()).ok()?;
    if request.jsonrpc != JSONRPC_VERSION || McpMethod::parse(&request.method) != McpMethod::Initialize {
        return None;
    }
    if request.id.is_none() {
        return None;
    }
    let params: InitializeParams = serde_json::from_value(request.params.clone()?).ok()?;
    Some((request, params))
}

/// Whether `body` is a well-formed initialization request
pub fn is_initialize_request(body: &Value) -> bool {
    parse_initialize_request(body).is_some()
}
