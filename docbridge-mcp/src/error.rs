//! Error types for MCP operations

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use thiserror::Error;

use crate::protocol::{JsonRpcError, JsonRpcErrorCode, JsonRpcResponse};

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// MCP error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum McpError {
    /// No session and not an initialization request
    #[error("Bad Request: No valid session ID provided or not an initialization request.")]
    Classification,

    /// Session header missing or not mapped to an active session
    #[error("Unknown session: {session_id:?}")]
    UnknownSession { session_id: Option<String> },

    /// A push stream is already attached to the session
    #[error("Conflict: Only one SSE stream is allowed per session")]
    StreamConflict { session_id: String },

    /// Handshake or session registration failed
    #[error("Server connection failed: {message}")]
    ConnectionSetup { message: String },

    /// Dispatching to the channel or a handler failed unexpectedly
    #[error("Handler invocation failed: {message}")]
    HandlerInvocation { message: String },

    /// Body was not valid JSON
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Body was JSON but not a valid request envelope
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// `initialize` received on an already initialized session
    #[error("Invalid Request: Server already initialized")]
    AlreadyInitialized { session_id: Option<String> },

    /// Unknown protocol method or tool
    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    /// Arguments rejected by the registry
    #[error("Invalid params: {message}")]
    InvalidParams { message: String },

    /// Tool registration rejected
    #[error("Registration error: {message}")]
    Registration { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Internal server errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl McpError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            McpError::Classification => StatusCode::BAD_REQUEST,
            McpError::UnknownSession { .. } => StatusCode::BAD_REQUEST,
            McpError::StreamConflict { .. } => StatusCode::CONFLICT,
            McpError::ConnectionSetup { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            McpError::HandlerInvocation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            McpError::Parse { .. } => StatusCode::BAD_REQUEST,
            McpError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            McpError::AlreadyInitialized { .. } => StatusCode::BAD_REQUEST,
            // Protocol-level failures travel inside a 200 response
            McpError::MethodNotFound { .. } => StatusCode::OK,
            McpError::InvalidParams { .. } => StatusCode::OK,
            McpError::Registration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            McpError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            McpError::Serialization { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            McpError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for JSON-RPC responses
    pub fn error_code(&self) -> i32 {
        match self {
            McpError::Classification => JsonRpcErrorCode::SessionError as i32,
            McpError::UnknownSession { .. } => JsonRpcErrorCode::SessionError as i32,
            McpError::StreamConflict { .. } => JsonRpcErrorCode::SessionError as i32,
            McpError::ConnectionSetup { .. } => JsonRpcErrorCode::ConnectionFailed as i32,
            McpError::Parse { .. } => JsonRpcErrorCode::ParseError as i32,
            McpError::InvalidRequest { .. } => JsonRpcErrorCode::InvalidRequest as i32,
            McpError::AlreadyInitialized { .. } => JsonRpcErrorCode::InvalidRequest as i32,
            McpError::MethodNotFound { .. } => JsonRpcErrorCode::MethodNotFound as i32,
            McpError::InvalidParams { .. } => JsonRpcErrorCode::InvalidParams as i32,
            _ => JsonRpcErrorCode::InternalError as i32,
        }
    }

    /// Create a sanitized error message for external clients
    pub fn client_message(&self) -> String {
        match self {
            McpError::UnknownSession { .. } => "Invalid or missing session ID".to_string(),
            McpError::ConnectionSetup { .. } => "Server connection failed".to_string(),
            McpError::HandlerInvocation { .. } => {
                "Internal server error during request handling".to_string()
            }
            McpError::MethodNotFound { method } => format!("Method '{}' not found", method),
            McpError::Registration { .. }
            | McpError::Configuration { .. }
            | McpError::Serialization { .. }
            | McpError::Internal { .. } => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this error is answered inside a successful HTTP exchange
    pub fn is_protocol_level(&self) -> bool {
        self.status_code() == StatusCode::OK
    }

    /// Convert into a JSON-RPC error object
    pub fn to_jsonrpc(&self) -> JsonRpcError {
        match self {
            McpError::MethodNotFound { method } => JsonRpcError::method_not_found(method),
            McpError::InvalidParams { message } => JsonRpcError::invalid_params(message.clone()),
            other => JsonRpcError::new(other.error_code(), other.client_message(), None),
        }
    }

    /// Build the HTTP response for this error, echoing the correlation id
    pub fn into_response_with_id(self, id: Option<Value>) -> Response {
        let status = self.status_code();
        let body = JsonRpcResponse::error(self.to_jsonrpc(), id);
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for McpError {
    fn into_response(self) -> Response {
        self.into_response_with_id(None)
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::Serialization {
            message: err.to_string(),
        }
    }
}
