//! Streamable HTTP router for MCP sessions
//!
//! A single endpoint serves three verbs. POST carries one JSON-RPC message
//! (or the initialize request that opens a session), GET attaches the
//! session's push stream as Server-Sent Events, and DELETE closes the session.
//! Sessions are identified by a response/request header, `mcp-session-id` by
//! default.

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    config::McpRouterConfig,
    error::{McpError, McpResult},
    protocol::{
        parse_initialize_request, InitializeParams, JsonRpcError, JsonRpcErrorCode, JsonRpcRequest,
        JsonRpcResponse, JSONRPC_VERSION,
    },
    registry::ToolRegistry,
    session::{Channel, ChannelOptions, CloseReason, RemoveOutcome, SessionId, SessionRegistry},
    transport::sse::push_stream_response,
};

const GET_WITHOUT_SESSION: &str =
    "Method Not Allowed. This endpoint requires a valid MCP session ID for GET requests (SSE).";
const DELETE_WITHOUT_SESSION: &str = "Invalid or missing session ID";

struct RouterInner {
    config: McpRouterConfig,
    session_header: HeaderName,
    channel_options: ChannelOptions,
    sessions: Arc<SessionRegistry>,
    tools: Arc<ToolRegistry>,
}

/// What the session header of a request carries
enum SessionHeader<'a> {
    /// Missing or empty
    Absent,
    /// Present but not visible ASCII; can never match an issued id
    Unusable(String),
    Present(&'a str),
}

/// Shared state behind the MCP routes
#[derive(Clone)]
pub struct McpRouterState {
    inner: Arc<RouterInner>,
}

impl McpRouterState {
    /// Build the router state and start the session reaper.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: McpRouterConfig, tools: impl Into<Arc<ToolRegistry>>) -> McpResult<Self> {
        let session_header = HeaderName::from_bytes(config.session_header.as_bytes()).map_err(|e| {
            McpError::Configuration {
                message: format!("invalid session header '{}': {}", config.session_header, e),
            }
        })?;

        let (sessions, events) = SessionRegistry::new(config.session.max_sessions);
        sessions.spawn_reaper(events);

        let channel_options = ChannelOptions {
            server_info: config.server_info.clone(),
            instructions: config.instructions.clone(),
            max_pending_pushes: config.session.max_pending_pushes,
        };

        Ok(Self {
            inner: Arc::new(RouterInner {
                config,
                session_header,
                channel_options,
                sessions,
                tools: tools.into(),
            }),
        })
    }

    pub fn config(&self) -> &McpRouterConfig {
        &self.inner.config
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.inner.sessions
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.inner.tools
    }

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.len().await
    }

    /// Start closing sessions idle longer than the configured timeout.
    ///
    /// Returns `None` when expiry is disabled by a zero timeout or interval.
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        let session = &self.inner.config.session;
        self.inner
            .sessions
            .spawn_sweeper(session.idle_timeout, session.cleanup_interval)
    }

    /// Close every open session
    pub async fn shutdown(&self) -> usize {
        self.inner.sessions.close_all(CloseReason::Shutdown).await
    }

    fn session_header<'a>(&self, headers: &'a HeaderMap) -> SessionHeader<'a> {
        match headers.get(&self.inner.session_header) {
            None => SessionHeader::Absent,
            Some(value) if value.is_empty() => SessionHeader::Absent,
            Some(value) => match value.to_str() {
                Ok(session_id) => SessionHeader::Present(session_id),
                Err(_) => SessionHeader::Unusable(
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                ),
            },
        }
    }

    /// Session id named by the request and the active channel it maps to.
    ///
    /// An unusable header still counts as naming a session, one that never resolves.
    async fn resolve(&self, headers: &HeaderMap) -> (Option<String>, Option<Arc<Channel>>) {
        match self.session_header(headers) {
            SessionHeader::Present(session_id) => {
                let channel = self.inner.sessions.lookup(session_id).await;
                (Some(session_id.to_string()), channel)
            }
            SessionHeader::Unusable(raw) => (Some(raw), None),
            SessionHeader::Absent => (None, None),
        }
    }

    fn with_session_header(&self, mut response: Response, session_id: &str) -> Response {
        if let Ok(value) = HeaderValue::from_str(session_id) {
            response
                .headers_mut()
                .insert(self.inner.session_header.clone(), value);
        }
        response
    }
}

/// Routes serving POST, GET and DELETE on the configured endpoint
pub fn mcp_routes(state: McpRouterState) -> Router {
    let endpoint = state.config().endpoint.clone();
    Router::new()
        .route(
            &endpoint,
            post(handle_post).get(handle_get).delete(handle_delete),
        )
        .with_state(state)
}

fn correlation_id(body: &Value) -> Option<Value> {
    body.get("id").filter(|id| !id.is_null()).cloned()
}

/// POST: bootstrap a session from an initialize request, or dispatch one
/// message to an existing session
pub async fn handle_post(
    State(state): State<McpRouterState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (session_id, channel) = state.resolve(&headers).await;
    let parsed: Result<Value, _> = serde_json::from_slice(&body);

    match (session_id, channel) {
        (Some(session_id), Some(channel)) => {
            let response = dispatch(&session_id, channel, parsed).await;
            state.with_session_header(response, &session_id)
        }
        (None, _) => match parsed.as_ref().ok().and_then(parse_initialize_request) {
            Some((request, params)) => bootstrap(&state, request, params).await,
            None => {
                let id = parsed.as_ref().ok().and_then(correlation_id);
                warn!(verb = "POST", "Rejected request without session that is not an initialize request");
                McpError::Classification.into_response_with_id(id)
            }
        },
        (Some(session_id), None) => {
            let id = parsed.as_ref().ok().and_then(correlation_id);
            warn!(verb = "POST", session_id = %session_id, "Rejected request for unknown session");
            McpError::Classification.into_response_with_id(id)
        }
    }
}

async fn bootstrap(
    state: &McpRouterState,
    request: JsonRpcRequest,
    params: InitializeParams,
) -> Response {
    let inner = &state.inner;
    let channel = Channel::new(
        Arc::clone(&inner.tools),
        inner.channel_options.clone(),
        inner.sessions.event_sender(),
    );

    let result = channel
        .handshake(&request, &params)
        .and_then(|result| serde_json::to_value(result).map_err(McpError::from));
    let result = match result {
        Ok(result) => result,
        Err(e) => {
            channel.close(CloseReason::HandshakeFailed);
            error!(verb = "POST", "Handshake failed: {}", e);
            return McpError::ConnectionSetup {
                message: e.to_string(),
            }
            .into_response_with_id(request.id);
        }
    };

    let session_id: SessionId = match inner.sessions.create(Arc::clone(&channel)).await {
        Ok(session_id) => session_id,
        Err(e) => {
            channel.close(CloseReason::HandshakeFailed);
            error!(verb = "POST", "Session registration failed: {}", e);
            return e.into_response_with_id(request.id);
        }
    };

    info!(
        session_id = %session_id,
        client = ?params.client_info.as_ref().map(|c| c.name.as_str()),
        "Session initialized"
    );
    let response = Json(JsonRpcResponse::success(result, request.id)).into_response();
    state.with_session_header(response, session_id.as_str())
}

async fn dispatch(
    session_id: &str,
    channel: Arc<Channel>,
    parsed: Result<Value, serde_json::Error>,
) -> Response {
    let body = match parsed {
        Ok(body) => body,
        Err(e) => {
            warn!(verb = "POST", session_id, "Undecodable request body: {}", e);
            return McpError::Parse {
                message: e.to_string(),
            }
            .into_response_with_id(None);
        }
    };

    let id = correlation_id(&body);
    let request = match serde_json::from_value::<JsonRpcRequest>(body) {
        Ok(request) if request.jsonrpc == JSONRPC_VERSION => request,
        Ok(request) => {
            warn!(verb = "POST", session_id, "Unsupported JSON-RPC version {}", request.jsonrpc);
            return McpError::InvalidRequest {
                message: format!("unsupported jsonrpc version '{}'", request.jsonrpc),
            }
            .into_response_with_id(id);
        }
        Err(e) => {
            warn!(verb = "POST", session_id, "Invalid JSON-RPC request: {}", e);
            return McpError::InvalidRequest {
                message: e.to_string(),
            }
            .into_response_with_id(id);
        }
    };

    debug!(verb = "POST", session_id, method = %request.method, "Dispatching request");
    match channel.handle(request).await {
        Ok(Some(response)) => Json(response).into_response(),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            if matches!(e, McpError::HandlerInvocation { .. }) {
                error!(verb = "POST", session_id, "Request handling failed: {}", e);
            } else {
                warn!(verb = "POST", session_id, "Request rejected: {}", e);
            }
            e.into_response_with_id(id)
        }
    }
}

/// GET: attach the session's push stream
pub async fn handle_get(State(state): State<McpRouterState>, headers: HeaderMap) -> Response {
    let (session_id, channel) = state.resolve(&headers).await;
    let (Some(session_id), Some(channel)) = (session_id, channel) else {
        warn!(verb = "GET", "Rejected push stream request without a valid session");
        let status = if state.config().strict_unknown_session {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::METHOD_NOT_ALLOWED
        };
        let body = JsonRpcResponse::error(
            JsonRpcError::new(
                JsonRpcErrorCode::SessionError as i32,
                GET_WITHOUT_SESSION,
                None,
            ),
            None,
        );
        return (status, Json(body)).into_response();
    };

    match channel.attach_stream() {
        Ok(push) => {
            channel.touch();
            info!(verb = "GET", session_id = %session_id, "Push stream opened");
            let response = push_stream_response(push, state.config().session.keep_alive);
            state.with_session_header(response, &session_id)
        }
        Err(e) => {
            warn!(verb = "GET", session_id = %session_id, "Push stream refused: {}", e);
            let response = e.into_response_with_id(None);
            state.with_session_header(response, &session_id)
        }
    }
}

/// DELETE: close the session
pub async fn handle_delete(State(state): State<McpRouterState>, headers: HeaderMap) -> Response {
    let session_id = match state.session_header(&headers) {
        SessionHeader::Present(session_id) => session_id.to_string(),
        SessionHeader::Unusable(raw) => {
            warn!(verb = "DELETE", session_id = %raw, "Unusable session header");
            return plain_bad_request();
        }
        SessionHeader::Absent => {
            warn!(verb = "DELETE", "Missing session header");
            return plain_bad_request();
        }
    };

    match state
        .inner
        .sessions
        .close(&session_id, CloseReason::ClientRequested)
        .await
    {
        RemoveOutcome::Removed => {
            info!(verb = "DELETE", session_id = %session_id, "Session terminated by client");
            state.with_session_header(StatusCode::OK.into_response(), &session_id)
        }
        RemoveOutcome::AlreadyClosed => {
            info!(verb = "DELETE", session_id = %session_id, "Session already closed");
            plain_bad_request()
        }
        RemoveOutcome::Unknown => {
            warn!(verb = "DELETE", session_id = %session_id, "Unknown session");
            plain_bad_request()
        }
    }
}

fn plain_bad_request() -> Response {
    (
        StatusCode::BAD_REQUEST,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        DELETE_WITHOUT_SESSION,
    )
        .into_response()
}
