//! Per-session channel: handshake state, push queue and push stream

use futures_util::FutureExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::{
    any::Any,
    collections::VecDeque,
    panic::AssertUnwindSafe,
    sync::{Arc, Weak},
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{CloseReason, SessionEvent, SessionId};
use crate::{
    error::{McpError, McpResult},
    protocol::{
        negotiate_protocol_version, ClientInfo, InitializeParams, InitializeResult,
        JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, McpMethod,
        ServerCapabilities, ServerInfo, ToolsCallParams, ToolsCapability, ToolsListResult,
    },
    registry::{PushSink, ToolContext, ToolRegistry},
};

/// Channel lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Initializing,
    Active,
    Closed,
}

/// What happened to a pushed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushDelivery {
    /// Handed to the attached stream
    Delivered,
    /// Held until a stream attaches
    Queued,
    /// Channel closed or push had nowhere to go
    Discarded,
}

/// Static per-channel settings
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    pub server_info: ServerInfo,
    pub instructions: Option<String>,
    /// Pending pushes kept while no stream is attached; oldest are dropped first
    pub max_pending_pushes: usize,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            server_info: ServerInfo::default(),
            instructions: None,
            max_pending_pushes: 256,
        }
    }
}

struct AttachedStream {
    generation: u64,
    sender: mpsc::UnboundedSender<JsonRpcNotification>,
}

impl AttachedStream {
    fn is_live(&self) -> bool {
        !self.sender.is_closed()
    }
}

struct ChannelInner {
    state: ChannelState,
    session_id: Option<SessionId>,
    protocol_version: Option<String>,
    client_info: Option<ClientInfo>,
    pending: VecDeque<JsonRpcNotification>,
    stream: Option<AttachedStream>,
    next_generation: u64,
    last_activity: Instant,
    /// Requests currently being handled
    in_flight: usize,
}

/// One client session's communication channel
pub struct Channel {
    inner: Mutex<ChannelInner>,
    created_at: Instant,
    tools: Arc<ToolRegistry>,
    options: ChannelOptions,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Channel {
    /// Create an anonymous channel in `Initializing` state
    pub fn new(
        tools: Arc<ToolRegistry>,
        options: ChannelOptions,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Arc<Self> {
        let now = Instant::now();
        Arc::new(Self {
            inner: Mutex::new(ChannelInner {
                state: ChannelState::Initializing,
                session_id: None,
                protocol_version: None,
                client_info: None,
                pending: VecDeque::new(),
                stream: None,
                next_generation: 0,
                last_activity: now,
                in_flight: 0,
            }),
            created_at: now,
            tools,
            options,
            events,
        })
    }

    pub fn state(&self) -> ChannelState {
        self.inner.lock().state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.lock().session_id.clone()
    }

    /// Protocol version agreed during the handshake
    pub fn protocol_version(&self) -> Option<String> {
        self.inner.lock().protocol_version.clone()
    }

    pub fn client_info(&self) -> Option<ClientInfo> {
        self.inner.lock().client_info.clone()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time since the last request or stream activity
    pub fn idle_for(&self) -> Duration {
        self.inner.lock().last_activity.elapsed()
    }

    pub fn touch(&self) {
        self.inner.lock().last_activity = Instant::now();
    }

    /// Whether a push stream is attached and its receiver still alive
    pub fn has_live_stream(&self) -> bool {
        self.inner
            .lock()
            .stream
            .as_ref()
            .is_some_and(AttachedStream::is_live)
    }

    /// Number of requests still being handled
    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight
    }

    /// Whether idle expiry may close this channel: no live stream, no request
    /// in progress and idle for at least `idle_timeout`
    pub fn is_expirable(&self, idle_timeout: Duration) -> bool {
        let inner = self.inner.lock();
        let streaming = inner.stream.as_ref().is_some_and(AttachedStream::is_live);
        !streaming && inner.in_flight == 0 && inner.last_activity.elapsed() >= idle_timeout
    }

    pub fn pending_pushes(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Answer an initialization request. The channel stays `Initializing`
    /// until the registry binds a session id.
    pub fn handshake(
        &self,
        request: &JsonRpcRequest,
        params: &InitializeParams,
    ) -> McpResult<InitializeResult> {
        let mut inner = self.inner.lock();
        if inner.state != ChannelState::Initializing {
            return Err(McpError::AlreadyInitialized {
                session_id: inner.session_id.as_ref().map(|id| id.to_string()),
            });
        }

        let protocol_version = negotiate_protocol_version(&params.protocol_version);
        debug!(
            request_id = ?request.id,
            client = ?params.client_info,
            "Handshake negotiated protocol {}",
            protocol_version
        );
        inner.protocol_version = Some(protocol_version.clone());
        inner.client_info = params.client_info.clone();

        Ok(InitializeResult {
            protocol_version,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
                ..Default::default()
            },
            server_info: self.options.server_info.clone(),
            instructions: self.options.instructions.clone(),
        })
    }

    /// Bind `session_id` and move to `Active`. Only the registry calls this.
    pub(crate) fn activate(&self, session_id: SessionId) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != ChannelState::Initializing {
            return false;
        }
        inner.state = ChannelState::Active;
        inner.session_id = Some(session_id.clone());
        inner.last_activity = Instant::now();
        drop(inner);

        info!(session_id = %session_id, "Session created");
        let _ = self.events.send(SessionEvent::Created { session_id });
        true
    }

    /// Process one inbound message on an active channel.
    ///
    /// `Ok(None)` means the message was a notification and gets no response.
    /// Protocol-level failures are returned inside the response; `Err` is
    /// reserved for failures the transport maps to an HTTP status.
    pub async fn handle(
        self: &Arc<Self>,
        request: JsonRpcRequest,
    ) -> McpResult<Option<JsonRpcResponse>> {
        let session_id = {
            let mut inner = self.inner.lock();
            if inner.state == ChannelState::Closed {
                return Err(McpError::UnknownSession {
                    session_id: inner.session_id.as_ref().map(|id| id.to_string()),
                });
            }
            inner.last_activity = Instant::now();
            inner.in_flight += 1;
            inner.session_id.clone()
        };
        let _busy = BusyGuard {
            channel: self.as_ref(),
        };

        let method = McpMethod::parse(&request.method);
        let id = request.id.clone();

        match method {
            McpMethod::Initialize => Err(McpError::AlreadyInitialized {
                session_id: session_id.map(|id| id.to_string()),
            }),
            McpMethod::Initialized => {
                debug!(session_id = ?session_id, "Client confirmed initialization");
                Ok(None)
            }
            McpMethod::Cancelled => {
                debug!(session_id = ?session_id, params = ?request.params, "Client cancelled a request");
                Ok(None)
            }
            _ if id.is_none() => {
                debug!(session_id = ?session_id, "Ignoring notification for {}", request.method);
                Ok(None)
            }
            McpMethod::Ping => Ok(Some(JsonRpcResponse::success(json!({}), id))),
            McpMethod::ToolsList => {
                let result = ToolsListResult {
                    tools: self.tools.list(),
                    next_cursor: None,
                };
                Ok(Some(JsonRpcResponse::success(serde_json::to_value(result)?, id)))
            }
            McpMethod::ToolsCall => self.call_tool(session_id, request.params, id).await,
            McpMethod::Unknown(name) => {
                debug!(session_id = ?session_id, "Method not found: {}", name);
                Ok(Some(JsonRpcResponse::error(
                    JsonRpcError::method_not_found(&name),
                    id,
                )))
            }
        }
    }

    async fn call_tool(
        self: &Arc<Self>,
        session_id: Option<SessionId>,
        params: Option<Value>,
        id: Option<Value>,
    ) -> McpResult<Option<JsonRpcResponse>> {
        let params: ToolsCallParams = match params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return Ok(Some(JsonRpcResponse::error(
                    JsonRpcError::invalid_params(e.to_string()),
                    id,
                )))
            }
            None => {
                return Ok(Some(JsonRpcResponse::error(
                    JsonRpcError::invalid_params("tools/call requires params"),
                    id,
                )))
            }
        };

        let context = ToolContext {
            session_id: session_id.clone(),
            request_id: id.clone(),
            progress_token: params.meta.and_then(|meta| meta.progress_token),
            push: PushSink::new(self),
        };

        let invocation = AssertUnwindSafe(self.tools.invoke(&params.name, params.arguments, context))
            .catch_unwind()
            .await;

        match invocation {
            Ok(Ok(result)) => Ok(Some(JsonRpcResponse::success(
                serde_json::to_value(result)?,
                id,
            ))),
            Ok(Err(err)) if err.is_protocol_level() => {
                Ok(Some(JsonRpcResponse::error(err.to_jsonrpc(), id)))
            }
            Ok(Err(err)) => Err(err),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    session_id = ?session_id,
                    tool = %params.name,
                    "Tool handler panicked: {}",
                    message
                );
                Err(McpError::HandlerInvocation { message })
            }
        }
    }

    /// Deliver a server-initiated message, or queue it until a stream attaches
    pub fn push(&self, notification: JsonRpcNotification) -> PushDelivery {
        let mut inner = self.inner.lock();
        if inner.state == ChannelState::Closed {
            return PushDelivery::Discarded;
        }

        let notification = match inner.stream.as_ref() {
            Some(stream) => match stream.sender.send(notification) {
                Ok(()) => return PushDelivery::Delivered,
                Err(mpsc::error::SendError(returned)) => {
                    inner.stream = None;
                    returned
                }
            },
            None => notification,
        };

        if self.options.max_pending_pushes == 0 {
            return PushDelivery::Discarded;
        }
        if inner.pending.len() >= self.options.max_pending_pushes {
            inner.pending.pop_front();
            warn!(
                session_id = ?inner.session_id,
                "Push queue full, dropping oldest message"
            );
        }
        inner.pending.push_back(notification);
        PushDelivery::Queued
    }

    /// Attach the session's push stream, flushing queued messages into it.
    ///
    /// Fails with `StreamConflict` while another live stream is attached.
    pub fn attach_stream(self: &Arc<Self>) -> McpResult<PushStream> {
        let mut inner = self.inner.lock();
        let session_id = inner
            .session_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_default();

        if inner.state != ChannelState::Active {
            return Err(McpError::UnknownSession {
                session_id: Some(session_id),
            });
        }
        if inner.stream.as_ref().is_some_and(AttachedStream::is_live) {
            return Err(McpError::StreamConflict { session_id });
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let flushed = inner.pending.len();
        for notification in inner.pending.drain(..) {
            // receiver is held right here, send cannot fail
            let _ = sender.send(notification);
        }

        let generation = inner.next_generation;
        inner.next_generation += 1;
        inner.stream = Some(AttachedStream { generation, sender });
        inner.last_activity = Instant::now();
        drop(inner);

        debug!(session_id = %session_id, flushed, "Push stream attached");
        Ok(PushStream {
            receiver,
            _guard: StreamGuard {
                channel: Arc::downgrade(self),
                generation,
            },
        })
    }

    fn detach_stream(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner
            .stream
            .as_ref()
            .is_some_and(|s| s.generation == generation)
        {
            inner.stream = None;
            inner.last_activity = Instant::now();
            debug!(session_id = ?inner.session_id, "Push stream detached");
        }
    }

    /// Close the channel. Returns `false` if it was already closed.
    ///
    /// Queued pushes are discarded, the push stream ends, and a
    /// [`SessionEvent::Closed`] is emitted for registered channels.
    pub fn close(&self, reason: CloseReason) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == ChannelState::Closed {
            return false;
        }
        inner.state = ChannelState::Closed;
        let dropped = inner.pending.len();
        inner.pending.clear();
        inner.stream = None;
        let session_id = inner.session_id.clone();
        drop(inner);

        if let Some(session_id) = session_id {
            info!(session_id = %session_id, %reason, dropped, "Session closed");
            let _ = self.events.send(SessionEvent::Closed { session_id, reason });
        } else {
            debug!(%reason, "Closed channel before registration");
        }
        true
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Channel")
            .field("state", &inner.state)
            .field("session_id", &inner.session_id)
            .field("pending", &inner.pending.len())
            .field("stream", &inner.stream.is_some())
            .finish()
    }
}

/// Marks a request as finished when dropped, whether it completed, failed
/// or was abandoned with the HTTP connection
struct BusyGuard<'a> {
    channel: &'a Channel,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.channel.inner.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        inner.last_activity = Instant::now();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Receiving end of a channel's push stream.
///
/// Dropping it detaches the stream; the session stays open and later pushes
/// are queued again.
pub struct PushStream {
    receiver: mpsc::UnboundedReceiver<JsonRpcNotification>,
    _guard: StreamGuard,
}

impl PushStream {
    /// Next pushed message; `None` once the channel closes
    pub async fn next(&mut self) -> Option<JsonRpcNotification> {
        self.receiver.recv().await
    }
}

struct StreamGuard {
    channel: Weak<Channel>,
    generation: u64,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.detach_stream(self.generation);
        }
    }
}
