//! Tool registry: named, schema-checked async handlers

use async_trait::async_trait;
use jsonschema::Validator;
use serde_json::{json, Value};
use std::{
    borrow::Borrow,
    collections::BTreeMap,
    fmt,
    future::Future,
    sync::{Arc, Weak},
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    error::{McpError, McpResult},
    protocol::{JsonRpcNotification, ProgressNotification, Tool, ToolsCallResult},
    session::{Channel, PushDelivery, SessionId},
};

const MAX_TOOL_NAME_LEN: usize = 128;

/// Validated tool name: 1 to 128 characters from `[A-Za-z0-9_.-]`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ToolName(String);

impl ToolName {
    pub fn new(name: impl Into<String>) -> McpResult<Self> {
        let name = name.into();
        let well_formed = !name.is_empty()
            && name.len() <= MAX_TOOL_NAME_LEN
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !well_formed {
            return Err(McpError::Registration {
                message: format!("invalid tool name '{}'", name),
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ToolName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure reported by a tool handler
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolFailure {
    /// Arguments passed the schema but were rejected by the handler
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool ran and failed; reported to the client as an error result
    #[error("{message}")]
    Execution { message: String },
}

impl ToolFailure {
    pub fn execution(message: impl Into<String>) -> Self {
        ToolFailure::Execution {
            message: message.into(),
        }
    }
}

/// Result of one tool invocation
pub type ToolOutcome = Result<ToolsCallResult, ToolFailure>;

/// Async callable behind a registered tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value, context: ToolContext) -> ToolOutcome;
}

/// Adapter turning an async closure into a [`ToolHandler`]
pub struct FnHandler<F>(F);

/// Wrap an async closure as a tool handler
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Value, ToolContext) -> Fut + Send + Sync,
    Fut: Future<Output = ToolOutcome> + Send,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Value, ToolContext) -> Fut + Send + Sync,
    Fut: Future<Output = ToolOutcome> + Send,
{
    async fn call(&self, arguments: Value, context: ToolContext) -> ToolOutcome {
        (self.0)(arguments, context).await
    }
}

/// Handle for pushing server-initiated messages to the calling session.
///
/// Holds the channel weakly so an in-flight handler never keeps a closed
/// session alive.
#[derive(Debug, Clone, Default)]
pub struct PushSink {
    channel: Weak<Channel>,
}

impl PushSink {
    pub(crate) fn new(channel: &Arc<Channel>) -> Self {
        Self {
            channel: Arc::downgrade(channel),
        }
    }

    /// A sink bound to no session; every push is discarded
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn push(&self, notification: JsonRpcNotification) -> PushDelivery {
        match self.channel.upgrade() {
            Some(channel) => channel.push(notification),
            None => PushDelivery::Discarded,
        }
    }
}

/// Per-call context handed to tool handlers
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub session_id: Option<SessionId>,
    pub request_id: Option<Value>,
    pub progress_token: Option<Value>,
    pub push: PushSink,
}

impl ToolContext {
    /// Context for calls made outside any session
    pub fn detached() -> Self {
        Self::default()
    }

    /// Send `notifications/progress` if the caller asked for progress
    pub fn report_progress(
        &self,
        progress: f64,
        total: Option<f64>,
        message: Option<String>,
    ) -> PushDelivery {
        let Some(token) = self.progress_token.clone() else {
            return PushDelivery::Discarded;
        };
        let payload = ProgressNotification {
            progress_token: token,
            progress,
            total,
            message,
        };
        match serde_json::to_value(payload) {
            Ok(params) => self.push.push(JsonRpcNotification::new(
                "notifications/progress",
                Some(params),
            )),
            Err(e) => {
                warn!("Failed to encode progress notification: {}", e);
                PushDelivery::Discarded
            }
        }
    }
}

struct RegisteredTool {
    tool: Tool,
    validator: Validator,
    handler: Arc<dyn ToolHandler>,
}

/// Name-to-handler table consulted by channels for `tools/list` and `tools/call`
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique and the input schema must be a
    /// valid JSON Schema describing an object.
    pub fn register<H>(
        &mut self,
        name: &str,
        description: impl Into<String>,
        input_schema: Value,
        handler: H,
    ) -> McpResult<()>
    where
        H: ToolHandler + 'static,
    {
        let name = ToolName::new(name)?;
        if self.tools.contains_key(&name) {
            return Err(McpError::Registration {
                message: format!("tool '{}' is already registered", name),
            });
        }

        if input_schema.get("type").and_then(Value::as_str) != Some("object") {
            return Err(McpError::Registration {
                message: format!("input schema of '{}' must have type \"object\"", name),
            });
        }
        let validator = jsonschema::validator_for(&input_schema).map_err(|e| {
            McpError::Registration {
                message: format!("invalid input schema for '{}': {}", name, e),
            }
        })?;

        debug!("Registered tool {}", name);
        let tool = Tool {
            name: name.to_string(),
            description: description.into(),
            input_schema,
        };
        self.tools.insert(
            name,
            RegisteredTool {
                tool,
                validator,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    /// Builder form of [`ToolRegistry::register`]
    pub fn with_tool<H>(
        mut self,
        name: &str,
        description: impl Into<String>,
        input_schema: Value,
        handler: H,
    ) -> McpResult<Self>
    where
        H: ToolHandler + 'static,
    {
        self.register(name, description, input_schema, handler)?;
        Ok(self)
    }

    /// Advertised tools, ordered by name
    pub fn list(&self) -> Vec<Tool> {
        self.tools.values().map(|t| t.tool.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate `arguments` and run the named tool.
    ///
    /// Unknown tools yield `MethodNotFound`, schema or handler argument
    /// rejections yield `InvalidParams`. Execution failures come back as an
    /// `isError` result, not as an error.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Option<Value>,
        context: ToolContext,
    ) -> McpResult<ToolsCallResult> {
        let registered = self
            .tools
            .get(name)
            .ok_or_else(|| McpError::MethodNotFound {
                method: name.to_string(),
            })?;

        let arguments = arguments.unwrap_or_else(|| json!({}));
        let violations: Vec<String> = registered
            .validator
            .iter_errors(&arguments)
            .map(|e| e.to_string())
            .collect();
        if !violations.is_empty() {
            return Err(McpError::InvalidParams {
                message: violations.join("; "),
            });
        }

        match registered.handler.call(arguments, context).await {
            Ok(result) => Ok(result),
            Err(ToolFailure::InvalidArguments(message)) => {
                Err(McpError::InvalidParams { message })
            }
            Err(ToolFailure::Execution { message }) => {
                warn!(tool = name, "Tool execution failed: {}", message);
                Ok(ToolsCallResult::error_text(message))
            }
        }
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_schema() -> Value {
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }

    fn echo_registry() -> ToolRegistry {
        ToolRegistry::new()
            .with_tool(
                "echo",
                "Echo the text back",
                echo_schema(),
                handler_fn(|args: Value, _ctx: ToolContext| async move {
                    let text = args["text"].as_str().unwrap_or_default().to_string();
                    if text == "fail" {
                        return Err(ToolFailure::execution("asked to fail"));
                    }
                    if text.is_empty() {
                        return Err(ToolFailure::InvalidArguments("text is empty".into()));
                    }
                    Ok(ToolsCallResult::text(text))
                }),
            )
            .unwrap()
    }

    #[test]
    fn test_tool_name_validation() {
        assert!(ToolName::new("resolve-library-id").is_ok());
        assert!(ToolName::new("ns.tool_v2").is_ok());
        assert!(ToolName::new("").is_err());
        assert!(ToolName::new("has space").is_err());
        assert!(ToolName::new("x".repeat(129)).is_err());
    }

    #[test]
    fn test_registration_rejections() {
        let mut registry = echo_registry();
        let noop = || handler_fn(|_: Value, _: ToolContext| async { Ok(ToolsCallResult::text("")) });

        let duplicate = registry.register("echo", "again", echo_schema(), noop());
        assert!(matches!(duplicate, Err(McpError::Registration { .. })));

        let not_object = registry.register("scalar", "", json!({ "type": "string" }), noop());
        assert!(matches!(not_object, Err(McpError::Registration { .. })));

        let broken = registry.register(
            "broken",
            "",
            json!({ "type": "object", "properties": { "a": { "type": 12 } } }),
            noop(),
        );
        assert!(matches!(broken, Err(McpError::Registration { .. })));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list()[0].name, "echo");
    }

    #[tokio::test]
    async fn test_invoke_paths() {
        let registry = echo_registry();

        let ok = registry
            .invoke("echo", Some(json!({ "text": "hi" })), ToolContext::detached())
            .await
            .unwrap();
        assert_eq!(ok.joined_text(), "hi");
        assert!(!ok.is_error);

        let failed = registry
            .invoke("echo", Some(json!({ "text": "fail" })), ToolContext::detached())
            .await
            .unwrap();
        assert!(failed.is_error);

        let unknown = registry.invoke("nope", None, ToolContext::detached()).await;
        assert!(matches!(unknown, Err(McpError::MethodNotFound { .. })));

        let schema = registry
            .invoke("echo", Some(json!({ "text": 5 })), ToolContext::detached())
            .await;
        assert!(matches!(schema, Err(McpError::InvalidParams { .. })));

        let missing = registry.invoke("echo", None, ToolContext::detached()).await;
        assert!(matches!(missing, Err(McpError::InvalidParams { .. })));

        let rejected = registry
            .invoke("echo", Some(json!({ "text": "" })), ToolContext::detached())
            .await;
        assert!(matches!(rejected, Err(McpError::InvalidParams { .. })));
    }

    #[test]
    fn test_progress_without_token_is_discarded() {
        let context = ToolContext::detached();
        assert_eq!(
            context.report_progress(1.0, Some(2.0), None),
            PushDelivery::Discarded
        );
    }
}
