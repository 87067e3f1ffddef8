//! MCP tool handlers for library resolution and documentation retrieval

use std::sync::Arc;

use async_trait::async_trait;
use docbridge_config::DocsConfig;
use docbridge_mcp::{
    McpResult, ToolContext, ToolFailure, ToolHandler, ToolOutcome, ToolRegistry, ToolsCallResult,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{format_search_results, DocsQuery, DocsSource};

pub const RESOLVE_LIBRARY_ID: &str = "resolve-library-id";
pub const GET_LIBRARY_DOCS: &str = "get-library-docs";

const SEARCH_FAILED: &str = "Failed to retrieve library documentation data from Context7";
const NO_LIBRARIES: &str = "No documentation libraries available";
const LIBRARIES_HEADER: &str = "Available libraries and their Context7-compatible library IDs:\n\n";
const DOCS_NOT_FOUND: &str = "Documentation not found or not finalized for this library. This might have happened because you used an invalid Context7-compatible library ID. To get a valid Context7-compatible library ID, use the 'resolve-library-id' with the package name you wish to retrieve documentation for.";

const FOLDERS_MARKER: &str = "?folders=";

/// Register both documentation tools on `registry`
pub fn register_docs_tools(
    registry: &mut ToolRegistry,
    source: Arc<dyn DocsSource>,
    config: &DocsConfig,
) -> McpResult<()> {
    registry.register(
        RESOLVE_LIBRARY_ID,
        "Required first step: Resolves a general package name into a Context7-compatible library ID. Must be called before using 'get-library-docs' to retrieve a valid Context7-compatible library ID.",
        json!({
            "type": "object",
            "properties": {
                "libraryName": {
                    "type": "string",
                    "description": "Library name to search for and retrieve a Context7-compatible library ID."
                }
            },
            "required": ["libraryName"]
        }),
        ResolveLibraryId {
            source: source.clone(),
        },
    )?;

    registry.register(
        GET_LIBRARY_DOCS,
        "Fetches up-to-date documentation for a library. You must call 'resolve-library-id' first to obtain the exact Context7-compatible library ID required to use this tool.",
        json!({
            "type": "object",
            "properties": {
                "context7CompatibleLibraryID": {
                    "type": "string",
                    "description": "Exact Context7-compatible library ID (e.g., 'mongodb/docs', 'vercel/nextjs') retrieved from 'resolve-library-id'."
                },
                "topic": {
                    "type": "string",
                    "description": "Topic to focus documentation on (e.g., 'hooks', 'routing')."
                },
                "tokens": {
                    "type": ["number", "string"],
                    "description": format!(
                        "Maximum number of tokens of documentation to retrieve (default: {}). Higher values provide more context but consume more tokens.",
                        config.default_tokens
                    )
                }
            },
            "required": ["context7CompatibleLibraryID"]
        }),
        GetLibraryDocs {
            source,
            default_tokens: config.default_tokens,
            minimum_tokens: config.minimum_tokens,
        },
    )?;

    info!(
        "Documentation tools ({}, {}) registered",
        RESOLVE_LIBRARY_ID, GET_LIBRARY_DOCS
    );
    Ok(())
}

/// Fresh registry holding only the documentation tools
pub fn docs_tool_registry(source: Arc<dyn DocsSource>, config: &DocsConfig) -> McpResult<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_docs_tools(&mut registry, source, config)?;
    Ok(registry)
}

fn parse_arguments<T: for<'de> Deserialize<'de>>(arguments: Value) -> Result<T, ToolFailure> {
    serde_json::from_value(arguments).map_err(|e| ToolFailure::InvalidArguments(e.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveArgs {
    library_name: String,
}

struct ResolveLibraryId {
    source: Arc<dyn DocsSource>,
}

#[async_trait]
impl ToolHandler for ResolveLibraryId {
    async fn call(&self, arguments: Value, context: ToolContext) -> ToolOutcome {
        let args: ResolveArgs = parse_arguments(arguments)?;
        context.report_progress(
            0.0,
            Some(1.0),
            Some(format!("Searching libraries matching '{}'", args.library_name)),
        );

        let response = match self.source.search(&args.library_name).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Library search for '{}' failed: {}", args.library_name, e);
                None
            }
        };
        context.report_progress(1.0, Some(1.0), None);

        let text = match response.and_then(|r| r.results) {
            None => SEARCH_FAILED.to_string(),
            Some(results) if results.is_empty() => NO_LIBRARIES.to_string(),
            Some(results) => format!("{}{}", LIBRARIES_HEADER, format_search_results(&results)),
        };
        Ok(ToolsCallResult::text(text))
    }
}

#[derive(Debug, Deserialize)]
struct DocsArgs {
    #[serde(rename = "context7CompatibleLibraryID")]
    library_id: String,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    tokens: Option<Value>,
}

struct GetLibraryDocs {
    source: Arc<dyn DocsSource>,
    default_tokens: u32,
    minimum_tokens: u32,
}

impl GetLibraryDocs {
    /// Token budget from a number or numeric string, raised to the minimum.
    /// An empty string counts as zero.
    fn token_budget(&self, tokens: Option<&Value>) -> Result<u32, ToolFailure> {
        let requested = match tokens {
            None | Some(Value::Null) => return Ok(self.default_tokens.max(self.minimum_tokens)),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) if s.trim().is_empty() => Some(0.0),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };

        match requested {
            Some(tokens) if tokens.is_finite() => {
                if tokens < self.minimum_tokens as f64 {
                    Ok(self.minimum_tokens)
                } else {
                    Ok(tokens.min(u32::MAX as f64) as u32)
                }
            }
            _ => Err(ToolFailure::InvalidArguments(
                "tokens must be a number".to_string(),
            )),
        }
    }
}

/// Split `id?folders=a,b` into the bare id and the folder list
fn split_folders(library_id: &str) -> (&str, &str) {
    match library_id.split_once(FOLDERS_MARKER) {
        Some((id, rest)) => {
            let folders = rest.split(FOLDERS_MARKER).next().unwrap_or_default();
            (id, folders)
        }
        None => (library_id, ""),
    }
}

#[async_trait]
impl ToolHandler for GetLibraryDocs {
    async fn call(&self, arguments: Value, context: ToolContext) -> ToolOutcome {
        let args: DocsArgs = parse_arguments(arguments)?;
        let tokens = self.token_budget(args.tokens.as_ref())?;
        let (library_id, folders) = split_folders(&args.library_id);
        let query = DocsQuery {
            tokens,
            topic: args.topic.unwrap_or_default(),
            folders: folders.to_string(),
        };

        context.report_progress(
            0.0,
            Some(1.0),
            Some(format!("Fetching documentation for {}", library_id)),
        );
        let documentation = match self.source.fetch_documentation(library_id, &query).await {
            Ok(text) => text,
            Err(e) => {
                warn!(library_id, "Documentation fetch failed: {}", e);
                None
            }
        };
        context.report_progress(1.0, Some(1.0), None);

        Ok(ToolsCallResult::text(
            documentation.unwrap_or_else(|| DOCS_NOT_FOUND.to_string()),
        ))
    }
}
