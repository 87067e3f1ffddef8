//! Documentation lookup backing the `resolve-library-id` and
//! `get-library-docs` tools

pub mod client;
pub mod format;
pub mod tools;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::Context7Client;
pub use format::format_search_results;
pub use tools::{docs_tool_registry, register_docs_tools, GET_LIBRARY_DOCS, RESOLVE_LIBRARY_ID};

/// Error type for documentation lookups
#[derive(Debug, thiserror::Error)]
pub enum DocsError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type DocsResult<T> = Result<T, DocsError>;

/// One library matched by a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Search response as returned by the documentation service.
///
/// `results` is absent when the service could not answer the query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Option<Vec<SearchResult>>,
}

/// Options for a documentation fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocsQuery {
    pub tokens: u32,
    pub topic: String,
    pub folders: String,
}

/// Source of library search results and documentation text
#[async_trait]
pub trait DocsSource: Send + Sync {
    /// Search libraries by name. `Ok(None)` means the service gave no usable answer.
    async fn search(&self, query: &str) -> DocsResult<Option<SearchResponse>>;

    /// Fetch documentation text. `Ok(None)` means nothing is available for the id.
    async fn fetch_documentation(
        &self,
        library_id: &str,
        query: &DocsQuery,
    ) -> DocsResult<Option<String>>;
}
