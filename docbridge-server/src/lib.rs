//! docbridge server: documentation lookup tools served over the
//! session-scoped MCP router

pub mod docs;
pub mod logging;
pub mod startup;

pub use docs::{Context7Client, DocsError, DocsQuery, DocsSource, SearchResponse, SearchResult};
pub use logging::init_tracing;
pub use startup::{router_config, shutdown_signal, Server};
