//! Server startup and lifecycle management

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use docbridge_config::DocbridgeConfig;
use docbridge_mcp::{mcp_routes, McpRouterConfig, McpRouterState, SessionConfig, ToolRegistry};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

const SERVER_NAME: &str = "docbridge";

/// Router settings derived from the loaded configuration
pub fn router_config(config: &DocbridgeConfig) -> McpRouterConfig {
    let session = SessionConfig {
        idle_timeout: config.session.idle_timeout,
        cleanup_interval: config.session.cleanup_interval,
        max_sessions: config.session.max_sessions,
        max_pending_pushes: config.session.max_pending_pushes,
        keep_alive: config.session.push_keep_alive,
    };

    McpRouterConfig::default()
        .with_endpoint(config.server.endpoint.clone())
        .with_session_header(config.session.header_name.clone())
        .with_server_info(SERVER_NAME, env!("CARGO_PKG_VERSION"))
        .with_instructions(
            "Call 'resolve-library-id' to find a library ID, then 'get-library-docs' to fetch its documentation.",
        )
        .with_session(session)
        .with_strict_unknown_session(config.session.strict_unknown_session)
}

/// Server application struct
pub struct Server {
    config: DocbridgeConfig,
    state: McpRouterState,
}

impl Server {
    /// Create a new server instance serving `tools`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: DocbridgeConfig, tools: ToolRegistry) -> Result<Self> {
        let state = McpRouterState::new(router_config(&config), tools)
            .context("Failed to create MCP router state")?;
        Ok(Self { config, state })
    }

    pub fn state(&self) -> &McpRouterState {
        &self.state
    }

    /// Build the HTTP application: the MCP endpoint plus `/health`
    pub fn build_app(&self) -> Router {
        let health = Router::new()
            .route("/health", get(health_handler))
            .with_state(self.state.clone());

        let mut app = mcp_routes(self.state.clone()).merge(health);

        if self.config.server.enable_tracing {
            app = app.layer(TraceLayer::new_for_http());
        }

        app
    }

    /// Start the server and run until a shutdown signal arrives
    pub async fn start(self) -> Result<()> {
        let app = self.build_app();
        let addr = self.config.server.socket_address();

        tracing::info!("Starting docbridge server on {}", addr);
        self.log_config_summary();

        if self.state.spawn_sweeper().is_none() {
            tracing::debug!("Idle session sweeper not started");
        }

        let listener = tokio::net::TcpListener::bind(addr.as_str())
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server error")?;

        let closed = self.state.shutdown().await;
        tracing::info!("Closed {} open session(s)", closed);
        tracing::info!("Server shutdown complete");
        Ok(())
    }

    fn log_config_summary(&self) {
        let enabled = |flag: bool| if flag { "Enabled" } else { "Disabled" };
        let session = &self.config.session;

        tracing::info!("=== docbridge Server Configuration ===");
        tracing::info!("Bind Address: {}", self.config.server.socket_address());
        tracing::info!("MCP Endpoint: {}", self.config.server.endpoint);
        tracing::info!("Session Header: {}", session.header_name);
        tracing::info!("Max Sessions: {}", session.max_sessions);
        if session.expiry_enabled() {
            tracing::info!(
                "Session Expiry: {}s idle, swept every {}s",
                session.idle_timeout.as_secs(),
                session.cleanup_interval.as_secs()
            );
        } else {
            tracing::info!("Session Expiry: Disabled");
        }
        tracing::info!("Docs Service: {}", self.config.docs.base_url);
        tracing::info!("Tools: {}", self.state.tools().len());
        tracing::info!("Tracing: {}", enabled(self.config.server.enable_tracing));
        tracing::info!("======================================");
    }
}

/// Health check handler
async fn health_handler(State(state): State<McpRouterState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.session_count().await,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Resolve on Ctrl+C or, on unix, SIGTERM.
///
/// A signal handler that cannot be installed never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
