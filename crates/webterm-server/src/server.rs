//! HTTP server: mounts the Control API and the viewer channel on one
//! listener and owns the session registry.

use crate::config::ServerConfig;
use crate::session::SessionRegistry;
use crate::{api, channel};
use axum::routing::{delete, get};
use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use webterm_core::{TermError, TermResult};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
}

/// Build the router. `base_path` is either empty or a normalized prefix
/// such as `/terminal`.
pub fn router(state: AppState, base_path: &str) -> Router {
    let routes = Router::new()
        .route("/api/health", get(api::health))
        .route(
            "/api/sessions",
            get(api::list_sessions).post(api::create_session),
        )
        .route("/api/sessions/:id", delete(api::delete_session))
        .route("/ws", get(channel::ws_handler))
        .with_state(state);

    let app = if base_path.is_empty() {
        routes
    } else {
        Router::new().nest(base_path, routes)
    };

    app.layer(TraceLayer::new_for_http())
}

/// The webterm server instance.
pub struct TermServer {
    config: ServerConfig,
    registry: SessionRegistry,
}

impl TermServer {
    pub fn new(config: ServerConfig) -> Self {
        let registry = SessionRegistry::new(config.shell.clone(), config.max_sessions);
        Self { config, registry }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn router(&self) -> Router {
        router(
            AppState {
                registry: self.registry.clone(),
            },
            &self.config.base_path,
        )
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> TermResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| TermError::Other(format!("failed to bind {addr}: {e}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener. When `shutdown` resolves every
    /// session is killed, so viewers see `"session exited"` before the
    /// listener closes.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> TermResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr()?;
        info!(
            addr = %local,
            base_path = %self.config.base_path,
            max_sessions = self.config.max_sessions,
            shell = %self.config.shell.program,
            "webterm-server ready"
        );

        let app = self.router();
        let registry = self.registry.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("shutting down, killing sessions");
                registry.shutdown().await;
            })
            .await?;

        info!("webterm-server stopped");
        Ok(())
    }
}
