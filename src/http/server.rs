//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout)
//! - Body size is enforced by the admission guard and the body extractors
//! - Guard `/api/generate` with the admission pipeline
//! - Bind server to listener and drain on shutdown
//! - Run the background cleanup sweep alongside the listener

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GuardConfig;
use crate::http::guard::admission_guard;
use crate::http::handlers;
use crate::lifecycle::{CleanupTask, Shutdown};
use crate::security::SecurityMiddleware;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub security: Arc<SecurityMiddleware>,
    pub max_body_size: usize,
}

/// HTTP server for the public API.
pub struct HttpServer {
    router: Router,
    config: GuardConfig,
    security: Arc<SecurityMiddleware>,
}

impl HttpServer {
    pub fn new(config: GuardConfig, security: Arc<SecurityMiddleware>) -> Self {
        let state = AppState {
            security: security.clone(),
            max_body_size: config.listener.max_body_size,
        };
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            security,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &GuardConfig, state: AppState) -> Router {
        let guarded = Router::new()
            .route("/api/generate", post(handlers::generate))
            .route_layer(middleware::from_fn_with_state(state.clone(), admission_guard));

        Router::new()
            .route("/api/csrf-token", get(handlers::csrf_token))
            .route("/api/rate-limit", get(handlers::rate_limit_status))
            .route("/health", get(handlers::health))
            .merge(guarded)
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.listener.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.listener.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let cleanup = CleanupTask::new(self.security.clone(), self.config.cleanup.clone());
        let cleanup_handle = tokio::spawn(cleanup.run(shutdown.subscribe()));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        if let Err(e) = cleanup_handle.await {
            tracing::error!(error = %e, "Cleanup task panicked");
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }
}
