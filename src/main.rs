//! genguard
//!
//! Request-admission front door for an AI-generation API.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ guard ──▶ SecurityMiddleware ──▶ handler
//!                     (request id,     │        origin → rate limits →
//!                      timeout,        │        csrf → replay → signature
//!                      body limit)     │        → decrypt
//!                                      ▼
//!                               SecurityError (JSON, Retry-After)
//!
//!     Admin client ──▶ admin router (bearer key) ──▶ limiter block/unblock/reset
//!     Cleanup task ──▶ evicts idle records and expired CSRF tokens
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use genguard::admin::{setup_admin_router, AdminState};
use genguard::clock::system_clock;
use genguard::config::load_config;
use genguard::http::HttpServer;
use genguard::lifecycle::{signals, Shutdown};
use genguard::observability::{logging, metrics};
use genguard::security::SecurityMiddleware;

#[derive(Parser)]
#[command(name = "genguard", version, about = "Admission guard for AI-generation endpoints")]
struct Args {
    /// Path to a TOML config file; environment overrides apply on top.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("genguard v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        session_limit = config.rate_limit.max_requests,
        ip_limit = config.ip_rate_limit.max_requests,
        window_ms = config.rate_limit.window_ms,
        require_encryption = config.encryption.require_encryption,
        csrf_required = config.csrf.required,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let security = Arc::new(SecurityMiddleware::new(&config, system_clock()));
    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let admin_handle = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let router = setup_admin_router(AdminState {
            security: security.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        });
        let signalled = shutdown.signalled();
        Some(tokio::spawn(async move {
            axum::serve(listener, router).with_graceful_shutdown(signalled).await
        }))
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    HttpServer::new(config, security).run(listener, shutdown).await?;

    if let Some(handle) = admin_handle {
        handle.await??;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
