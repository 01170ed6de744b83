//! Periodic sweep of idle limiter records and expired CSRF tokens.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::CleanupConfig;
use crate::security::SecurityMiddleware;

pub struct CleanupTask {
    security: Arc<SecurityMiddleware>,
    config: CleanupConfig,
}

impl CleanupTask {
    pub fn new(security: Arc<SecurityMiddleware>, config: CleanupConfig) -> Self {
        Self { security, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Background cleanup disabled");
            return;
        }

        tracing::info!(interval = self.config.interval_secs, "Cleanup task starting");

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        // first tick fires immediately; nothing to sweep yet
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.security.cleanup();
                    tracing::debug!(
                        sessions = report.sessions,
                        ips = report.ips,
                        csrf_tokens = report.csrf_tokens,
                        "Cleanup sweep finished"
                    );
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cleanup task received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
