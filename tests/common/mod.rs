//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use serde_json::Value;

use genguard::clock::ManualClock;
use genguard::config::GuardConfig;
use genguard::crypto::SealedEnvelope;
use genguard::http::{AppState, HttpServer};
use genguard::security::SecurityMiddleware;

pub const NOW: u64 = 1_700_000_000_000;
pub const SECRET: &str = "integration passphrase";
pub const ALLOWED_ORIGIN: &str = "https://app.example.com";

/// Config with a small session quota and one allowed origin.
pub fn test_config() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.encryption.key = SECRET.to_string();
    config.rate_limit.max_requests = 5;
    config.ip_rate_limit.max_requests = 8;
    config.security.allowed_origins = vec![ALLOWED_ORIGIN.to_string()];
    config.security.sensitive_terms = vec!["nsfw".to_string()];
    config.cleanup.enabled = false;
    config
}

pub struct Harness {
    pub router: Router,
    pub security: Arc<SecurityMiddleware>,
    pub clock: Arc<ManualClock>,
}

pub fn harness(config: GuardConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(NOW));
    let security = Arc::new(SecurityMiddleware::new(&config, clock.clone()));
    let state = AppState {
        security: security.clone(),
        max_body_size: config.listener.max_body_size,
    };
    Harness {
        router: HttpServer::build_router(&config, state),
        security,
        clock,
    }
}

impl Harness {
    pub fn seal(&self, payload: &Value) -> SealedEnvelope {
        SealedEnvelope::seal(self.security.cipher(), self.security.signer(), payload).unwrap()
    }

    /// A correctly sealed `POST /api/generate` for `session` from `ip`.
    pub fn generate_request(&self, session: &str, ip: &str, payload: &Value) -> Request<Body> {
        let sealed = self.seal(payload);
        let mut builder = Request::post("/api/generate")
            .header("content-type", "application/json")
            .header("x-session-id", session)
            .header("x-forwarded-for", ip)
            .header("origin", ALLOWED_ORIGIN);
        for (name, value) in sealed.headers() {
            builder = builder.header(name, value);
        }
        builder
            .body(Body::from(serde_json::to_vec(&sealed.envelope).unwrap()))
            .unwrap()
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
