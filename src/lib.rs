//! Admission and authentication guard for AI-generation endpoints.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod security;

pub mod admin;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::GuardConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::{AdmittedRequest, SecurityError, SecurityMiddleware};
