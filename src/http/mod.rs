//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, timeout, body limit, trace)
//!     → guard.rs (admission pipeline for /api/generate)
//!     → handlers.rs (prompt sanitation, token issuance, status)
//!     → Send to client
//! ```

pub mod guard;
pub mod handlers;
pub mod server;

pub use server::{AppState, HttpServer};
