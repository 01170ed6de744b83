//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (admission counters, tracked-key gauges)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never interpolated secrets or payloads
//! - Request ID (tower-http) flows through the HTTP trace spans
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
