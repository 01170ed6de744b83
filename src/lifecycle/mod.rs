//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build SecurityMiddleware → Start listeners
//!
//! Background (cleanup.rs):
//!     Interval tick → SecurityMiddleware::cleanup → metrics
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → listeners drain, sweep exits
//! ```
//!
//! # Design Decisions
//! - Config is validated before any listener binds
//! - One broadcast channel fans the shutdown signal out to every task

pub mod cleanup;
pub mod shutdown;
pub mod signals;

pub use cleanup::CleanupTask;
pub use shutdown::Shutdown;
