//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming guarded request:
//!     → headers.rs (session id, client IP)
//!     → origin.rs (allow-list)
//!     → rate_limit.rs (session + IP windows, backed by store.rs)
//!     → csrf.rs (optional token check)
//!     → crate::crypto (replay window, signature, decryption)
//!     → middleware.rs returns AdmittedRequest or SecurityError
//! Handler:
//!     → sanitize.rs (prompt cleanup + content policy)
//! ```
//!
//! # Design Decisions
//! - Fail closed: the first failing stage rejects the request
//! - Rate-limit slots are reserved, then committed only on full admission
//! - Shared state lives in DashMap; every mutation holds one key's lock
//! - No trust in client input

pub mod csrf;
pub mod error;
pub mod headers;
pub mod history;
pub mod middleware;
pub mod origin;
pub mod rate_limit;
pub mod sanitize;
pub mod store;

pub use csrf::{CsrfToken, CsrfTokenStore};
pub use error::{SecurityError, SecurityErrorCode};
pub use middleware::{AdmittedRequest, CleanupReport, SecurityMiddleware};
pub use origin::OriginPolicy;
pub use rate_limit::{Admission, LimitScope, RateLimitError, SlidingWindowLimiter};
pub use sanitize::{ContentPolicy, PromptSanitizer};
pub use store::{InMemorySessionStore, SessionRecord, SessionStore};
