//! Request envelope cryptography.
//!
//! # Data Flow
//! ```text
//! Client:  JSON payload → cipher.rs (AES-256-CBC, fresh IV)
//!                       → signer.rs (HMAC over ciphertext ‖ timestamp)
//!                       → envelope.rs (body + X-IV / X-Signature / X-Timestamp)
//!
//! Guard:   replay.rs (timestamp window)
//!     → signer.rs (constant-time verify)
//!     → cipher.rs (decrypt, fail closed)
//! ```
//!
//! # Design Decisions
//! - One derived key (key.rs) serves both encryption and signing
//! - Pure, synchronous operations with no shared mutable state
//! - The key is static for the process lifetime; no versioning in the envelope

pub mod cipher;
pub mod envelope;
pub mod key;
pub mod replay;
pub mod signer;

pub use cipher::{CryptoError, PayloadCipher};
pub use envelope::{EncryptedEnvelope, SealedEnvelope};
pub use key::EncryptionKey;
pub use replay::ReplayGuard;
pub use signer::RequestSigner;
