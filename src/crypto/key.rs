//! Key material derivation.

use std::fmt;

use sha2::{Digest, Sha256};

/// Length of the derived AES-256 / HMAC key.
pub const KEY_LEN: usize = 32;

/// Derived 32-byte key shared by the cipher and the signer.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    /// Derive key bytes from the configured secret.
    ///
    /// Exactly 64 hex characters (either case) are decoded as the raw key;
    /// anything else is treated as a passphrase and hashed with SHA-256.
    pub fn derive(secret: &str) -> Self {
        if secret.len() == KEY_LEN * 2 && secret.bytes().all(|b| b.is_ascii_hexdigit()) {
            let mut bytes = [0u8; KEY_LEN];
            if hex::decode_to_slice(secret, &mut bytes).is_ok() {
                return Self(bytes);
            }
        }
        Self(Sha256::digest(secret.as_bytes()).into())
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}
