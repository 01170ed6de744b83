//! Wire form of an encrypted request.

use serde::{Deserialize, Serialize};

use crate::crypto::cipher::{CryptoError, PayloadCipher};
use crate::crypto::signer::RequestSigner;

pub const X_IV: &str = "x-iv";
pub const X_SIGNATURE: &str = "x-signature";
pub const X_TIMESTAMP: &str = "x-timestamp";
pub const X_ENCRYPTED_REQUEST: &str = "x-encrypted-request";

/// Encrypted request body: `{"encrypted": hex, "iv": hex, "timestamp": ms}`.
///
/// The ciphertext travels in the body rather than a header because prompts
/// and attachments easily exceed header size limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub encrypted: String,
    pub iv: String,
    pub timestamp: u64,
}

/// Envelope plus the signature a client sends in `X-Signature`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SealedEnvelope {
    pub envelope: EncryptedEnvelope,
    pub signature: String,
}

impl SealedEnvelope {
    /// Encrypt and sign `data` the way a client of the guard does.
    pub fn seal<T: Serialize + ?Sized>(
        cipher: &PayloadCipher,
        signer: &RequestSigner,
        data: &T,
    ) -> Result<Self, CryptoError> {
        let envelope = cipher.encrypt(data)?;
        let signature = signer.sign(&envelope.encrypted, envelope.timestamp);
        Ok(Self { envelope, signature })
    }

    /// Request headers accompanying the envelope body.
    pub fn headers(&self) -> [(&'static str, String); 4] {
        [
            (X_ENCRYPTED_REQUEST, "true".to_string()),
            (X_IV, self.envelope.iv.clone()),
            (X_SIGNATURE, self.signature.clone()),
            (X_TIMESTAMP, self.envelope.timestamp.to_string()),
        ]
    }
}
