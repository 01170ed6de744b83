//! AES-256-CBC payload encryption.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::clock::SharedClock;
use crate::crypto::envelope::EncryptedEnvelope;
use crate::crypto::key::EncryptionKey;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block and IV length in bytes.
pub const IV_LEN: usize = 16;

/// Errors from encrypting or decrypting a payload.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("payload serialization failed: {0}")]
    Serialize(serde_json::Error),

    #[error("invalid hex in {0}")]
    Hex(&'static str),

    #[error("IV must be 16 bytes, got {0}")]
    IvLength(usize),

    #[error("ciphertext length {0} is not a positive multiple of the block size")]
    CiphertextLength(usize),

    #[error("invalid padding")]
    Padding,

    #[error("plaintext is not valid UTF-8")]
    Utf8,

    #[error("plaintext is not valid JSON: {0}")]
    Json(serde_json::Error),
}

/// Symmetric cipher for request bodies.
///
/// Every call to [`encrypt`](Self::encrypt) draws a fresh IV from the OS
/// random source; IVs are never derived or reused.
#[derive(Debug, Clone)]
pub struct PayloadCipher {
    key: EncryptionKey,
    clock: SharedClock,
}

impl PayloadCipher {
    pub fn new(key: EncryptionKey, clock: SharedClock) -> Self {
        Self { key, clock }
    }

    /// Serialize `data` to JSON and encrypt it into a timestamped envelope.
    pub fn encrypt<T: Serialize + ?Sized>(&self, data: &T) -> Result<EncryptedEnvelope, CryptoError> {
        let plaintext = serde_json::to_vec(data).map_err(CryptoError::Serialize)?;

        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let key = *self.key.as_bytes();
        let ciphertext = Aes256CbcEnc::new(&key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

        Ok(EncryptedEnvelope {
            encrypted: hex::encode(ciphertext),
            iv: hex::encode(iv),
            timestamp: self.clock.now_ms(),
        })
    }

    /// Decrypt a hex ciphertext into a JSON value.
    ///
    /// Fails closed: any hex, length, padding, UTF-8 or JSON problem is an
    /// error and no partial plaintext is returned.
    pub fn decrypt(&self, ciphertext_hex: &str, iv_hex: &str) -> Result<Value, CryptoError> {
        self.decrypt_as(ciphertext_hex, iv_hex)
    }

    /// Decrypt directly into a typed payload.
    pub fn decrypt_as<T: DeserializeOwned>(
        &self,
        ciphertext_hex: &str,
        iv_hex: &str,
    ) -> Result<T, CryptoError> {
        let plaintext = self.decrypt_bytes(ciphertext_hex, iv_hex)?;
        let text = std::str::from_utf8(&plaintext).map_err(|_| CryptoError::Utf8)?;
        serde_json::from_str(text).map_err(CryptoError::Json)
    }

    fn decrypt_bytes(&self, ciphertext_hex: &str, iv_hex: &str) -> Result<Vec<u8>, CryptoError> {
        let iv_bytes = hex::decode(iv_hex).map_err(|_| CryptoError::Hex("iv"))?;
        let iv: [u8; IV_LEN] = iv_bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::IvLength(iv_bytes.len()))?;

        let ciphertext = hex::decode(ciphertext_hex).map_err(|_| CryptoError::Hex("ciphertext"))?;
        if ciphertext.is_empty() || ciphertext.len() % IV_LEN != 0 {
            return Err(CryptoError::CiphertextLength(ciphertext.len()));
        }

        let key = *self.key.as_bytes();
        Aes256CbcDec::new(&key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CryptoError::Padding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;
    use std::sync::Arc;

    const HEX_KEY: &str = "8f3a1c9b2e7d4f6a0b5c8e1d3f7a9c2b4e6d8f0a1c3b5d7e9f2a4c6b8d0e1f3a";

    fn cipher(secret: &str) -> PayloadCipher {
        PayloadCipher::new(EncryptionKey::derive(secret), Arc::new(ManualClock::new(42_000)))
    }

    #[test]
    fn test_round_trip_hex_key() {
        let cipher = cipher(HEX_KEY);
        let data = json!({
            "prompt": "a cat in a hat",
            "style": { "name": "watercolor", "strength": 0.7 },
            "tags": ["one", "two"],
            "count": 3,
            "nsfw": false,
            "seed": null
        });

        let envelope = cipher.encrypt(&data).unwrap();
        assert_eq!(envelope.timestamp, 42_000);
        assert_eq!(envelope.iv.len(), IV_LEN * 2);
        assert_eq!(cipher.decrypt(&envelope.encrypted, &envelope.iv).unwrap(), data);
    }

    #[test]
    fn test_round_trip_passphrase() {
        let cipher = cipher("correct horse battery staple");
        let data = json!("unicode: 猫 🐈");
        let envelope = cipher.encrypt(&data).unwrap();
        assert_eq!(cipher.decrypt(&envelope.encrypted, &envelope.iv).unwrap(), data);
    }

    #[test]
    fn test_fresh_iv_every_call() {
        let cipher = cipher(HEX_KEY);
        let a = cipher.encrypt(&json!({"x": 1})).unwrap();
        let b = cipher.encrypt(&json!({"x": 1})).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.encrypted, b.encrypted);
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let envelope = cipher(HEX_KEY).encrypt(&json!({"secret": true})).unwrap();
        // Wrong key yields either a padding error or garbage that is not JSON.
        assert!(cipher("another key").decrypt(&envelope.encrypted, &envelope.iv).is_err());
    }

    #[test]
    fn test_malformed_inputs() {
        let cipher = cipher(HEX_KEY);
        let envelope = cipher.encrypt(&json!([1, 2, 3])).unwrap();

        assert!(matches!(
            cipher.decrypt("zz", &envelope.iv),
            Err(CryptoError::Hex("ciphertext"))
        ));
        assert!(matches!(
            cipher.decrypt(&envelope.encrypted, "abcd"),
            Err(CryptoError::IvLength(2))
        ));
        assert!(matches!(
            cipher.decrypt(&envelope.encrypted[..30], &envelope.iv),
            Err(CryptoError::CiphertextLength(15))
        ));
        assert!(matches!(
            cipher.decrypt("", &envelope.iv),
            Err(CryptoError::CiphertextLength(0))
        ));
    }

    #[test]
    fn test_non_json_plaintext_rejected() {
        let cipher = cipher(HEX_KEY);
        let key = *EncryptionKey::derive(HEX_KEY).as_bytes();
        let iv = [7u8; IV_LEN];
        let ciphertext = Aes256CbcEnc::new(&key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(b"not json at all");

        let err = cipher
            .decrypt(&hex::encode(ciphertext), &hex::encode(iv))
            .unwrap_err();
        assert!(matches!(err, CryptoError::Json(_)));
    }
}
