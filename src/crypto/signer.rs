//! HMAC-SHA256 request signatures.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::crypto::key::EncryptionKey;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies `ciphertext || timestamp` with the shared key.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    key: EncryptionKey,
}

impl RequestSigner {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    /// Hex HMAC over the ciphertext hex immediately followed by the decimal timestamp.
    pub fn sign(&self, ciphertext_hex: &str, timestamp_ms: u64) -> String {
        hex::encode(self.mac(ciphertext_hex, timestamp_ms).finalize().into_bytes())
    }

    /// Constant-time verification. Malformed signature hex never verifies.
    pub fn verify(&self, ciphertext_hex: &str, timestamp_ms: u64, signature_hex: &str) -> bool {
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };
        self.mac(ciphertext_hex, timestamp_ms)
            .verify_slice(&signature)
            .is_ok()
    }

    fn mac(&self, ciphertext_hex: &str, timestamp_ms: u64) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(ciphertext_hex.as_bytes());
        mac.update(timestamp_ms.to_string().as_bytes());
        mac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> RequestSigner {
        RequestSigner::new(EncryptionKey::derive("signing secret"))
    }

    #[test]
    fn test_sign_verify() {
        let signer = signer();
        let signature = signer.sign("deadbeef", 1_700_000_000_000);
        assert_eq!(signature.len(), 64);
        assert!(signer.verify("deadbeef", 1_700_000_000_000, &signature));
    }

    #[test]
    fn test_matches_manual_concatenation() {
        let key = EncryptionKey::derive("signing secret");
        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).unwrap();
        mac.update(b"abc123");
        let expected = hex::encode(mac.finalize().into_bytes());

        assert_eq!(signer().sign("abc", 123), expected);
    }

    #[test]
    fn test_any_flipped_hex_char_fails() {
        let signer = signer();
        let signature = signer.sign("cafebabe", 99);

        for i in 0..signature.len() {
            let mut chars: Vec<char> = signature.chars().collect();
            chars[i] = if chars[i] == '0' { '1' } else { '0' };
            let tampered: String = chars.into_iter().collect();
            assert!(!signer.verify("cafebabe", 99, &tampered), "position {}", i);
        }
    }

    #[test]
    fn test_rejects_other_inputs() {
        let signer = signer();
        let signature = signer.sign("cafebabe", 99);
        assert!(!signer.verify("cafebabf", 99, &signature));
        assert!(!signer.verify("cafebabe", 100, &signature));
        assert!(!signer.verify("cafebabe", 99, "not hex"));
        assert!(!signer.verify("cafebabe", 99, &signature[..62]));
        assert!(!RequestSigner::new(EncryptionKey::derive("other")).verify("cafebabe", 99, &signature));
    }
}
