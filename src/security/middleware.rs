//! Admission pipeline for guarded endpoints.
//!
//! # Data Flow
//! ```text
//! headers + body
//!     → session id (X-Session-Id or generated)
//!     → client IP (proxy headers)
//!     → origin allow-list
//!     → session limiter + IP limiter (slots reserved)
//!     → CSRF token (when required)
//!     → envelope presence → replay window → signature → decrypt
//!     → slots committed, AdmittedRequest returned
//! ```
//!
//! Every stage short-circuits with a [`SecurityError`]; dropped
//! reservations give their rate-limit slots back.

use axum::http::HeaderMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::SharedClock;
use crate::config::GuardConfig;
use crate::crypto::envelope::{X_ENCRYPTED_REQUEST, X_IV, X_SIGNATURE, X_TIMESTAMP};
use crate::crypto::{EncryptionKey, PayloadCipher, ReplayGuard, RequestSigner};
use crate::observability::metrics;
use crate::security::csrf::{CsrfToken, CsrfTokenStore};
use crate::security::error::{SecurityError, SecurityErrorCode};
use crate::security::headers::{extract_client_ip, header_value, X_CSRF_TOKEN, X_SESSION_ID};
use crate::security::origin::OriginPolicy;
use crate::security::rate_limit::{LimitScope, SlidingWindowLimiter};
use crate::security::sanitize::PromptSanitizer;

const SESSION_PREFIX: &str = "session_";
const SESSION_SUFFIX_LEN: usize = 9;

/// Context attached to a request that passed every stage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmittedRequest {
    pub session_id: String,
    pub client_ip: String,
    /// The session id was generated because the client sent none.
    pub session_generated: bool,
    /// Decrypted body for encrypted requests.
    pub payload: Option<Value>,
    /// Session quota left after this request.
    pub remaining_requests: u32,
}

/// Evictions performed by one cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub sessions: usize,
    pub ips: usize,
    pub csrf_tokens: usize,
}

#[derive(Debug, Default, Deserialize)]
struct EnvelopeBody {
    encrypted: Option<String>,
    iv: Option<String>,
    timestamp: Option<Value>,
}

/// The only component the HTTP layer calls.
#[derive(Debug)]
pub struct SecurityMiddleware {
    clock: SharedClock,
    session_limiter: SlidingWindowLimiter,
    ip_limiter: SlidingWindowLimiter,
    cipher: PayloadCipher,
    signer: RequestSigner,
    replay: ReplayGuard,
    csrf: CsrfTokenStore,
    origins: OriginPolicy,
    sanitizer: PromptSanitizer,
    require_encryption: bool,
    require_csrf: bool,
}

impl SecurityMiddleware {
    pub fn new(config: &GuardConfig, clock: SharedClock) -> Self {
        let key = EncryptionKey::derive(&config.encryption.key);

        Self {
            session_limiter: SlidingWindowLimiter::new(LimitScope::Session, &config.rate_limit, clock.clone()),
            ip_limiter: SlidingWindowLimiter::new(LimitScope::Ip, &config.ip_rate_limit, clock.clone()),
            cipher: PayloadCipher::new(key.clone(), clock.clone()),
            signer: RequestSigner::new(key),
            replay: ReplayGuard::new(clock.clone(), config.encryption.max_age_ms),
            csrf: CsrfTokenStore::new(clock.clone(), config.csrf.ttl_ms),
            origins: OriginPolicy::new(&config.security.allowed_origins),
            sanitizer: PromptSanitizer::from_config(&config.security),
            require_encryption: config.encryption.require_encryption,
            require_csrf: config.csrf.required,
            clock,
        }
    }

    pub fn session_limiter(&self) -> &SlidingWindowLimiter {
        &self.session_limiter
    }

    pub fn ip_limiter(&self) -> &SlidingWindowLimiter {
        &self.ip_limiter
    }

    pub fn csrf(&self) -> &CsrfTokenStore {
        &self.csrf
    }

    pub fn cipher(&self) -> &PayloadCipher {
        &self.cipher
    }

    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }

    /// `session_<ms>_<9 random lowercase alphanumerics>`.
    pub fn generate_session_id(&self) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        format!("{}{}_{}", SESSION_PREFIX, self.clock.now_ms(), suffix)
    }

    /// The client's `X-Session-Id`, or a new id (flagged `true`).
    pub fn resolve_session_id(&self, headers: &HeaderMap) -> (String, bool) {
        match header_value(headers, X_SESSION_ID) {
            Some(id) => (id.to_string(), false),
            None => (self.generate_session_id(), true),
        }
    }

    /// Run the full admission pipeline for one request to `endpoint`.
    pub fn validate_request(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        endpoint: &str,
    ) -> Result<AdmittedRequest, SecurityError> {
        let (session_id, session_generated) = self.resolve_session_id(headers);
        let client_ip = extract_client_ip(headers);

        match self.admit(headers, body, endpoint, &session_id, &client_ip) {
            Ok(payload) => {
                let remaining_requests = self.session_limiter.remaining_requests(&session_id);
                metrics::record_admitted(endpoint);
                tracing::debug!(
                    session = %session_id,
                    client_ip = %client_ip,
                    endpoint = %endpoint,
                    remaining = remaining_requests,
                    encrypted = payload.is_some(),
                    "Request admitted"
                );
                Ok(AdmittedRequest {
                    session_id,
                    client_ip,
                    session_generated,
                    payload,
                    remaining_requests,
                })
            }
            Err(err) => {
                metrics::record_rejected(err.code.as_str());
                tracing::warn!(
                    session = %session_id,
                    client_ip = %client_ip,
                    endpoint = %endpoint,
                    code = %err.code,
                    details = %err.details,
                    "Request rejected"
                );
                Err(err)
            }
        }
    }

    /// Clean a user prompt; see [`PromptSanitizer::sanitize`].
    pub fn sanitize_prompt(&self, text: &str) -> Result<String, SecurityError> {
        self.sanitizer.sanitize(text)
    }

    /// Resolve the session and issue it a CSRF token.
    pub fn issue_csrf_token(&self, headers: &HeaderMap) -> CsrfToken {
        let (session_id, _) = self.resolve_session_id(headers);
        self.csrf.generate_token(&session_id)
    }

    /// Evict idle limiter records and expired CSRF tokens.
    pub fn cleanup(&self) -> CleanupReport {
        let report = CleanupReport {
            sessions: self.session_limiter.cleanup(),
            ips: self.ip_limiter.cleanup(),
            csrf_tokens: self.csrf.cleanup(),
        };
        metrics::record_cleanup(&report);
        metrics::record_tracked_keys(
            self.session_limiter.tracked_keys(),
            self.ip_limiter.tracked_keys(),
        );
        report
    }

    fn admit(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        endpoint: &str,
        session_id: &str,
        client_ip: &str,
    ) -> Result<Option<Value>, SecurityError> {
        if !self.origins.is_allowed(headers) {
            let origin = OriginPolicy::request_origin(headers).unwrap_or_default();
            return Err(SecurityError::new(
                SecurityErrorCode::InvalidOrigin,
                format!("Origin not allowed: {}", origin),
            ));
        }

        let session_slot = self.session_limiter.try_acquire(session_id)?;
        let ip_slot = self.ip_limiter.try_acquire(client_ip)?;

        if self.require_csrf {
            let valid = header_value(headers, X_CSRF_TOKEN)
                .is_some_and(|token| self.csrf.validate_token(session_id, token));
            if !valid {
                return Err(SecurityError::new(
                    SecurityErrorCode::InvalidCsrfToken,
                    "Missing or invalid CSRF token",
                ));
            }
        }

        let payload = if self.is_encrypted(headers) {
            Some(self.open_envelope(headers, body)?)
        } else {
            None
        };

        session_slot.commit(endpoint, true);
        ip_slot.commit(endpoint, true);
        Ok(payload)
    }

    fn is_encrypted(&self, headers: &HeaderMap) -> bool {
        self.require_encryption
            || header_value(headers, X_ENCRYPTED_REQUEST).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    fn open_envelope(&self, headers: &HeaderMap, body: &[u8]) -> Result<Value, SecurityError> {
        let envelope: EnvelopeBody = serde_json::from_slice(body).unwrap_or_default();

        let ciphertext = envelope.encrypted.filter(|c| !c.is_empty());
        let signature = header_value(headers, X_SIGNATURE);
        let timestamp = header_value(headers, X_TIMESTAMP)
            .map(|t| Value::String(t.to_string()))
            .or(envelope.timestamp);
        let iv = header_value(headers, X_IV)
            .map(str::to_string)
            .or(envelope.iv)
            .filter(|iv| !iv.is_empty());

        let (Some(ciphertext), Some(signature), Some(timestamp), Some(iv)) =
            (ciphertext, signature, timestamp, iv)
        else {
            return Err(SecurityError::new(
                SecurityErrorCode::MissingEncryptionHeaders,
                "Encrypted requests need an encrypted body, signature, timestamp and IV",
            ));
        };

        let timestamp = parse_timestamp(&timestamp)
            .filter(|ts| self.replay.is_timestamp_valid(*ts))
            .ok_or_else(|| {
                SecurityError::new(
                    SecurityErrorCode::InvalidTimestamp,
                    "Request timestamp is malformed or outside the accepted window",
                )
            })?;

        if !self.signer.verify(&ciphertext, timestamp, signature) {
            return Err(SecurityError::new(
                SecurityErrorCode::InvalidSignature,
                "Request signature does not match",
            ));
        }

        self.cipher.decrypt(&ciphertext, &iv).map_err(|e| {
            tracing::debug!(error = %e, "Envelope decryption failed");
            SecurityError::new(SecurityErrorCode::DecryptionFailed, "Request payload could not be decrypted")
        })
    }
}

fn parse_timestamp(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
