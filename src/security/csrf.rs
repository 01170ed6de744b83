//! CSRF token issuance and validation.

use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::clock::SharedClock;

const TOKEN_PREFIX: &str = "csrf_";

/// A live token bound to one session.
#[derive(Debug, Clone)]
pub struct CsrfToken {
    pub session_id: String,
    pub token: String,
    pub expires_at: u64,
}

/// Per-session CSRF tokens; one live token per session.
#[derive(Debug)]
pub struct CsrfTokenStore {
    tokens: DashMap<String, CsrfToken>,
    clock: SharedClock,
    ttl_ms: u64,
}

impl CsrfTokenStore {
    pub fn new(clock: SharedClock, ttl_ms: u64) -> Self {
        Self {
            tokens: DashMap::new(),
            clock,
            ttl_ms,
        }
    }

    /// Issue a fresh token for `session_id`, replacing any previous one.
    pub fn generate_token(&self, session_id: &str) -> CsrfToken {
        let now = self.clock.now_ms();
        let mut suffix = [0u8; 16];
        OsRng.fill_bytes(&mut suffix);

        let token = CsrfToken {
            session_id: session_id.to_string(),
            token: format!("{}{}_{}", TOKEN_PREFIX, now, hex::encode(suffix)),
            expires_at: now.saturating_add(self.ttl_ms),
        };
        self.tokens.insert(session_id.to_string(), token.clone());
        token
    }

    /// True only for the session's current, unexpired token. Expired tokens are evicted.
    pub fn validate_token(&self, session_id: &str, token: &str) -> bool {
        let now = self.clock.now_ms();
        let expired = match self.tokens.get(session_id) {
            None => return false,
            Some(stored) if now < stored.expires_at => {
                return stored.token.as_bytes().ct_eq(token.as_bytes()).into();
            }
            Some(_) => true,
        };

        if expired {
            self.tokens
                .remove_if(session_id, |_, stored| now >= stored.expires_at);
        }
        false
    }

    /// Drop the token for `session_id`.
    pub fn revoke(&self, session_id: &str) {
        self.tokens.remove(session_id);
    }

    /// Remove every expired token; returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now_ms();
        let before = self.tokens.len();
        self.tokens.retain(|_, token| now < token.expires_at);
        before.saturating_sub(self.tokens.len())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
