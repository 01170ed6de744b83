//! Origin allow-listing.

use axum::http::{header, HeaderMap};
use url::Url;

use crate::security::headers::header_value;

/// Allow-list of browser origins permitted to call guarded endpoints.
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    allowed: Vec<String>,
    allow_all: bool,
}

impl OriginPolicy {
    /// An empty list or a `*` entry allows every origin.
    pub fn new(allowed: &[String]) -> Self {
        let allow_all = allowed.is_empty() || allowed.iter().any(|origin| origin == "*");
        let allowed = allowed
            .iter()
            .filter(|origin| origin.as_str() != "*")
            .map(|origin| normalize(origin))
            .collect();
        Self { allowed, allow_all }
    }

    /// The request origin: `Origin`, else the origin of `Referer`.
    pub fn request_origin(headers: &HeaderMap) -> Option<String> {
        if let Some(origin) = header_value(headers, header::ORIGIN.as_str()) {
            return Some(normalize(origin));
        }
        header_value(headers, header::REFERER.as_str())
            .map(|referer| match Url::parse(referer) {
                Ok(url) => url.origin().ascii_serialization(),
                Err(_) => referer.to_string(),
            })
    }

    /// Requests without `Origin` and `Referer` (same-origin fetches,
    /// non-browser clients) are allowed.
    pub fn is_allowed(&self, headers: &HeaderMap) -> bool {
        if self.allow_all {
            return true;
        }
        match Self::request_origin(headers) {
            None => true,
            Some(origin) => self.allowed.iter().any(|allowed| *allowed == origin),
        }
    }
}

fn normalize(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}
