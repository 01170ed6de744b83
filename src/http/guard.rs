//! Admission middleware wrapping guarded routes.

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::server::AppState;
use crate::security::headers::{X_RATELIMIT_REMAINING, X_SESSION_ID};
use crate::security::{SecurityError, SecurityErrorCode};

/// Run the admission pipeline; on success the handler sees the decrypted
/// payload as its body and an [`AdmittedRequest`](crate::security::AdmittedRequest)
/// extension.
pub async fn admission_guard(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let bytes = match to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, limit = state.max_body_size, "Failed to read request body");
            return SecurityError::new(
                SecurityErrorCode::PayloadTooLarge,
                format!("Request body exceeds {} bytes", state.max_body_size),
            )
            .into_response();
        }
    };

    let endpoint = parts.uri.path().to_string();
    let admitted = match state.security.validate_request(&parts.headers, &bytes, &endpoint) {
        Ok(admitted) => admitted,
        Err(err) => return err.into_response(),
    };

    let body = match &admitted.payload {
        Some(payload) => {
            parts
                .headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            Body::from(payload.to_string())
        }
        None => Body::from(bytes),
    };
    parts.headers.remove(header::CONTENT_LENGTH);

    let session_id = HeaderValue::from_str(&admitted.session_id).ok();
    let remaining = HeaderValue::from(admitted.remaining_requests);
    parts.extensions.insert(admitted);

    let mut response = next.run(Request::from_parts(parts, body)).await;
    let headers = response.headers_mut();
    if let Some(session_id) = session_id {
        headers.insert(X_SESSION_ID, session_id);
    }
    headers.insert(X_RATELIMIT_REMAINING, remaining);
    response
}
