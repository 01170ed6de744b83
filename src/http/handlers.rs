//! Route handlers for the public API.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::server::AppState;
use crate::security::headers::{extract_client_ip, X_SESSION_ID};
use crate::security::{AdmittedRequest, SecurityError, SecurityErrorCode, SlidingWindowLimiter};

/// Success envelope shared by every API response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self { success: true, data })
    }
}

/// Body of `POST /api/generate` after decryption. Fields besides `prompt`
/// are passed through untouched.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: Option<String>,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAccepted {
    pub session_id: String,
    pub prompt: String,
    pub options: Map<String, Value>,
    pub remaining_requests: u32,
}

pub async fn generate(
    State(state): State<AppState>,
    Extension(admitted): Extension<AdmittedRequest>,
    body: Bytes,
) -> Result<Json<ApiResponse<GenerateAccepted>>, SecurityError> {
    let request: GenerateRequest = serde_json::from_slice(&body).map_err(|_| {
        SecurityError::new(
            SecurityErrorCode::InvalidPrompt,
            "Request body must be a JSON object with a string prompt",
        )
    })?;
    let raw = request
        .prompt
        .ok_or_else(|| SecurityError::new(SecurityErrorCode::InvalidPrompt, "Prompt is required"))?;

    let prompt = state.security.sanitize_prompt(&raw).inspect_err(|err| {
        tracing::warn!(session = %admitted.session_id, code = %err.code, "Prompt refused");
    })?;

    tracing::info!(
        session = %admitted.session_id,
        prompt_chars = prompt.chars().count(),
        "Generation request accepted"
    );

    Ok(ApiResponse::ok(GenerateAccepted {
        session_id: admitted.session_id,
        prompt,
        options: request.options,
        remaining_requests: admitted.remaining_requests,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTokenIssued {
    pub session_id: String,
    pub token: String,
    pub expires_at: u64,
}

pub async fn csrf_token(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = state.security.issue_csrf_token(&headers);
    let session_id = token.session_id.clone();

    let mut response = ApiResponse::ok(CsrfTokenIssued {
        session_id: token.session_id,
        token: token.token,
        expires_at: token.expires_at,
    })
    .into_response();
    if let Ok(value) = session_id.parse() {
        response.headers_mut().insert(X_SESSION_ID, value);
    }
    response
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitStatus {
    pub key: String,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch ms at which the current window ends; absent with no live window.
    pub reset_time: Option<u64>,
}

impl LimitStatus {
    fn of(limiter: &SlidingWindowLimiter, key: String) -> Self {
        Self {
            limit: limiter.max_requests(),
            remaining: limiter.remaining_requests(&key),
            reset_time: limiter.reset_time(&key),
            key,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RateLimitStatus {
    pub session: LimitStatus,
    pub ip: LimitStatus,
}

pub async fn rate_limit_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<ApiResponse<RateLimitStatus>> {
    let (session_id, _) = state.security.resolve_session_id(&headers);
    let client_ip = extract_client_ip(&headers);

    ApiResponse::ok(RateLimitStatus {
        session: LimitStatus::of(state.security.session_limiter(), session_id),
        ip: LimitStatus::of(state.security.ip_limiter(), client_ip),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
