use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::security::SessionRecord;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub tracked_sessions: usize,
    pub tracked_ips: usize,
    pub csrf_tokens: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub remaining_requests: u32,
    pub reset_time: Option<u64>,
    pub record: SessionRecord,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRequest {
    pub duration_ms: u64,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        tracked_sessions: state.security.session_limiter().tracked_keys(),
        tracked_ips: state.security.ip_limiter().tracked_keys(),
        csrf_tokens: state.security.csrf().len(),
    })
}

pub async fn get_session(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, StatusCode> {
    let limiter = state.security.session_limiter();
    let record = limiter.snapshot(&id).ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(SessionView {
        remaining_requests: limiter.remaining_requests(&id),
        reset_time: limiter.reset_time(&id),
        session_id: id,
        record,
    }))
}

pub async fn block_session(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(body): Json<BlockRequest>,
) -> StatusCode {
    tracing::info!(session = %id, duration_ms = body.duration_ms, "Admin blocked session");
    state.security.session_limiter().block_session(&id, body.duration_ms);
    StatusCode::NO_CONTENT
}

pub async fn unblock_session(State(state): State<AdminState>, Path(id): Path<String>) -> StatusCode {
    tracing::info!(session = %id, "Admin unblocked session");
    state.security.session_limiter().unblock_session(&id);
    StatusCode::NO_CONTENT
}

pub async fn reset_session(State(state): State<AdminState>, Path(id): Path<String>) -> StatusCode {
    tracing::info!(session = %id, "Admin reset session");
    state.security.session_limiter().reset_session(&id);
    state.security.csrf().revoke(&id);
    StatusCode::NO_CONTENT
}
