//! Admin API.
//!
//! Served on its own bind address. Every route requires
//! `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::security::SecurityMiddleware;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub security: Arc<SecurityMiddleware>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/sessions/{id}", get(get_session))
        .route("/admin/sessions/{id}/block", post(block_session))
        .route("/admin/sessions/{id}/unblock", post(unblock_session))
        .route("/admin/sessions/{id}/reset", post(reset_session))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
