use axum::extract::State;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthContext};
use crate::session::SessionUpdate;

/// GET /v1/auth/whoami - the identity the pipeline resolved for this request
pub async fn whoami(auth: AuthContext) -> ApiResult<AuthContext> {
    Ok(ApiResponse::success(auth))
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub session_id: Uuid,
    pub is_active: bool,
}

/// POST /v1/auth/logout - deactivate the session presented with this request.
///
/// The credential itself stays valid until it expires; every later request
/// carrying it fails the session check instead.
pub async fn logout(State(state): State<AppState>, auth: AuthContext) -> ApiResult<LogoutResponse> {
    let session_id = auth
        .session_id
        .ok_or_else(|| ApiError::not_found("no session attached to this request"))?;

    let session = state
        .sessions
        .update(SessionUpdate {
            id: session_id,
            ip_address: None,
            is_active: Some(false),
        })
        .await?;

    info!("Session {} logged out (role={})", session.id, auth.role);
    Ok(ApiResponse::success(LogoutResponse {
        session_id: session.id,
        is_active: session.is_active,
    }))
}
