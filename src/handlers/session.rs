use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::session::{parse_session_id, Session, SessionFilter, SessionList, SessionUpdate};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub user_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

impl From<ListQuery> for SessionFilter {
    fn from(query: ListQuery) -> Self {
        let defaults = SessionFilter::default();
        SessionFilter {
            page: query.page.filter(|p| *p > 0).unwrap_or(defaults.page),
            limit: query.limit.unwrap_or(defaults.limit),
            user_id: query.user_id,
            is_active: query.is_active,
        }
    }
}

/// GET /v1/session/list - page through sessions, newest first
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<SessionList> {
    let Query(query) = query?;
    let filter = SessionFilter::from(query);
    let sessions = state.sessions.list(&filter).await?;
    Ok(ApiResponse::success(sessions))
}

/// GET /v1/session/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Session> {
    let id = parse_session_id(&id)?;
    let session = state.sessions.get(id).await?;
    Ok(ApiResponse::success(session))
}

/// PUT /v1/session - change a session's IP address or active flag
pub async fn update(
    State(state): State<AppState>,
    body: Result<Json<SessionUpdate>, JsonRejection>,
) -> ApiResult<Session> {
    let Json(update) = body?;
    let session = state.sessions.update(update).await?;
    info!("Updated session {} (active={})", session.id, session.is_active);
    Ok(ApiResponse::success(session))
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: Uuid,
    pub deleted: bool,
}

/// DELETE /v1/session/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Deleted> {
    let id = parse_session_id(&id)?;
    state.sessions.delete(id).await?;
    info!("Deleted session {}", id);
    Ok(ApiResponse::success(Deleted { id, deleted: true }))
}
