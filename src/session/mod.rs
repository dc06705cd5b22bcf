pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;

/// Server-side record of a login. A credential is only honoured while the
/// session it was issued with stays active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub platform: Option<String>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Active flag set and not past `expires_at`
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |expires| expires > now)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSession {
    pub user_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub platform: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update; `None` fields keep their stored value
#[derive(Debug, Clone, Deserialize)]
pub struct SessionUpdate {
    pub id: Uuid,
    pub ip_address: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFilter {
    pub page: u32,
    pub limit: u32,
    pub user_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

impl Default for SessionFilter {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            user_id: None,
            is_active: None,
        }
    }
}

impl SessionFilter {
    pub fn offset(&self) -> u32 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionList {
    pub sessions: Vec<Session>,
    pub count: i64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid session id: {0}")]
    InvalidId(String),

    #[error("Session lookup timed out")]
    Timeout,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Parse a session identifier as presented in a request header or path
pub fn parse_session_id(raw: &str) -> Result<Uuid, SessionError> {
    Uuid::parse_str(raw.trim()).map_err(|_| SessionError::InvalidId(raw.to_string()))
}

/// Storage for session records.
///
/// The authorization pipeline only calls [`SessionStore::get`]; the remaining
/// operations back the session administration endpoints. Implementations must
/// make a deactivation visible to every `get` that starts after it returns.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Session, SessionError>;

    async fn create(&self, new: NewSession) -> Result<Session, SessionError>;

    async fn list(&self, filter: &SessionFilter) -> Result<SessionList, SessionError>;

    async fn update(&self, update: SessionUpdate) -> Result<Session, SessionError>;

    async fn delete(&self, id: Uuid) -> Result<(), SessionError>;
}
