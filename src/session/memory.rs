use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewSession, Session, SessionError, SessionFilter, SessionList, SessionStore, SessionUpdate};

/// Process-local session store, used when no database is configured and by tests
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed record, replacing any session with the same id
    pub async fn insert(&self, session: Session) {
        self.sessions.write().await.insert(session.id, session);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: Uuid) -> Result<Session, SessionError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    async fn create(&self, new: NewSession) -> Result<Session, SessionError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            ip_address: new.ip_address,
            user_agent: new.user_agent,
            platform: new.platform,
            is_active: true,
            expires_at: new.expires_at,
            last_active_at: None,
            created_at: now,
            updated_at: now,
        };
        self.insert(session.clone()).await;
        Ok(session)
    }

    async fn list(&self, filter: &SessionFilter) -> Result<SessionList, SessionError> {
        let sessions = self.sessions.read().await;

        let mut matching: Vec<Session> = sessions
            .values()
            .filter(|s| filter.user_id.map_or(true, |user_id| s.user_id == user_id))
            .filter(|s| filter.is_active.map_or(true, |active| s.is_active == active))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let count = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(if filter.limit == 0 { usize::MAX } else { filter.limit as usize })
            .collect();

        Ok(SessionList {
            sessions: page,
            count,
        })
    }

    async fn update(&self, update: SessionUpdate) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&update.id)
            .ok_or(SessionError::NotFound(update.id))?;

        if let Some(ip_address) = update.ip_address {
            session.ip_address = Some(ip_address);
        }
        if let Some(is_active) = update.is_active {
            session.is_active = is_active;
        }
        let now = Utc::now();
        session.last_active_at = Some(now);
        session.updated_at = now;

        Ok(session.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(SessionError::NotFound(id))
    }
}
