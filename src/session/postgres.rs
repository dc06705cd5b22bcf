use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use super::{NewSession, Session, SessionError, SessionFilter, SessionList, SessionStore, SessionUpdate};

const SCHEMA: &str = include_str!("../../sql/sessions.sql");

const COLUMNS: &str = "id, user_id, ip_address, user_agent, platform, is_active, \
                       expires_at, last_active_at, created_at, updated_at";

/// Session store backed by the `sessions` table
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `sessions` table and its indexes if they are missing
    pub async fn ensure_schema(&self) -> Result<(), SessionError> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Session schema ready");
        Ok(())
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &SessionFilter) {
        builder.push(" WHERE 1 = 1");
        if let Some(user_id) = filter.user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(is_active) = filter.is_active {
            builder.push(" AND is_active = ").push_bind(is_active);
        }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, id: Uuid) -> Result<Session, SessionError> {
        let query = format!("SELECT {} FROM sessions WHERE id = $1", COLUMNS);
        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(SessionError::NotFound(id))
    }

    async fn create(&self, new: NewSession) -> Result<Session, SessionError> {
        let query = format!(
            "INSERT INTO sessions (id, user_id, ip_address, user_agent, platform, is_active, expires_at) \
             VALUES ($1, $2, $3, $4, $5, TRUE, $6) RETURNING {}",
            COLUMNS
        );
        let session = sqlx::query_as::<_, Session>(&query)
            .bind(Uuid::new_v4())
            .bind(new.user_id)
            .bind(new.ip_address)
            .bind(new.user_agent)
            .bind(new.platform)
            .bind(new.expires_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(session)
    }

    async fn list(&self, filter: &SessionFilter) -> Result<SessionList, SessionError> {
        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM sessions", COLUMNS));
        Self::push_filters(&mut select, filter);
        select.push(" ORDER BY created_at DESC");
        if filter.limit > 0 {
            select.push(" LIMIT ").push_bind(i64::from(filter.limit));
        }
        select.push(" OFFSET ").push_bind(i64::from(filter.offset()));

        let sessions = select
            .build_query_as::<Session>()
            .fetch_all(&self.pool)
            .await?;

        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(1) FROM sessions");
        Self::push_filters(&mut count_query, filter);
        let count: i64 = count_query.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(SessionList { sessions, count })
    }

    async fn update(&self, update: SessionUpdate) -> Result<Session, SessionError> {
        let query = format!(
            "UPDATE sessions SET \
                ip_address = COALESCE($2, ip_address), \
                is_active = COALESCE($3, is_active), \
                last_active_at = now(), \
                updated_at = now() \
             WHERE id = $1 RETURNING {}",
            COLUMNS
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(update.id)
            .bind(update.ip_address)
            .bind(update.is_active)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(SessionError::NotFound(update.id))
    }

    async fn delete(&self, id: Uuid) -> Result<(), SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SessionError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_splits_into_statements() {
        let statements: Vec<&str> = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS sessions"));
    }

    #[test]
    fn list_query_binds_only_present_filters() {
        let filter = SessionFilter {
            user_id: Some(Uuid::nil()),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(1) FROM sessions");
        PgSessionStore::push_filters(&mut builder, &filter);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(1) FROM sessions WHERE 1 = 1 AND user_id = $1"
        );
    }
}
