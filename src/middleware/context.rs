use std::collections::BTreeMap;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::Claims;
use crate::error::ApiError;

/// Role assigned to callers without a usable identity
pub const ANONYMOUS_ROLE: &str = "unauthorized";

/// Request-scoped identity placed in request extensions once the
/// authorization pipeline lets a request through. Never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    pub role: String,
    pub claims: BTreeMap<String, String>,
    pub session_id: Option<Uuid>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self {
            role: ANONYMOUS_ROLE.to_string(),
            claims: BTreeMap::new(),
            session_id: None,
        }
    }

    pub fn new(role: impl Into<String>, claims: &Claims, session_id: Option<Uuid>) -> Self {
        Self {
            role: role.into(),
            claims: project_claims(claims),
            session_id,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.role == ANONYMOUS_ROLE
    }

    pub fn claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).map(String::as_str)
    }
}

/// Strings are carried verbatim; every other JSON value in its JSON form
pub fn project_claims(claims: &Claims) -> BTreeMap<String, String> {
    claims
        .iter()
        .map(|(name, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), text)
        })
        .collect()
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthContext>().cloned().ok_or_else(|| {
            tracing::error!("AuthContext missing; authorization middleware not installed on this route");
            ApiError::internal_server_error("Authorization context unavailable")
        })
    }
}
