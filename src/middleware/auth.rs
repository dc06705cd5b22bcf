use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, HeaderMap, HeaderName},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::context::{AuthContext, ANONYMOUS_ROLE};
use crate::auth::{fingerprint, Claims, TokenVerifier};
use crate::config::{ConfigError, SecurityConfig};
use crate::error::ApiError;
use crate::policy::PolicyEngine;
use crate::session::{parse_session_id, SessionError, SessionStore};

/// Why the pipeline refused to dispatch a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthRejection {
    #[error("Session is invalid")]
    SessionInvalid,

    #[error("Session is not active")]
    SessionInactive,

    #[error("access denied")]
    Forbidden,
}

/// Who the caller turned out to be once their credential was examined
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Anonymous,
    Authenticated { role: String, claims: Claims },
}

impl Identity {
    pub fn role(&self) -> &str {
        match self {
            Identity::Anonymous => ANONYMOUS_ROLE,
            Identity::Authenticated { role, .. } => role,
        }
    }
}

/// The request attributes the pipeline looks at
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub authorization: Option<&'a str>,
    pub session_id: Option<&'a str>,
    pub resource: &'a str,
    pub action: &'a str,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub role_claim: String,
    pub session_header: HeaderName,
    pub session_lookup_timeout: Duration,
}

impl AuthSettings {
    pub fn from_config(security: &SecurityConfig) -> Result<Self, ConfigError> {
        let session_header = HeaderName::from_bytes(security.session_header.as_bytes())
            .map_err(|_| {
                ConfigError::Invalid(format!(
                    "'{}' is not a valid session header name",
                    security.session_header
                ))
            })?;

        Ok(Self {
            role_claim: security.role_claim.clone(),
            session_header,
            session_lookup_timeout: Duration::from_millis(security.session_lookup_timeout_ms),
        })
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            role_claim: "role".to_string(),
            session_header: HeaderName::from_static("session_id"),
            session_lookup_timeout: Duration::from_secs(5),
        }
    }
}

/// Per-request gate: token, then session, then policy.
///
/// Cheap to clone; every collaborator is shared and immutable apart from the
/// session store, which owns its own consistency.
#[derive(Clone)]
pub struct Authorizer {
    verifier: Arc<TokenVerifier>,
    sessions: Arc<dyn SessionStore>,
    policy: Arc<PolicyEngine>,
    settings: Arc<AuthSettings>,
}

impl Authorizer {
    pub fn new(
        verifier: TokenVerifier,
        sessions: Arc<dyn SessionStore>,
        policy: Arc<PolicyEngine>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            verifier: Arc::new(verifier),
            sessions,
            policy,
            settings: Arc::new(settings),
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub async fn authorize(&self, request: AccessRequest<'_>) -> Result<AuthContext, AuthRejection> {
        let identity = self.resolve_identity(request.authorization);
        let role = identity.role();

        let session_id = if role == ANONYMOUS_ROLE {
            None
        } else {
            Some(self.check_session(request.session_id).await?)
        };

        match self.policy.enforce(role, request.resource, request.action) {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    "Policy denied role={} {} {}",
                    role, request.action, request.resource
                );
                return Err(AuthRejection::Forbidden);
            }
            Err(e) => {
                error!(
                    "Policy engine failed for role={} {} {}: {}",
                    role, request.action, request.resource, e
                );
                return Err(AuthRejection::Forbidden);
            }
        }

        Ok(match identity {
            Identity::Anonymous => AuthContext::anonymous(),
            Identity::Authenticated { role, claims } => AuthContext::new(role, &claims, session_id),
        })
    }

    /// Any problem with the credential downgrades to [`Identity::Anonymous`]
    pub fn resolve_identity(&self, authorization: Option<&str>) -> Identity {
        let Some(token) = authorization.map(strip_bearer).filter(|t| !t.is_empty()) else {
            return Identity::Anonymous;
        };

        let claims = match self.verifier.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("Ignoring credential {}: {}", fingerprint(token), e);
                return Identity::Anonymous;
            }
        };

        let role = match claims.get(&self.settings.role_claim) {
            Some(Value::String(role)) if !role.is_empty() => role.clone(),
            _ => {
                debug!(
                    "Credential {} has no usable '{}' claim",
                    fingerprint(token),
                    self.settings.role_claim
                );
                ANONYMOUS_ROLE.to_string()
            }
        };

        Identity::Authenticated { role, claims }
    }

    async fn check_session(&self, raw: Option<&str>) -> Result<Uuid, AuthRejection> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
            debug!("Missing {} header", self.settings.session_header);
            AuthRejection::SessionInvalid
        })?;
        let id = parse_session_id(raw).map_err(|_| AuthRejection::SessionInvalid)?;

        let lookup = tokio::time::timeout(self.settings.session_lookup_timeout, self.sessions.get(id));
        let session = match lookup.await.unwrap_or(Err(SessionError::Timeout)) {
            Ok(session) => session,
            Err(SessionError::NotFound(_)) => {
                debug!("Unknown session {}", id);
                return Err(AuthRejection::SessionInvalid);
            }
            Err(e) => {
                warn!("Session lookup for {} failed: {}", id, e);
                return Err(AuthRejection::SessionInvalid);
            }
        };

        if !session.is_live(Utc::now()) {
            debug!("Session {} is not active", id);
            return Err(AuthRejection::SessionInactive);
        }
        Ok(session.id)
    }
}

/// `Bearer ` in any case, then surrounding whitespace. Values without the
/// scheme are returned trimmed.
fn strip_bearer(value: &str) -> &str {
    let value = value.trim_start();
    match value.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => value[7..].trim(),
        _ => value.trim_end(),
    }
}

/// Axum middleware running [`Authorizer::authorize`] in front of every route
pub async fn authorize_request(
    State(authorizer): State<Authorizer>,
    mut request: Request,
    next: Next,
) -> Response {
    let resource = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let action = request.method().as_str().to_string();

    let outcome = {
        let headers: &HeaderMap = request.headers();
        authorizer
            .authorize(AccessRequest {
                authorization: header_str(headers, &header::AUTHORIZATION),
                session_id: header_str(headers, &authorizer.settings.session_header),
                resource: &resource,
                action: &action,
            })
            .await
    };

    match outcome {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(rejection) => {
            debug!("Rejected {} {}: {}", action, resource, rejection);
            ApiError::from(rejection).into_response()
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
