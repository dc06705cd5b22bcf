// Route handlers. Every route sits behind the authorization middleware; which
// roles reach which handler is decided by the loaded policy, not here.
pub mod auth;
pub mod health;
pub mod session;

use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::Authorizer;
use crate::session::SessionStore;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub authorizer: Authorizer,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(authorizer: Authorizer) -> Self {
        let sessions = authorizer.sessions().clone();
        Self {
            authorizer,
            sessions,
        }
    }
}

/// Requests the policy lets through to a path with no route
pub async fn not_found() -> ApiError {
    ApiError::not_found("route not found")
}
