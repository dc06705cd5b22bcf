use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::auth::TokenVerifier;
use crate::config::{ConfigError, SecurityConfig};
use crate::handlers::{self, AppState};
use crate::middleware::{authorize_request, AuthSettings, Authorizer};
use crate::policy::PolicyEngine;
use crate::session::SessionStore;

/// Wire the verifier, session store and policy into handler state
pub fn build_state(
    security: &SecurityConfig,
    sessions: Arc<dyn SessionStore>,
    policy: Arc<PolicyEngine>,
) -> Result<AppState, ConfigError> {
    let verifier = TokenVerifier::new(&security.jwt_secret, security.jwt_leeway_secs);
    let settings = AuthSettings::from_config(security)?;
    Ok(AppState::new(Authorizer::new(verifier, sessions, policy, settings)))
}

/// Every route, with the authorization pipeline in front of all of them
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health::healthz))
        .route("/v1/auth/whoami", get(handlers::auth::whoami))
        .route("/v1/auth/logout", post(handlers::auth::logout))
        .route("/v1/session/list", get(handlers::session::list))
        .route("/v1/session", put(handlers::session::update))
        .route(
            "/v1/session/:id",
            get(handlers::session::get).delete(handlers::session::delete),
        )
        .fallback(handlers::not_found)
        .layer(from_fn_with_state(state.authorizer.clone(), authorize_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if security.cors_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}
