#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use bizhub_api::auth::{Claims, TokenIssuer};
use bizhub_api::config::{AppConfig, Environment};
use bizhub_api::policy::PolicyEngine;
use bizhub_api::session::{MemorySessionStore, NewSession, Session, SessionStore};

pub const SECRET: &str = "integration-test-secret";

/// Router over the in-memory store and the embedded policy
pub struct TestApp {
    pub router: Router,
    pub store: MemorySessionStore,
    issuer: TokenIssuer,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let mut config = AppConfig::preset(Environment::Development);
        config.security.jwt_secret = SECRET.to_string();

        let store = MemorySessionStore::new();
        let policy = PolicyEngine::load(
            bizhub_api::policy::DEFAULT_MODEL,
            bizhub_api::policy::DEFAULT_RULES,
        )
        .await?;
        let state = bizhub_api::build_state(&config.security, Arc::new(store.clone()), Arc::new(policy))?;

        Ok(Self {
            router: bizhub_api::router(state),
            store,
            issuer: TokenIssuer::new(SECRET, chrono::Duration::hours(1))?,
        })
    }

    pub fn token(&self, role: &str) -> Result<String> {
        self.token_with(json!({ "role": role, "sub": "user-1" }))
    }

    pub fn token_with(&self, claims: Value) -> Result<String> {
        let claims: Claims = serde_json::from_value(claims)?;
        Ok(self.issuer.issue(claims)?)
    }

    pub async fn live_session(&self) -> Result<Session> {
        Ok(self
            .store
            .create(NewSession {
                user_id: Uuid::new_v4(),
                platform: Some("test".to_string()),
                ..Default::default()
            })
            .await?)
    }

    /// Token for `role` plus a fresh active session, ready to send
    pub async fn login(&self, role: &str) -> Result<(String, Session)> {
        Ok((self.token(role)?, self.live_session().await?))
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("response body is not JSON")?
        };
        Ok((status, body))
    }
}

pub fn request(method: &str, uri: &str, token: Option<&str>, session: Option<Uuid>) -> Request<Body> {
    request_with_body(method, uri, token, session, None)
}

pub fn request_with_body(
    method: &str,
    uri: &str,
    token: Option<&str>,
    session: Option<Uuid>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    if let Some(session) = session {
        builder = builder.header("session_id", session.to_string());
    }

    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("valid request")
}

/// A real listener on a free port, serving the same router as [`TestApp`]
pub struct TestServer {
    pub base_url: String,
    pub app: TestApp,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let app = TestApp::new().await?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let router = app.router.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self { base_url, app };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/healthz", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}
