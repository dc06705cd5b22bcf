mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use bizhub_api::session::{SessionStore, SessionUpdate};
use common::{request, TestApp};

#[tokio::test]
async fn anonymous_caller_reaches_public_route() -> Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = app.send(request("GET", "/healthz", None, None)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("ok"));
    Ok(())
}

#[tokio::test]
async fn user_with_active_session_sees_projected_identity() -> Result<()> {
    let app = TestApp::new().await?;
    let session = app.live_session().await?;
    let token = app.token_with(json!({"role": "user", "sub": "user-42", "tier": 3}))?;

    let (status, body) = app
        .send(request("GET", "/v1/auth/whoami", Some(&token), Some(session.id)))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], json!("user"));
    assert_eq!(body["data"]["claims"]["sub"], json!("user-42"));
    assert_eq!(body["data"]["claims"]["tier"], json!("3"));
    assert_eq!(body["data"]["session_id"], json!(session.id.to_string()));
    Ok(())
}

#[tokio::test]
async fn inactive_session_is_401() -> Result<()> {
    let app = TestApp::new().await?;
    let (token, session) = app.login("user").await?;
    app.store
        .update(SessionUpdate { id: session.id, ip_address: None, is_active: Some(false) })
        .await?;

    let (status, body) = app
        .send(request("GET", "/v1/auth/whoami", Some(&token), Some(session.id)))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Session is not active"}));
    Ok(())
}

#[tokio::test]
async fn unknown_or_missing_session_is_401_invalid() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.token("user")?;

    for session in [None, Some(Uuid::new_v4())] {
        let (status, body) = app
            .send(request("GET", "/v1/auth/whoami", Some(&token), session))
            .await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "Session is invalid"}));
    }
    Ok(())
}

#[tokio::test]
async fn forged_token_downgrades_and_is_denied() -> Result<()> {
    let app = TestApp::new().await?;
    let session = app.live_session().await?;
    let forged = bizhub_api::auth::TokenIssuer::new("not-the-secret", chrono::Duration::hours(1))?
        .issue(serde_json::from_value(json!({"role": "admin"}))?)?;

    let (status, body) = app
        .send(request("GET", "/v1/session/list", Some(&forged), Some(session.id)))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"error": "access denied"}));

    // the downgraded caller still reaches what anonymous callers may reach
    let (status, _) = app
        .send(request("GET", "/healthz", Some(&forged), None))
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn expired_token_is_treated_as_anonymous() -> Result<()> {
    let app = TestApp::new().await?;
    let session = app.live_session().await?;
    let expired = app.token_with(json!({
        "role": "user",
        "exp": chrono::Utc::now().timestamp() - 3600,
    }))?;

    let (status, _) = app
        .send(request("GET", "/v1/auth/whoami", Some(&expired), Some(session.id)))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn admin_without_matching_rule_is_denied() -> Result<()> {
    let app = TestApp::new().await?;
    let (token, session) = app.login("admin").await?;

    let (status, body) = app
        .send(request("DELETE", "/v1/business", Some(&token), Some(session.id)))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"error": "access denied"}));
    Ok(())
}

#[tokio::test]
async fn user_cannot_reach_admin_routes() -> Result<()> {
    let app = TestApp::new().await?;
    let (token, session) = app.login("user").await?;

    let (status, _) = app
        .send(request("GET", "/v1/session/list", Some(&token), Some(session.id)))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn admin_inherits_user_routes() -> Result<()> {
    let app = TestApp::new().await?;
    let (token, session) = app.login("admin").await?;

    let (status, body) = app
        .send(request("GET", "/v1/auth/whoami", Some(&token), Some(session.id)))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], json!("admin"));
    Ok(())
}

#[tokio::test]
async fn logout_revokes_on_the_next_request() -> Result<()> {
    let app = TestApp::new().await?;
    let (token, session) = app.login("user").await?;

    let (status, body) = app
        .send(request("POST", "/v1/auth/logout", Some(&token), Some(session.id)))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], json!(false));

    let (status, body) = app
        .send(request("GET", "/v1/auth/whoami", Some(&token), Some(session.id)))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Session is not active"}));
    Ok(())
}

#[tokio::test]
async fn identical_requests_get_identical_outcomes() -> Result<()> {
    let app = TestApp::new().await?;
    let (token, session) = app.login("user").await?;

    for uri in ["/v1/auth/whoami", "/v1/session/list", "/nowhere"] {
        let first = app.send(request("GET", uri, Some(&token), Some(session.id))).await?;
        let second = app.send(request("GET", uri, Some(&token), Some(session.id))).await?;
        assert_eq!(first, second, "{}", uri);
    }
    Ok(())
}

#[tokio::test]
async fn unrouted_paths_are_denied_not_404() -> Result<()> {
    let app = TestApp::new().await?;

    let (status, body) = app.send(request("GET", "/v1/unknown", None, None)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"error": "access denied"}));
    Ok(())
}
