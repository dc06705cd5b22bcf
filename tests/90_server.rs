mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

use common::TestServer;

#[tokio::test]
async fn served_pipeline_end_to_end() -> Result<()> {
    let server = TestServer::spawn().await?;
    let client = reqwest::Client::new();
    let (token, session) = server.app.login("user").await?;

    let res = client
        .get(format!("{}/v1/auth/whoami", server.base_url))
        .bearer_auth(&token)
        .header("session_id", session.id.to_string())
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["role"], "user");

    let res = client
        .post(format!("{}/v1/auth/logout", server.base_url))
        .bearer_auth(&token)
        .header("session_id", session.id.to_string())
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/v1/auth/whoami", server.base_url))
        .bearer_auth(&token)
        .header("session_id", session.id.to_string())
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Session is not active");

    // Should be valid JSON even without credentials
    let res = client
        .get(format!("{}/v1/session/list", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let _body = res.json::<Value>().await?;
    Ok(())
}
