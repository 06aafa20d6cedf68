mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{TestServer, PASSWORD};

#[tokio::test]
async fn health_and_descriptor_respond() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");

    let res = server.client.get(server.url("/")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert!(body["endpoints"]["organizations"].is_string());
    Ok(())
}

#[tokio::test]
async fn register_login_and_whoami() -> Result<()> {
    let server = TestServer::start().await?;

    let user = server.register("ada@example.com", "Ada").await?;
    assert_eq!(user["email"], "ada@example.com");
    assert_eq!(user["role"], "user");
    assert!(user.get("password").is_none());

    let res = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "ada@example.com", "password": PASSWORD }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let token = body["token"].as_str().unwrap().to_string();
    assert!(body["expires_in"].as_i64().unwrap() > 0);

    let res = server.get("/api/auth/whoami", &token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["user"]["id"], user["id"]);
    Ok(())
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() -> Result<()> {
    let server = TestServer::start().await?;
    server.register("ada@example.com", "Ada").await?;

    let res = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "ada@example.com", "password": "wrong-password" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Invalid email or password");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_session() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.client.get(server.url("/api/organizations")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server.get("/api/organizations", "not-a-token").send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Invalid or expired session");
    Ok(())
}

#[tokio::test]
async fn registration_is_validated() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "email": "nope", "name": "", "password": "short" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["field_errors"]["email"].is_string());
    assert!(body["field_errors"]["name"].is_string());
    assert!(body["field_errors"]["password"].is_string());

    server.register("ada@example.com", "Ada").await?;
    let res = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "email": "ada@example.com", "name": "Ada", "password": PASSWORD }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_rejected() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .client
        .post(server.url("/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "INVALID_JSON");
    Ok(())
}
