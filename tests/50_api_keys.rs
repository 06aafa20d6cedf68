mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::TestServer;

#[tokio::test]
async fn secret_is_returned_once() -> Result<()> {
    let server = TestServer::start().await?;
    let (owner_id, token) = server.user("ada@example.com", "Ada").await?;

    let res = server
        .post("/api/api-keys", &token, json!({ "name": "ci", "expiresInDays": 30 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let issued: Value = res.json().await?;
    let secret = issued["secret"].as_str().unwrap();
    assert!(secret.starts_with("oak_"));
    assert_eq!(issued["prefix"].as_str().unwrap(), &secret[..12]);
    assert_eq!(issued["ownerId"], owner_id);
    assert!(issued["expiresAt"].is_string());

    let res = server.get("/api/api-keys", &token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let keys: Value = res.json().await?;
    assert_eq!(keys.as_array().unwrap().len(), 1);
    assert!(keys[0].get("secret").is_none());
    assert!(keys[0].get("digest").is_none());
    Ok(())
}

#[tokio::test]
async fn keys_are_revocable_by_their_owner_only() -> Result<()> {
    let server = TestServer::start().await?;
    let (_, owner) = server.user("ada@example.com", "Ada").await?;
    let (_, other) = server.user("bob@example.com", "Bob").await?;

    let res = server.post("/api/api-keys", &owner, json!({ "name": "deploy" })).send().await?;
    let issued: Value = res.json().await?;
    let path = format!("/api/api-keys/{}", issued["id"].as_str().unwrap());

    let res = server.delete(&path, &other).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server.delete(&path, &owner).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let key: Value = res.json().await?;
    assert!(key["revokedAt"].is_string());

    let res = server.delete(&path, &owner).send().await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn key_input_is_validated() -> Result<()> {
    let server = TestServer::start().await?;
    let (_, token) = server.user("ada@example.com", "Ada").await?;

    let res = server
        .post("/api/api-keys", &token, json!({ "name": "", "expiresInDays": 0 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert!(body["field_errors"]["name"].is_string());
    assert!(body["field_errors"]["expiresInDays"].is_string());
    Ok(())
}

#[tokio::test]
async fn key_expiry_is_bounded() -> Result<()> {
    let server = TestServer::start().await?;
    let (_, token) = server.user("ada@example.com", "Ada").await?;

    let res = server
        .post("/api/api-keys", &token, json!({ "name": "ci", "expiresInDays": 9_000_000_000_000i64 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["field_errors"]["expiresInDays"], "expiresInDays must be between 1 and 3650");

    let res = server.get("/api/api-keys", &token).send().await?;
    let keys: Value = res.json().await?;
    assert!(keys.as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn live_keys_authenticate_as_their_owner() -> Result<()> {
    let server = TestServer::start().await?;
    let (owner_id, token) = server.user("ada@example.com", "Ada").await?;

    let res = server.post("/api/api-keys", &token, json!({ "name": "cli" })).send().await?;
    let issued: Value = res.json().await?;
    let secret = issued["secret"].as_str().unwrap().to_string();

    let res = server.get("/api/auth/whoami", &secret).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["user"]["id"], owner_id);

    let res = server
        .delete(&format!("/api/api-keys/{}", issued["id"].as_str().unwrap()), &token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.get("/api/auth/whoami", &secret).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Invalid or revoked API key");
    Ok(())
}
