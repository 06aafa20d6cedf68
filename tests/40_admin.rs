mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{TestServer, PASSWORD};

#[tokio::test]
async fn admin_routes_reject_regular_users() -> Result<()> {
    let server = TestServer::start().await?;
    let (_, token) = server.user("ada@example.com", "Ada").await?;

    let res = server.get("/api/admin/users", &token).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Admin role required");

    let res = server.client.get(server.url("/api/admin/users")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn ban_blocks_sessions_and_login_until_unbanned() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token().await?;
    let (user_id, token) = server.user("ada@example.com", "Ada").await?;

    let res = server.get("/api/admin/users", &admin).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let users: Value = res.json().await?;
    assert_eq!(users.as_array().unwrap().len(), 2);

    let res = server
        .post(
            &format!("/api/admin/users/{}/ban", user_id),
            &admin,
            json!({ "reason": "spam", "expiresInDays": 7 }),
        )
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let user: Value = res.json().await?;
    assert_eq!(user["banned"], true);

    let res = server.get("/api/auth/whoami", &token).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "User is banned: spam");

    let res = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "ada@example.com", "password": PASSWORD }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server
        .post(&format!("/api/admin/users/{}/unban", user_id), &admin, json!({}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.get("/api/auth/whoami", &token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn ban_without_body_and_self_ban() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token().await?;
    let (user_id, _) = server.user("ada@example.com", "Ada").await?;

    let res = server
        .client
        .post(server.url(&format!("/api/admin/users/{}/ban", user_id)))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.get("/api/auth/whoami", &admin).send().await?;
    let me: Value = res.json().await?;
    let admin_id = me["user"]["id"].as_str().unwrap().to_string();

    let res = server
        .post(&format!("/api/admin/users/{}/ban", admin_id), &admin, json!({}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "You cannot ban yourself");
    Ok(())
}

#[tokio::test]
async fn ban_expiry_is_bounded() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token().await?;
    let (user_id, token) = server.user("ada@example.com", "Ada").await?;
    let ban_path = format!("/api/admin/users/{}/ban", user_id);

    for days in [3651i64, 9_000_000_000_000] {
        let started = std::time::Instant::now();
        let res = server.post(&ban_path, &admin, json!({ "expiresInDays": days })).send().await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        let body: Value = res.json().await?;
        assert_eq!(body["field_errors"]["expiresInDays"], "expiresInDays must be between 1 and 3650");
    }

    // Nothing was applied
    let res = server.get("/api/auth/whoami", &token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.post(&ban_path, &admin, json!({ "expiresInDays": 3650 })).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn roles_are_granted_and_validated() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.admin_token().await?;
    let (user_id, token) = server.user("ada@example.com", "Ada").await?;
    let role_path = format!("/api/admin/users/{}/role", user_id);

    let res = server.put(&role_path, &admin, json!({ "role": "superuser" })).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server.put(&role_path, &admin, json!({ "role": "admin" })).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let user: Value = res.json().await?;
    assert_eq!(user["role"], "admin");

    // The promoted user's existing session now passes the admin gate
    let res = server.get("/api/admin/users", &token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .put(&format!("/api/admin/users/{}/role", uuid::Uuid::new_v4()), &admin, json!({ "role": "user" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server.put("/api/admin/users/not-a-uuid/role", &admin, json!({ "role": "user" })).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
