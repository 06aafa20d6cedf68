mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::TestServer;

#[tokio::test]
async fn members_are_added_promoted_and_removed() -> Result<()> {
    let server = TestServer::start().await?;
    let (owner_id, owner) = server.user("owner@example.com", "Owner").await?;
    let (bob_id, bob) = server.user("bob@example.com", "Bob").await?;
    let org_id = server.create_org(&owner, "Acme", "acme").await?;
    let members = format!("/api/organizations/{}/members", org_id);

    let res = server.post(&members, &owner, json!({ "userId": bob_id })).send().await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let membership: Value = res.json().await?;
    assert_eq!(membership["role"], "member");

    let res = server.post(&members, &owner, json!({ "userId": bob_id })).send().await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Plain members cannot manage others
    let res = server
        .patch(&format!("{}/{}", members, owner_id), &bob, json!({ "role": "member" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server
        .patch(&format!("{}/{}", members, bob_id), &owner, json!({ "role": "admin" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let membership: Value = res.json().await?;
    assert_eq!(membership["role"], "admin");

    let res = server.delete(&format!("{}/{}", members, owner_id), &bob).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server.delete(&format!("{}/{}", members, bob_id), &owner).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.get(&format!("/api/organizations/{}", org_id), &bob).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn member_input_is_validated() -> Result<()> {
    let server = TestServer::start().await?;
    let (_, owner) = server.user("owner@example.com", "Owner").await?;
    let org_id = server.create_org(&owner, "Acme", "acme").await?;
    let members = format!("/api/organizations/{}/members", org_id);

    let res = server.post(&members, &owner, json!({ "userId": "not-a-uuid" })).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert!(body["field_errors"]["userId"].is_string());

    let res = server
        .post(&members, &owner, json!({ "userId": uuid::Uuid::new_v4(), "role": "owner" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server.post(&members, &owner, json!({ "userId": uuid::Uuid::new_v4() })).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "User not found");

    let res = server.delete(&format!("{}/garbage", members), &owner).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn invitation_lifecycle() -> Result<()> {
    let server = TestServer::start().await?;
    let (_, owner) = server.user("owner@example.com", "Owner").await?;
    let (dev_id, dev) = server.user("dev@example.com", "Dev").await?;
    let (_, eve) = server.user("eve@example.com", "Eve").await?;
    let org_id = server.create_org(&owner, "Acme", "acme").await?;
    let invitations = format!("/api/organizations/{}/invitations", org_id);

    let res = server
        .post(&invitations, &owner, json!({ "email": "Dev@Example.com", "role": "admin" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let invitation: Value = res.json().await?;
    let invitation_id = invitation["id"].as_str().unwrap().to_string();
    assert!(invitation_id.starts_with("inv_"));
    assert_eq!(invitation["status"], "pending");

    let res = server
        .post(&invitations, &owner, json!({ "email": "dev@example.com" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = server.get(&invitations, &owner).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let list: Value = res.json().await?;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let accept = format!("/api/invitations/{}/accept", invitation_id);
    let res = server.post(&accept, &eve, json!({})).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server.post(&accept, &dev, json!({})).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let membership: Value = res.json().await?;
    assert_eq!(membership["userId"], dev_id);
    assert_eq!(membership["role"], "admin");

    let res = server.post(&accept, &dev, json!({})).send().await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = server
        .delete(&format!("{}/{}", invitations, invitation_id), &owner)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn cancelled_invitations_cannot_be_accepted() -> Result<()> {
    let server = TestServer::start().await?;
    let (_, owner) = server.user("owner@example.com", "Owner").await?;
    let (_, dev) = server.user("dev@example.com", "Dev").await?;
    let org_id = server.create_org(&owner, "Acme", "acme").await?;
    let invitations = format!("/api/organizations/{}/invitations", org_id);

    let res = server
        .post(&invitations, &owner, json!({ "email": "dev@example.com" }))
        .send()
        .await?;
    let invitation: Value = res.json().await?;
    let invitation_id = invitation["id"].as_str().unwrap().to_string();

    let res = server.get(&invitations, &dev).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server
        .delete(&format!("{}/{}", invitations, invitation_id), &owner)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let cancelled: Value = res.json().await?;
    assert_eq!(cancelled["status"], "cancelled");

    let res = server
        .post(&format!("/api/invitations/{}/accept", invitation_id), &dev, json!({}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Invitation is already cancelled");
    Ok(())
}
