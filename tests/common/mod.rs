#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::{json, Value};

use orgadmin_api::auth::InMemoryAuthProvider;
use orgadmin_api::bridge::{CorrelationStore, InMemoryCorrelationStore};
use orgadmin_api::config::AppConfig;
use orgadmin_api::state::AppState;
use orgadmin_api::testing::{chunk, fake_pipeline};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const PASSWORD: &str = "correct-horse";

pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
}

/// Config used by every test server: fast polling, short budgets
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.bridge.poll_interval_ms = 100;
    config.bridge.default_timeout_ms = 5_000;
    config.bridge.long_timeout_ms = 5_000;
    config
}

impl TestServer {
    /// Server with workers running, an admin seeded and fake document QA
    pub async fn start() -> Result<Self> {
        let config = test_config();
        let auth = InMemoryAuthProvider::new(
            config.security.jwt_secret.clone(),
            config.security.jwt_expiry_hours,
        );
        auth.seed_admin(ADMIN_EMAIL, "Admin", ADMIN_PASSWORD).await?;

        let store: Arc<dyn CorrelationStore> = Arc::new(InMemoryCorrelationStore::new());
        let rag = fake_pipeline(vec![
            chunk("Rust ownership moves values between bindings.", "rust.txt", 1),
            chunk("Borrowing lends access without moving.", "rust.txt", 2),
        ]);
        let (state, _workers) = AppState::start(config, store, Arc::new(auth), rag)?;
        Self::serve(state).await
    }

    /// Serve an already assembled state
    pub async fn serve(state: AppState) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;

        let app = orgadmin_api::app(state);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    pub fn post(&self, path: &str, token: &str, body: Value) -> RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token).json(&body)
    }

    pub fn patch(&self, path: &str, token: &str, body: Value) -> RequestBuilder {
        self.client.patch(self.url(path)).bearer_auth(token).json(&body)
    }

    pub fn put(&self, path: &str, token: &str, body: Value) -> RequestBuilder {
        self.client.put(self.url(path)).bearer_auth(token).json(&body)
    }

    pub fn delete(&self, path: &str, token: &str) -> RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }

    /// Register an account and return its user JSON
    pub async fn register(&self, email: &str, name: &str) -> Result<Value> {
        let res = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({ "email": email, "name": name, "password": PASSWORD }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "register failed: {}", res.status());
        let body: Value = res.json().await?;
        Ok(body["user"].clone())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let res = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
        let body: Value = res.json().await?;
        body["token"]
            .as_str()
            .map(str::to_string)
            .context("login response has no token")
    }

    /// Register and log in; returns (user id, token)
    pub async fn user(&self, email: &str, name: &str) -> Result<(String, String)> {
        let user = self.register(email, name).await?;
        let token = self.login(email, PASSWORD).await?;
        let id = user["id"].as_str().context("user has no id")?.to_string();
        Ok((id, token))
    }

    pub async fn admin_token(&self) -> Result<String> {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Create an organization and return its id
    pub async fn create_org(&self, token: &str, name: &str, slug: &str) -> Result<String> {
        let res = self
            .post("/api/organizations", token, json!({ "name": name, "slug": slug }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "create org failed: {}", res.status());
        let body: Value = res.json().await?;
        Ok(body["id"].as_str().context("organization has no id")?.to_string())
    }
}
