use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use orgadmin_api::auth::InMemoryAuthProvider;
use orgadmin_api::bridge::{CorrelationStore, InMemoryCorrelationStore, PgCorrelationStore};
use orgadmin_api::config::{AppConfig, StoreBackend};
use orgadmin_api::rag::RagPipeline;
use orgadmin_api::state::AppState;

/// Organization admin API server
#[derive(Debug, Parser)]
#[command(name = "orgadmin-api", version, about)]
struct Args {
    /// Address to bind
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port to bind
    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("orgadmin_api=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let mut config: AppConfig = orgadmin_api::config::config().clone();
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    tracing::info!("Starting orgadmin-api in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let store = open_store(&config).await?;

    let auth = InMemoryAuthProvider::new(
        config.security.jwt_secret.clone(),
        config.security.jwt_expiry_hours,
    );
    if let (Some(email), Some(password)) = (
        config.security.bootstrap_admin_email.as_deref(),
        config.security.bootstrap_admin_password.as_deref(),
    ) {
        let admin = auth
            .seed_admin(email, "Administrator", password)
            .await
            .context("failed to seed bootstrap admin")?;
        tracing::info!("Bootstrap admin ready: {}", admin.email);
    }

    let rag = RagPipeline::from_config(&config.rag);
    let bind_addr = format!("{}:{}", config.api.host, config.api.port);

    let (state, _workers) =
        AppState::start(config, store, Arc::new(auth), rag).context("failed to register workers")?;
    let app = orgadmin_api::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn CorrelationStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory correlation store");
            Ok(Arc::new(InMemoryCorrelationStore::new()))
        }
        StoreBackend::Postgres => {
            let url = config
                .store
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres correlation store")?;
            let store = PgCorrelationStore::connect(
                url,
                config.store.max_connections,
                Duration::from_secs(config.store.connection_timeout),
            )
            .await
            .context("failed to connect correlation store")?;
            Ok(Arc::new(store))
        }
    }
}
