use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use std::time::Duration;
use tracing::info;

use super::store::{CorrelationStore, StoreError};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS correlation_state (
        grp        TEXT        NOT NULL,
        key        TEXT        NOT NULL,
        value      JSONB       NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (grp, key)
    )
"#;

const UPSERT: &str = r#"
    INSERT INTO correlation_state (grp, key, value, updated_at)
    VALUES ($1, $2, $3, now())
    ON CONFLICT (grp, key)
    DO UPDATE SET value = EXCLUDED.value, updated_at = now()
"#;

const SELECT: &str = "SELECT value FROM correlation_state WHERE grp = $1 AND key = $2";

/// Postgres-backed store, shared by API and worker processes
#[derive(Clone)]
pub struct PgCorrelationStore {
    pool: PgPool,
}

impl PgCorrelationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the backing table exists
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(unavailable)?;

        let store = Self::new(pool);
        store.ensure_schema().await?;
        info!("Correlation store connected to postgres");
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    tracing::error!("Correlation store error: {}", err);
    StoreError::Unavailable(err.to_string())
}

#[async_trait]
impl CorrelationStore for PgCorrelationStore {
    async fn set(&self, group: &str, key: &str, value: Value) -> Result<(), StoreError> {
        sqlx::query(UPSERT)
            .bind(group)
            .bind(key)
            .bind(Json(value))
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn get(&self, group: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let row: Option<Json<Value>> = sqlx::query_scalar(SELECT)
            .bind(group)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(row.map(|Json(value)| value))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
