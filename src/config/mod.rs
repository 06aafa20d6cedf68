use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::bridge::BridgeOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub bridge: BridgeConfig,
    pub store: StoreConfig,
    pub security: SecurityConfig,
    pub rag: RagConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub poll_interval_ms: u64,
    pub default_timeout_ms: u64,
    pub long_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub bootstrap_admin_email: Option<String>,
    #[serde(skip_serializing)]
    pub bootstrap_admin_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(skip_serializing)]
    pub jina_api_key: Option<String>,
    pub jina_embeddings_url: String,
    pub jina_embeddings_model: String,
    pub jina_rerank_url: String,
    pub jina_rerank_model: String,
    pub weaviate_url: Option<String>,
    #[serde(skip_serializing)]
    pub weaviate_api_key: Option<String>,
    pub weaviate_collection: String,
    #[serde(skip_serializing)]
    pub groq_api_key: Option<String>,
    pub groq_url: String,
    pub groq_model: String,
    pub documents_root: String,
    pub default_limit: usize,
    pub embedding_batch_size: usize,
    pub max_chunk_chars: usize,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // API overrides
        if let Ok(v) = env::var("HOST") {
            self.api.host = v;
        }
        if let Ok(v) = env::var("PORT") {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Bridge overrides
        if let Ok(v) = env::var("BRIDGE_POLL_INTERVAL_MS") {
            self.bridge.poll_interval_ms = v.parse().unwrap_or(self.bridge.poll_interval_ms);
        }
        if let Ok(v) = env::var("BRIDGE_DEFAULT_TIMEOUT_MS") {
            self.bridge.default_timeout_ms = v.parse().unwrap_or(self.bridge.default_timeout_ms);
        }
        if let Ok(v) = env::var("BRIDGE_LONG_TIMEOUT_MS") {
            self.bridge.long_timeout_ms = v.parse().unwrap_or(self.bridge.long_timeout_ms);
        }

        // Store overrides
        if let Ok(v) = env::var("CORRELATION_STORE") {
            self.store.backend = match v.as_str() {
                "postgres" | "pg" => StoreBackend::Postgres,
                "memory" => StoreBackend::Memory,
                _ => self.store.backend,
            };
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.store.database_url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.store.max_connections = v.parse().unwrap_or(self.store.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.store.connection_timeout = v.parse().unwrap_or(self.store.connection_timeout);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("BOOTSTRAP_ADMIN_EMAIL") {
            self.security.bootstrap_admin_email = Some(v);
        }
        if let Ok(v) = env::var("BOOTSTRAP_ADMIN_PASSWORD") {
            self.security.bootstrap_admin_password = Some(v);
        }

        // Document QA overrides
        if let Ok(v) = env::var("JINA_API_KEY") {
            self.rag.jina_api_key = Some(v);
        }
        if let Ok(v) = env::var("JINA_EMBEDDINGS_MODEL") {
            self.rag.jina_embeddings_model = v;
        }
        if let Ok(v) = env::var("JINA_RERANK_MODEL") {
            self.rag.jina_rerank_model = v;
        }
        if let Ok(v) = env::var("WEAVIATE_URL") {
            self.rag.weaviate_url = Some(v);
        }
        if let Ok(v) = env::var("WEAVIATE_API_KEY") {
            self.rag.weaviate_api_key = Some(v);
        }
        if let Ok(v) = env::var("WEAVIATE_COLLECTION") {
            self.rag.weaviate_collection = v;
        }
        if let Ok(v) = env::var("GROQ_API_KEY") {
            self.rag.groq_api_key = Some(v);
        }
        if let Ok(v) = env::var("GROQ_MODEL") {
            self.rag.groq_model = v;
        }
        if let Ok(v) = env::var("RAG_DOCUMENTS_ROOT") {
            self.rag.documents_root = v;
        }
        if let Ok(v) = env::var("RAG_DEFAULT_LIMIT") {
            self.rag.default_limit = v.parse().unwrap_or(self.rag.default_limit);
        }
        if let Ok(v) = env::var("RAG_MAX_CHUNK_CHARS") {
            self.rag.max_chunk_chars = v.parse().unwrap_or(self.rag.max_chunk_chars);
        }

        self
    }

    /// Bridge timing as used by handlers, with the poll interval kept in 100..=500 ms
    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            poll_interval: Duration::from_millis(self.bridge.poll_interval_ms.clamp(100, 500)),
            default_timeout: Duration::from_millis(self.bridge.default_timeout_ms),
            long_timeout: Duration::from_millis(self.bridge.long_timeout_ms),
        }
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            bridge: BridgeConfig {
                poll_interval_ms: 250,
                default_timeout_ms: 10_000,
                long_timeout_ms: 60_000,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                database_url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                jwt_secret: "development-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                bootstrap_admin_email: None,
                bootstrap_admin_password: None,
            },
            rag: RagConfig::defaults(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            bridge: BridgeConfig {
                poll_interval_ms: 250,
                default_timeout_ms: 10_000,
                long_timeout_ms: 60_000,
            },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                bootstrap_admin_email: None,
                bootstrap_admin_password: None,
            },
            rag: RagConfig::defaults(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            bridge: BridgeConfig {
                poll_interval_ms: 250,
                default_timeout_ms: 10_000,
                long_timeout_ms: 60_000,
            },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                bootstrap_admin_email: None,
                bootstrap_admin_password: None,
            },
            rag: RagConfig::defaults(),
        }
    }
}

impl RagConfig {
    fn defaults() -> Self {
        Self {
            jina_api_key: None,
            jina_embeddings_url: "https://api.jina.ai/v1/embeddings".to_string(),
            jina_embeddings_model: "jina-embeddings-v4".to_string(),
            jina_rerank_url: "https://api.jina.ai/v1/rerank".to_string(),
            jina_rerank_model: "jina-reranker-v3".to_string(),
            weaviate_url: None,
            weaviate_api_key: None,
            weaviate_collection: "Books".to_string(),
            groq_api_key: None,
            groq_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            groq_model: "llama-4-maverick-17b-128e-instruct".to_string(),
            documents_root: "./documents".to_string(),
            default_limit: 5,
            embedding_batch_size: 100,
            max_chunk_chars: 1500,
            request_timeout_secs: 30,
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(!config.security.jwt_secret.is_empty());
        assert_eq!(config.rag.default_limit, 5);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert!(config.security.jwt_secret.is_empty());
        assert!(!config.api.enable_request_logging);
    }

    #[test]
    fn test_bridge_options_from_config() {
        let mut config = AppConfig::development();
        let options = config.bridge_options();
        assert_eq!(options.poll_interval, Duration::from_millis(250));
        assert_eq!(options.default_timeout, Duration::from_secs(10));
        assert_eq!(options.long_timeout, Duration::from_secs(60));

        config.bridge.poll_interval_ms = 5;
        assert_eq!(config.bridge_options().poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut config = AppConfig::development();
        config.rag.groq_api_key = Some("gsk_live".to_string());
        let value = serde_json::to_value(&config).unwrap();
        assert!(value["security"].get("jwt_secret").is_none());
        assert!(value["rag"].get("groq_api_key").is_none());
    }
}
