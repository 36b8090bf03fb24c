use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// PEM-encoded RSA public key used to verify bearer tokens.
    pub public_key_pem: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("failed to read public key file {path}: {source}")]
    PublicKeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?;
        let public_key_pem = load_public_key()?;

        let config = Self {
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig::defaults(&environment, url),
            security: SecurityConfig { public_key_pem },
            environment,
        };

        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env::var("PROTOCOL_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        self
    }
}

impl DatabaseConfig {
    fn defaults(environment: &Environment, url: String) -> Self {
        match environment {
            Environment::Development => Self {
                url,
                max_connections: 10,
                connection_timeout: 30,
            },
            Environment::Staging => Self {
                url,
                max_connections: 20,
                connection_timeout: 10,
            },
            Environment::Production => Self {
                url,
                max_connections: 50,
                connection_timeout: 5,
            },
        }
    }
}

/// The verification key is required at startup: either the PEM itself in
/// PUBLIC_KEY, or a path to it in PUBLIC_KEY_FILE.
fn load_public_key() -> Result<String, ConfigError> {
    if let Ok(pem) = env::var("PUBLIC_KEY") {
        return Ok(pem);
    }
    let path = env::var("PUBLIC_KEY_FILE")
        .map_err(|_| ConfigError::MissingVar("PUBLIC_KEY or PUBLIC_KEY_FILE"))?;
    std::fs::read_to_string(&path).map_err(|source| ConfigError::PublicKeyFile { path, source })
}

// Global singleton config - initialized once at startup
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

pub fn init() -> Result<&'static AppConfig, ConfigError> {
    CONFIG.get_or_try_init(AppConfig::from_env)
}

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    CONFIG.get().expect("configuration accessed before init")
}
