//! API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Interface to bind
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// SQLite database file
    pub database_path: String,

    /// Pool size
    pub database_max_connections: u32,

    /// JWT secret key for signing tokens
    pub jwt_secret: String,

    /// JWT token lifetime in seconds
    pub jwt_lifetime_secs: i64,

    /// Endpoint of the recommendation service
    pub recommendation_url: String,

    /// Recommendation request timeout in seconds
    pub recommendation_timeout_secs: u64,

    /// Allowed CORS origin; any origin when unset
    pub cors_allowed_origin: Option<String>,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ApiConfig {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("API_PORT".to_string()))?,

            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "./libreria.db".to_string()),

            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS".to_string()))?,

            jwt_secret: env::var("JWT_SECRET")
                // In production, this MUST be set via environment variable
                .unwrap_or_else(|_| "libreria-dev-secret-change-in-production".to_string()),

            jwt_lifetime_secs: env::var("JWT_LIFETIME_SECS")
                .unwrap_or_else(|_| "86400".to_string()) // 1 day
                .parse()
                .map_err(|_| ConfigError::InvalidValue("JWT_LIFETIME_SECS".to_string()))?,

            recommendation_url: env::var("RECOMMENDATION_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:5000/recommend".to_string()),

            recommendation_timeout_secs: env::var("RECOMMENDATION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RECOMMENDATION_TIMEOUT_SECS".to_string()))?,

            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN").ok().filter(|s| !s.is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if self.jwt_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("JWT_LIFETIME_SECS".to_string()));
        }
        if self.database_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS".to_string()));
        }
        if let Some(origin) = &self.cors_allowed_origin {
            origin
                .parse::<HeaderValue>()
                .map_err(|_| ConfigError::InvalidValue("CORS_ALLOWED_ORIGIN".to_string()))?;
        }
        Ok(())
    }

    /// Address the server listens on.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("API_HOST".to_string()))
    }

    pub fn recommendation_timeout(&self) -> Duration {
        Duration::from_secs(self.recommendation_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            database_path: "./libreria.db".to_string(),
            database_max_connections: 5,
            jwt_secret: "libreria-dev-secret-change-in-production".to_string(),
            jwt_lifetime_secs: 86_400,
            recommendation_url: "http://localhost:5000/recommend".to_string(),
            recommendation_timeout_secs: 5,
            cors_allowed_origin: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
