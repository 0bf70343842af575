//! Configuration module for club-service.

use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClubConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,
    /// Retries of the local holder/election write once the identity provider
    /// has already accepted the assignment.
    pub holder_commit_retries: u32,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Connection settings for the identity provider's admin API.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub base_url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout: Duration,
}

impl ClubConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "club-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: parsed_or("DATABASE_MIN_CONNECTIONS", 2),
            },
            identity: IdentityConfig {
                base_url: required("IDENTITY_BASE_URL")?
                    .trim_end_matches('/')
                    .to_string(),
                realm: env::var("IDENTITY_REALM").unwrap_or_else(|_| "club".to_string()),
                client_id: env::var("IDENTITY_CLIENT_ID")
                    .unwrap_or_else(|_| "club-service".to_string()),
                client_secret: env::var("IDENTITY_CLIENT_SECRET").unwrap_or_default(),
                timeout: Duration::from_secs(parsed_or("IDENTITY_TIMEOUT_SECS", 10)),
            },
            holder_commit_retries: parsed_or("HOLDER_COMMIT_RETRIES", 3),
        })
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::ConfigError(anyhow::anyhow!("{} is required", key)))
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
