//! Process configuration, read from the environment (and `.env` via dotenvy).

use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_expiry_days: i64,
    pub nats_url: Option<String>,
    pub notify_subject_prefix: String,
    pub default_country: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: parse_or("PORT", 5000)?,
            database_url: optional("DATABASE_URL"),
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            jwt_secret: optional("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            jwt_expiry_days: parse_or("JWT_EXPIRY_DAYS", 30)?,
            nats_url: optional("NATS_URL"),
            notify_subject_prefix: optional("NOTIFY_SUBJECT_PREFIX").unwrap_or_else(|| "marketplace.notify".to_string()),
            default_country: optional("DEFAULT_COUNTRY").unwrap_or_else(|| "Ethiopia".to_string()),
        })
    }

    /// Settings for tests and local runs: in-memory store, no NATS.
    pub fn local(jwt_secret: impl Into<String>) -> Self {
        Self {
            port: 5000,
            database_url: None,
            database_max_connections: 10,
            jwt_secret: jwt_secret.into(),
            jwt_expiry_days: 30,
            nats_url: None,
            notify_subject_prefix: "marketplace.notify".to_string(),
            default_country: "Ethiopia".to_string(),
        }
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}
