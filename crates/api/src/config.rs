//! Process configuration read from the environment.

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

const DEV_JWT_SECRET: &str = "dev-secret";
const DEV_FORM_SECRET: &str = "dev-form-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub form_token_secret: String,
    pub form_token_ttl: Duration,
    /// Accept negative quantities in manual stock changes.
    pub allow_negative_stock: bool,
    /// Postgres connection string; in-memory storage when unset.
    pub database_url: Option<String>,
}

impl AppConfig {
    /// Defaults for local runs and tests.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: jwt_secret.into(),
            form_token_secret: DEV_FORM_SECRET.to_string(),
            form_token_ttl: Duration::hours(1),
            allow_negative_stock: false,
            database_url: None,
        }
    }

    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });
        let mut config = Self::new(jwt_secret);

        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = addr.parse().map_err(|_| ConfigError::Invalid {
                name: "BIND_ADDR",
                value: addr.clone(),
            })?;
        }
        if let Some(secret) = get("FORM_TOKEN_SECRET") {
            config.form_token_secret = secret;
        } else {
            tracing::warn!("FORM_TOKEN_SECRET not set; using insecure dev default");
        }
        if let Some(ttl) = get("FORM_TOKEN_TTL_SECS") {
            let secs: i64 = ttl.parse().ok().filter(|s| *s > 0).ok_or(ConfigError::Invalid {
                name: "FORM_TOKEN_TTL_SECS",
                value: ttl.clone(),
            })?;
            config.form_token_ttl = Duration::seconds(secs);
        }
        if let Some(flag) = get("ALLOW_NEGATIVE_STOCK") {
            config.allow_negative_stock = parse_bool(&flag).ok_or(ConfigError::Invalid {
                name: "ALLOW_NEGATIVE_STOCK",
                value: flag.clone(),
            })?;
        }
        config.database_url = get("DATABASE_URL");

        Ok(config)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
