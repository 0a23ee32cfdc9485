use std::env;

use crate::error::SignalGraphError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Record store
    pub database_url: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Inference relay
    pub relay_jwt_secret: String,
    pub relay_upstream_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, SignalGraphError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup. `from_env` delegates here;
    /// tests pass a map instead of mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SignalGraphError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let web_port = match lookup("WEB_PORT") {
            Some(raw) => raw.parse().map_err(|_| {
                SignalGraphError::Config(format!("WEB_PORT must be a number, got {raw:?}"))
            })?,
            None => 3000,
        };

        Ok(Self {
            database_url: required(&lookup, "DATABASE_URL")?,
            web_host: lookup("WEB_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            web_port,
            relay_jwt_secret: required(&lookup, "RELAY_JWT_SECRET")?,
            relay_upstream_url: lookup("RELAY_UPSTREAM_URL").filter(|url| !url.trim().is_empty()),
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, SignalGraphError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SignalGraphError::Config(format!("{key} environment variable is required")))
}
