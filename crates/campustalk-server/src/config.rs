use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub session_ttl: chrono::Duration,
    pub store_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = lookup("CAMPUSTALK_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CAMPUSTALK_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let host = var("CAMPUSTALK_HOST", "0.0.0.0");
        let port: u16 = var("CAMPUSTALK_PORT", "3000")
            .parse()
            .context("CAMPUSTALK_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let ttl_hours: i64 = var("CAMPUSTALK_SESSION_TTL_HOURS", "24")
            .parse()
            .context("CAMPUSTALK_SESSION_TTL_HOURS must be a whole number of hours")?;
        if ttl_hours <= 0 {
            bail!("CAMPUSTALK_SESSION_TTL_HOURS must be positive");
        }

        let timeout_ms: u64 = var("CAMPUSTALK_STORE_TIMEOUT_MS", "5000")
            .parse()
            .context("CAMPUSTALK_STORE_TIMEOUT_MS must be a number of milliseconds")?;

        Ok(Self {
            addr,
            db_path: var("CAMPUSTALK_DB_PATH", "campustalk.db").into(),
            jwt_secret,
            session_ttl: chrono::Duration::hours(ttl_hours),
            store_timeout: Duration::from_millis(timeout_ms),
        })
    }
}
