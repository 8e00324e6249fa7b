use std::{fmt::Display, str::FromStr, time::Duration};

use anyhow::{Context, anyhow};
use tracing::info;

pub const DEV_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_FRONTEND_URL: &str = "https://talkuu.vercel.app";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Origin the browser client is served from, used for CORS.
    pub allowed_origin: String,
    /// Upper bound on a single persistence or enrichment call.
    pub store_timeout: Duration,
    pub max_db_connections: u32,
}

impl Config {
    /// Reads the process environment, falling back to a `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = var("DATABASE_URL")
            .filter(|url| !url.is_empty())
            .ok_or(anyhow!("DATABASE_URL is not set, define it in .env and restart"))?;

        let allowed_origin = if var("APP_ENV").as_deref() == Some("production") {
            var("FRONTEND_URL").unwrap_or(DEFAULT_FRONTEND_URL.to_owned())
        } else {
            DEV_ORIGIN.to_owned()
        };

        Ok(Self {
            database_url,
            port: parse_or(&var, "PORT", 5000)?,
            allowed_origin,
            store_timeout: Duration::from_millis(parse_or(&var, "STORE_TIMEOUT_MS", 5000)?),
            max_db_connections: parse_or(&var, "DB_MAX_CONNECTIONS", 10)?,
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key} value {raw:?}")),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
