use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::quiz::DEFAULT_RESET_DELAY;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { url: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreBackend,
    pub port: u16,
    pub quiz_reset_delay: Duration,
}

impl Config {
    /// Reads the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let store = match get("STORE").as_deref().unwrap_or("postgres") {
            "postgres" => match get("DATABASE_URL") {
                Some(url) => StoreBackend::Postgres { url },
                None => bail!("DATABASE_URL not set"),
            },
            "memory" => StoreBackend::Memory,
            other => bail!("STORE must be `postgres` or `memory`, got `{other}`"),
        };
        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got `{raw}`"))?,
            None => 8081,
        };
        let quiz_reset_delay = match get("QUIZ_RESET_DELAY_MS") {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_millis)
                .with_context(|| format!("QUIZ_RESET_DELAY_MS must be milliseconds, got `{raw}`"))?,
            None => DEFAULT_RESET_DELAY,
        };
        Ok(Self {
            store,
            port,
            quiz_reset_delay,
        })
    }
}
