use std::env;
use std::time::Duration;

use anyhow::Context;

const DEFAULT_ADMIN_SECRET: &str = "changeme";
const DEFAULT_VOTE_PASSWORD: &str = "vote123";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub admin_secret: String,
    pub vote_password: String,
    pub request_timeout: Duration,
}

impl Config {
    /// Reads settings from the environment (after `.env` has been loaded).
    pub fn from_env() -> anyhow::Result<Self> {
        let request_timeout = parse_timeout(env::var("REQUEST_TIMEOUT_SECS").ok().as_deref())?;

        let config = Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://votes.db?mode=rwc".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            admin_secret: env::var("ADMIN_SECRET")
                .unwrap_or_else(|_| DEFAULT_ADMIN_SECRET.to_string()),
            vote_password: env::var("VOTE_PASSWORD")
                .unwrap_or_else(|_| DEFAULT_VOTE_PASSWORD.to_string()),
            request_timeout,
        };

        if config.admin_secret == DEFAULT_ADMIN_SECRET {
            tracing::warn!("ADMIN_SECRET not set, using the built-in default");
        }
        if config.vote_password == DEFAULT_VOTE_PASSWORD {
            tracing::warn!("VOTE_PASSWORD not set, using the built-in default");
        }

        Ok(config)
    }

    /// Settings for in-process tests.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            admin_secret: "test-secret".to_string(),
            vote_password: "test-password".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// A zero timeout would fail every request, so it is refused.
fn parse_timeout(raw: Option<&str>) -> anyhow::Result<Duration> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
    };

    let secs = raw
        .trim()
        .parse::<u64>()
        .context("REQUEST_TIMEOUT_SECS must be a whole number of seconds")?;
    anyhow::ensure!(secs > 0, "REQUEST_TIMEOUT_SECS must be at least 1 second");
    Ok(Duration::from_secs(secs))
}
