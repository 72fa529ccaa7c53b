//! Environment configuration
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file. Everything is validated once at startup.

use crate::completion::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::error::BankingError;
use crate::ledger::DEFAULT_LEDGER_PORT;
use crate::retry::RetryPolicy;
use crate::Result;
use std::str::FromStr;
use std::time::Duration;

pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `host:port` of the ledger gateway
    pub ledger_address: String,
    /// Postgres URL for the audit store; in-memory when absent
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub database_acquire_timeout: Duration,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,
    pub openrouter_base_url: String,
    pub completion_timeout: Duration,
    pub confirmation_secret: String,
    pub confirmation_ttl: Duration,
    pub confirmation_require_token: bool,
    pub resolve_policy: RetryPolicy,
    pub connect_policy: RetryPolicy,
}

impl AppConfig {
    /// Load from the environment after reading `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let ledger_address = match get("LEDGER_ADDRESS") {
            Some(address) => address,
            None => {
                let host = get("LEDGER_HOST").unwrap_or_else(|| "localhost".to_string());
                let port: u16 = parse_or(&get, "LEDGER_PORT", DEFAULT_LEDGER_PORT)?;
                format!("{}:{}", host, port)
            }
        };

        let confirmation_secret = get("CONFIRMATION_SECRET").ok_or_else(|| {
            BankingError::Config("CONFIRMATION_SECRET must be set".to_string())
        })?;
        if confirmation_secret.len() < MIN_SECRET_LEN {
            return Err(BankingError::Config(format!(
                "CONFIRMATION_SECRET must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }

        let database_max_connections: u32 = parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?;
        if database_max_connections == 0 {
            return Err(BankingError::Config(
                "DATABASE_MAX_CONNECTIONS must be positive".to_string(),
            ));
        }

        let resolve_policy = policy_from(&get, "LEDGER_RESOLVE", RetryPolicy::resolution())?;
        let connect_policy = policy_from(&get, "LEDGER_CONNECT", RetryPolicy::bootstrap())?;

        Ok(Self {
            ledger_address,
            database_url: get("DATABASE_URL").or_else(|| get("POSTGRES_URL")),
            database_max_connections,
            database_acquire_timeout: Duration::from_secs(parse_or(
                &get,
                "DATABASE_ACQUIRE_TIMEOUT_SECS",
                5,
            )?),
            openrouter_api_key: get("OPENROUTER_API_KEY"),
            openrouter_model: get("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openrouter_base_url: get("OPENROUTER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            completion_timeout: Duration::from_secs(parse_or(&get, "COMPLETION_TIMEOUT_SECS", 30)?),
            confirmation_secret,
            confirmation_ttl: Duration::from_secs(parse_or(&get, "CONFIRMATION_TTL_SECS", 300)?),
            confirmation_require_token: parse_bool(&get, "CONFIRMATION_REQUIRE_TOKEN", true)?,
            resolve_policy,
            connect_policy,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| BankingError::Config(format!("{} has an invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

/// `{prefix}_ATTEMPTS` and `{prefix}_DELAY_MS` override a preset.
fn policy_from<G>(get: &G, prefix: &str, preset: RetryPolicy) -> Result<RetryPolicy>
where
    G: Fn(&str) -> Option<String>,
{
    let attempts = parse_or(get, &format!("{}_ATTEMPTS", prefix), preset.max_attempts)?;
    let delay_ms = parse_or(
        get,
        &format!("{}_DELAY_MS", prefix),
        preset.initial_delay.as_millis() as u64,
    )?;

    Ok(RetryPolicy::new(attempts, Duration::from_millis(delay_ms))
        .with_multiplier(preset.multiplier)
        .with_max_delay(preset.max_delay))
}

fn parse_bool<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(BankingError::Config(format!(
            "{} has an invalid value '{}'",
            key, v
        ))),
    }
}
