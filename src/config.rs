use anyhow::{Context, Result, anyhow};
use std::env;
use std::num::NonZeroUsize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub api_prefix: String,
    pub cache_capacity: NonZeroUsize,
    pub stack_index: String,
    pub run_migrations: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            api_prefix: "/api/v2".to_string(),
            cache_capacity: crate::storage::memory::DEFAULT_CACHE_CAPACITY,
            stack_index: "stacks-v1".to_string(),
            run_migrations: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let host = lookup("APP_HOST").unwrap_or(defaults.host);

        let port = match lookup("APP_PORT") {
            Some(raw) => raw.trim().parse::<u16>().context("APP_PORT must be a valid u16")?,
            None => defaults.port,
        };

        let api_prefix = lookup("API_PREFIX").unwrap_or(defaults.api_prefix);

        let cache_capacity = match lookup("CACHE_CAPACITY") {
            Some(raw) => raw
                .trim()
                .parse::<NonZeroUsize>()
                .context("CACHE_CAPACITY must be a positive integer")?,
            None => defaults.cache_capacity,
        };

        let stack_index = lookup("STACK_INDEX").unwrap_or(defaults.stack_index);
        if stack_index.trim().is_empty() {
            return Err(anyhow!("STACK_INDEX must not be empty"));
        }

        let run_migrations = match lookup("RUN_MIGRATIONS") {
            Some(raw) => parse_bool(&raw).context("RUN_MIGRATIONS must be true or false")?,
            None => defaults.run_migrations,
        };

        Ok(Self {
            host,
            port,
            api_prefix,
            cache_capacity,
            stack_index,
            run_migrations,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("unrecognized boolean '{other}'")),
    }
}
