// conversation-memory/src/config.rs

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Path value that selects an ephemeral single-connection database.
pub const IN_MEMORY_PATH: &str = ":memory:";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
    pub connect_timeout_seconds: u64,
    pub session_ttl_seconds: u64,
    pub context_limit: usize,
    pub search_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/conversations.db"),
            pool_size: 10,
            busy_timeout_ms: 5000,
            connect_timeout_seconds: 10,
            session_ttl_seconds: 86_400,
            context_limit: 50,
            search_limit: 20,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any variable source; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = lookup("MEMORY_DB_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let config = Self {
            db_path,
            pool_size: parse_var(&lookup, "MEMORY_POOL_SIZE", defaults.pool_size)?,
            busy_timeout_ms: parse_var(&lookup, "MEMORY_BUSY_TIMEOUT_MS", defaults.busy_timeout_ms)?,
            connect_timeout_seconds: parse_var(
                &lookup,
                "MEMORY_CONNECT_TIMEOUT_SECONDS",
                defaults.connect_timeout_seconds,
            )?,
            session_ttl_seconds: parse_var(
                &lookup,
                "MEMORY_SESSION_TTL_SECONDS",
                defaults.session_ttl_seconds,
            )?,
            context_limit: parse_var(&lookup, "MEMORY_CONTEXT_LIMIT", defaults.context_limit)?,
            search_limit: parse_var(&lookup, "MEMORY_SEARCH_LIMIT", defaults.search_limit)?,
        };

        if config.pool_size == 0 {
            anyhow::bail!("MEMORY_POOL_SIZE must be at least 1");
        }

        Ok(config)
    }

    /// Ephemeral configuration used by tests and one-off tooling.
    pub fn in_memory() -> Self {
        Self {
            db_path: PathBuf::from(IN_MEMORY_PATH),
            pool_size: 1,
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path.as_os_str() == IN_MEMORY_PATH
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- Database Path: {}", self.db_path.display());
        info!("- Pool Size: {}", self.pool_size);
        info!("- Busy Timeout: {}ms", self.busy_timeout_ms);
        info!("- Connect Timeout: {}s", self.connect_timeout_seconds);
        info!("- Session TTL: {}s", self.session_ttl_seconds);
        info!("- Context Limit: {}", self.context_limit);
        info!("- Search Limit: {}", self.search_limit);
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    // ===== Defaults =====

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.db_path, PathBuf::from("data/conversations.db"));
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.session_ttl_seconds, 86_400);
        assert_eq!(config.context_limit, 50);
        assert_eq!(config.search_limit, 20);
    }

    #[test]
    fn test_session_ttl_is_one_day_by_default() {
        let config = Config::default();
        assert_eq!(config.session_ttl(), Duration::from_secs(24 * 60 * 60));
    }

    // ===== Overrides =====

    #[test]
    fn test_overrides_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("MEMORY_DB_PATH", "/tmp/memory.db"),
            ("MEMORY_POOL_SIZE", "4"),
            ("MEMORY_BUSY_TIMEOUT_MS", "250"),
            ("MEMORY_SESSION_TTL_SECONDS", "60"),
            ("MEMORY_CONTEXT_LIMIT", "25"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/memory.db"));
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.session_ttl(), Duration::from_secs(60));
        assert_eq!(config.context_limit, 25);
        assert_eq!(config.search_limit, 20);
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("MEMORY_DB_PATH", "  "),
            ("MEMORY_POOL_SIZE", ""),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("data/conversations.db"));
        assert_eq!(config.pool_size, 10);
    }

    // ===== Validation =====

    #[test]
    fn test_malformed_number_names_the_variable() {
        let err = Config::from_lookup(lookup_from(&[("MEMORY_SEARCH_LIMIT", "many")])).unwrap_err();
        assert!(err.to_string().contains("MEMORY_SEARCH_LIMIT"));
    }

    #[test]
    fn test_zero_pool_size_is_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("MEMORY_POOL_SIZE", "0")])).is_err());
    }

    #[test]
    fn test_in_memory_config() {
        let config = Config::in_memory();
        assert!(config.is_in_memory());
        assert_eq!(config.pool_size, 1);
        assert!(!Config::default().is_in_memory());
    }
}
