//! Runtime configuration

use crate::alias::PathRuleSpec;
use crate::cache::CacheConfig;
use crate::error::{PublError, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Publishing core configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PublConfig {
    /// PostgreSQL connection string; the in-memory store is used when unset
    pub database_url: Option<String>,

    /// User list file
    pub user_list: PathBuf,

    /// Group whose members may see every entry
    pub admin_group: Option<String>,

    /// Memoization lifetime in seconds
    pub cache_ttl: u64,

    /// Memoization capacity per cache
    pub cache_capacity: usize,

    /// Token signing secret
    pub secret_key: Option<String>,

    /// Bearer token lifetime in seconds
    pub token_lifetime: u64,

    /// Auth ticket lifetime in seconds
    pub ticket_lifetime: u64,

    /// HTTP port
    pub port: u16,

    /// Regex redirect rules consulted for unaliased paths
    pub path_rules: Vec<PathRuleSpec>,
}

impl Default for PublConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            user_list: PathBuf::from("users.cfg"),
            admin_group: None,
            cache_ttl: 60,
            cache_capacity: 10_000,
            secret_key: None,
            token_lifetime: 3600,
            ticket_lifetime: 60,
            port: 8080,
            path_rules: Vec::new(),
        }
    }
}

impl PublConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from `(name, value)` pairs.
    ///
    /// Recognized names are `PUBL_DATABASE_URL` (or `DATABASE_URL`),
    /// `PUBL_USER_LIST`, `PUBL_ADMIN_GROUP`, `PUBL_CACHE_TTL`,
    /// `PUBL_CACHE_CAPACITY`, `PUBL_SECRET_KEY`, `PUBL_TOKEN_LIFETIME`,
    /// `PUBL_TICKET_LIFETIME`, `PORT` and `PUBL_PATH_RULES` (a JSON array of
    /// `{pattern, target, permanent}`). Anything else is ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::default();
        let mut fallback_database_url = None;

        for (name, value) in vars {
            let value: String = value.into();
            match name.as_ref() {
                "PUBL_DATABASE_URL" => config.database_url = non_empty(value),
                "DATABASE_URL" => fallback_database_url = non_empty(value),
                "PUBL_USER_LIST" => config.user_list = PathBuf::from(value),
                "PUBL_ADMIN_GROUP" => config.admin_group = non_empty(value),
                "PUBL_CACHE_TTL" => config.cache_ttl = parse_number("PUBL_CACHE_TTL", &value)?,
                "PUBL_CACHE_CAPACITY" => {
                    config.cache_capacity = parse_number("PUBL_CACHE_CAPACITY", &value)?
                }
                "PUBL_SECRET_KEY" => config.secret_key = non_empty(value),
                "PUBL_TOKEN_LIFETIME" => {
                    config.token_lifetime = parse_number("PUBL_TOKEN_LIFETIME", &value)?
                }
                "PUBL_TICKET_LIFETIME" => {
                    config.ticket_lifetime = parse_number("PUBL_TICKET_LIFETIME", &value)?
                }
                "PORT" => config.port = parse_number("PORT", &value)?,
                "PUBL_PATH_RULES" => {
                    config.path_rules = serde_json::from_str(&value).map_err(|e| {
                        PublError::Config(format!("PUBL_PATH_RULES is not valid JSON: {}", e))
                    })?
                }
                _ => {}
            }
        }

        if config.database_url.is_none() {
            config.database_url = fallback_database_url;
        }
        if config.cache_capacity == 0 {
            return Err(PublError::Config(
                "PUBL_CACHE_CAPACITY must be positive".to_string(),
            ));
        }

        Ok(config)
    }

    /// Memoization settings
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            capacity: self.cache_capacity,
            ttl: Duration::from_secs(self.cache_ttl),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PublError::Config(format!("{} must be a number, got '{}'", name, value)))
}
