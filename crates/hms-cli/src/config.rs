//! # CLI Configuration
//!
//! Settings come from an optional YAML file, then environment variables,
//! later sources overriding earlier ones:
//!
//! ```yaml
//! database_url: postgres://hms@localhost/hms
//! lock_timeout_ms: 2000
//! max_connections: 4
//! acquire_timeout_ms: 5000
//! ```
//!
//! | Variable              | Field              |
//! |-----------------------|--------------------|
//! | `HMS_DATABASE_URL`    | `database_url`     |
//! | `DATABASE_URL`        | `database_url` (only if `HMS_DATABASE_URL` is unset) |
//! | `HMS_LOCK_TIMEOUT_MS` | `lock_timeout_ms`  |
//! | `HMS_MAX_CONNECTIONS` | `max_connections`  |

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use hms_store::StoreConfig;
use serde::Deserialize;

/// Resolved CLI settings.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub database_url: Option<String>,
    pub lock_timeout_ms: Option<u64>,
    pub max_connections: Option<u32>,
    pub acquire_timeout_ms: Option<u64>,
}

impl std::fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliConfig")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("lock_timeout_ms", &self.lock_timeout_ms)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_ms", &self.acquire_timeout_ms)
            .finish()
    }
}

impl CliConfig {
    /// Read the YAML file at `path`, if any, then apply the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Override fields from environment variables looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = var("HMS_DATABASE_URL").or_else(|| var("DATABASE_URL")) {
            self.database_url = Some(url);
        }
        if let Some(raw) = var("HMS_LOCK_TIMEOUT_MS") {
            self.lock_timeout_ms = Some(parse_var("HMS_LOCK_TIMEOUT_MS", &raw)?);
        }
        if let Some(raw) = var("HMS_MAX_CONNECTIONS") {
            self.max_connections = Some(parse_var("HMS_MAX_CONNECTIONS", &raw)?);
        }
        Ok(())
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url.as_deref().context(
            "no database configured: set HMS_DATABASE_URL or database_url in --config",
        )
    }

    pub fn store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::default();
        if let Some(ms) = self.lock_timeout_ms {
            config.lock_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = self.max_connections {
            config.max_connections = n;
        }
        if let Some(ms) = self.acquire_timeout_ms {
            config.acquire_timeout = Duration::from_millis(ms);
        }
        config
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{name} must be a non-negative integer, got {raw:?}"))
}
