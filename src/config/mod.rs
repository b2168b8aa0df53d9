//! # Catalog Bulk Configuration
//!
//! Layered configuration for the bulk engine: built-in defaults, then
//! `config/catalog-bulk.yaml`, then `config/catalog-bulk.<env>.yaml`, then
//! `CATALOG_BULK__SECTION__KEY` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use catalog_bulk::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let chunk_size = manager.config().batch.chunk_size;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{ErrorPolicy, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_BATCH_SIZE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Largest chunk a single bulk statement may carry. PostgreSQL caps bind
/// parameters at 65535 and the widest row binds 15 columns.
pub const MAX_CHUNK_SIZE: usize = 4000;

/// Root configuration structure mirroring catalog-bulk.yaml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BulkConfig {
    pub batch: BatchConfig,
    pub database: DatabaseConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Rows per bulk statement
    pub chunk_size: usize,
    pub max_batch_size: usize,
    pub default_error_policy: ErrorPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            default_error_policy: ErrorPolicy::RejectEverything,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/catalog_bulk_development".to_string(),
            max_connections: 10,
            acquire_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Capacity of the broadcast channel used by `BroadcastEventSink`
    pub buffer_size: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { buffer_size: 1000 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Overrides the environment's default level; `RUST_LOG` still wins
    pub level: Option<String>,
    pub json: bool,
}

impl BulkConfig {
    /// Validate configuration for consistency and required fields
    pub fn validate(&self) -> ConfigResult<()> {
        let batch = &self.batch;
        if batch.chunk_size == 0 || batch.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigurationError::invalid_value(
                "batch.chunk_size",
                batch.chunk_size,
                format!("must be between 1 and {MAX_CHUNK_SIZE}"),
            ));
        }
        if batch.max_batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "batch.max_batch_size",
                batch.max_batch_size,
                "must be greater than 0",
            ));
        }

        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "url",
                "database",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                self.database.max_connections,
                "must be greater than 0",
            ));
        }

        if self.events.buffer_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.buffer_size",
                self.events.buffer_size,
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = BulkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch.chunk_size, 2000);
        assert_eq!(config.batch.default_error_policy, ErrorPolicy::RejectEverything);
        assert_eq!(config.database.acquire_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn oversized_chunks_are_rejected() {
        let mut config = BulkConfig::default();
        config.batch.chunk_size = MAX_CHUNK_SIZE + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch.chunk_size"));

        config.batch.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_database_url_is_rejected() {
        let mut config = BulkConfig::default();
        config.database.url = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingRequiredField { .. })
        ));
    }
}
