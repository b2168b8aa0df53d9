//! Configuration Loader
//!
//! Environment-aware loading: detects the environment, layers YAML files and
//! environment variables over the built-in defaults, then validates.

use super::error::{ConfigResult, ConfigurationError};
use super::BulkConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Base name of the YAML files under the configuration directory
pub const CONFIG_FILE_STEM: &str = "catalog-bulk";

/// Prefix of environment variable overrides, e.g. `CATALOG_BULK__BATCH__CHUNK_SIZE`
pub const ENV_PREFIX: &str = "CATALOG_BULK";

const ENV_SEPARATOR: &str = "__";

/// Loaded configuration together with where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: BulkConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_overrides(config_dir, environment, None)
    }

    /// Like [`load_from_directory_with_env`](Self::load_from_directory_with_env),
    /// reading environment overrides from `overrides` instead of the process
    /// environment when given.
    pub fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        overrides: Option<config::Map<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment, overrides)?;
        config.validate()?;

        info!(
            environment = %environment,
            chunk_size = config.batch.chunk_size,
            max_batch_size = config.batch.max_batch_size,
            default_error_policy = %config.batch.default_error_policy,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Manager over an in-memory configuration, validated but not read from disk
    pub fn from_config(config: BulkConfig, environment: &str) -> ConfigResult<ConfigManager> {
        config.validate()?;
        Ok(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        })
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &BulkConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment: CATALOG_BULK_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("CATALOG_BULK_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
        overrides: Option<config::Map<String, String>>,
    ) -> ConfigResult<BulkConfig> {
        let defaults = Config::try_from(&BulkConfig::default())
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        let base_file = config_directory.join(format!("{CONFIG_FILE_STEM}.yaml"));
        let env_file = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}.yaml"));
        debug!(
            base = %base_file.display(),
            base_present = base_file.is_file(),
            overrides = %env_file.display(),
            overrides_present = env_file.is_file(),
            "Configuration files"
        );

        let environment_source = Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(overrides);

        let merged = Config::builder()
            .add_source(defaults)
            .add_source(File::from(base_file).format(FileFormat::Yaml).required(false))
            .add_source(File::from(env_file).format(FileFormat::Yaml).required(false))
            .add_source(environment_source)
            .build()
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        merged
            .try_deserialize::<BulkConfig>()
            .map_err(ConfigurationError::deserialization)
    }

    /// Load a single YAML file on top of the defaults, without environment layering
    pub fn load_file(path: &Path) -> ConfigResult<BulkConfig> {
        if !path.is_file() {
            return Err(ConfigurationError::config_file_not_found(path));
        }
        let defaults = Config::try_from(&BulkConfig::default())
            .map_err(|e| ConfigurationError::load_error("file", e))?;
        let config: BulkConfig = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .build()
            .map_err(|e| ConfigurationError::load_error("file", e))?
            .try_deserialize()
            .map_err(ConfigurationError::deserialization)?;
        config.validate()?;
        Ok(config)
    }
}
