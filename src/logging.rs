//! # Structured Logging Module
//!
//! Environment-aware structured logging for batch runs. Level defaults by
//! environment, `RUST_LOG` overrides it, and output is plain text or JSON.

use crate::config::LoggingConfig;
use crate::constants::{EntityKind, ErrorPolicy};
use crate::validation::ValidationError;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific defaults
pub fn init_structured_logging() {
    init_with_config(&LoggingConfig::default());
}

/// Initialize structured logging from the `logging` config section
pub fn init_with_config(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment).to_string());
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

        let registry = tracing_subscriber::registry().with(filter);
        // try_init: a global subscriber may already be installed by the embedder
        let result = if config.json {
            registry
                .with(fmt::layer().with_target(true).json())
                .try_init()
        } else {
            registry
                .with(fmt::layer().with_target(true).with_thread_ids(true))
                .try_init()
        };
        if result.is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            environment = %environment,
            level = %level,
            json = config.json,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("CATALOG_BULK_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log one record per finished batch
pub fn log_batch_operation(
    kind: EntityKind,
    policy: ErrorPolicy,
    size: usize,
    count: usize,
    rejected: usize,
    status: &str,
) {
    tracing::info!(
        kind = %kind,
        policy = %policy,
        size = size,
        count = count,
        rejected = rejected,
        status = %status,
        "BATCH_OPERATION"
    );
}

/// Log the errors that rejected one item
pub fn log_item_rejection(kind: EntityKind, index: usize, errors: &[ValidationError]) {
    let summary: Vec<String> = errors.iter().map(ToString::to_string).collect();
    tracing::debug!(
        kind = %kind,
        index = index,
        error_count = errors.len(),
        errors = ?summary,
        "ITEM_REJECTED"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
        log_batch_operation(
            EntityKind::Attribute,
            ErrorPolicy::RejectEverything,
            2,
            2,
            0,
            "committed",
        );
    }
}
