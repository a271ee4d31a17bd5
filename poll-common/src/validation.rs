//! Configuration validation for poll services.
//!
//! Provides validation logic for configuration fields to ensure
//! all required values are present and within valid ranges.

use thiserror::Error;
use url::Url;

use crate::config::{CacheConfig, Config, CrawlerConfig, ObservabilityConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["json", "pretty"];

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors: Vec<ValidationError> = [
            self.crawler.validate(),
            self.cache.validate(),
            self.observability.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

impl Validate for CrawlerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "crawler.base_url".into(),
            });
        }

        let base = Url::parse(&self.base_url).map_err(|e| ValidationError::InvalidValue {
            field: "crawler.base_url".into(),
            reason: e.to_string(),
        })?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidValue {
                field: "crawler.base_url".into(),
                reason: format!("unsupported scheme {}", base.scheme()),
            });
        }

        if self.seeds.is_empty() {
            return Err(ValidationError::MissingField {
                field: "crawler.seeds".into(),
            });
        }

        for seed in &self.seeds {
            base.join(seed).map_err(|e| ValidationError::InvalidValue {
                field: "crawler.seeds".into(),
                reason: format!("{seed}: {e}"),
            })?;
        }

        if self.fetch_timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "crawler.fetch_timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for CacheConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.max_age_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "cache.max_age_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if let Some(path) = &self.path {
            if path.trim().is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: "cache.path".into(),
                    reason: "must not be empty".into(),
                });
            }
        }

        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of {LOG_LEVELS:?}"),
            });
        }

        if !LOG_FORMATS.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of {LOG_FORMATS:?}"),
            });
        }

        Ok(())
    }
}
