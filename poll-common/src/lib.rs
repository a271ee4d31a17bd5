//! Poll Common - Shared configuration, errors, and logging for the poll workspace.
//!
//! This crate provides:
//! - Configuration types, loading and environment overrides
//! - Configuration validation
//! - Error types
//! - Logging setup
//! - Small parsing helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{CacheConfig, Config, CrawlerConfig, ObservabilityConfig, SelectorConfig};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};
