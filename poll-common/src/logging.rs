//! Logging utilities for poll services.
//!
//! Provides structured JSON or pretty logging on top of `tracing-subscriber`.
//!
//! # Noise Filtering
//!
//! By default, noisy library modules (hyper, reqwest, h2, rustls, html5ever)
//! are set to `warn` level to reduce log clutter while keeping crawl and
//! cache logs at the specified level.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::ObservabilityConfig;

/// Default noisy modules that should be filtered to warn level.
pub const NOISY_MODULES: &[&str] = &[
    "hyper",
    "hyper_util",
    "reqwest",
    "h2",
    "rustls",
    "html5ever",
    "selectors",
];

/// Build the filter directives for a base level plus excluded targets.
fn build_directives(log_level: &str, excluded_targets: &[String]) -> String {
    let mut directives = String::from(log_level);

    for module in NOISY_MODULES {
        directives.push_str(&format!(",{}=warn", module));
    }

    for target in excluded_targets {
        directives.push_str(&format!(",{}=warn", target));
    }

    directives
}

/// Initialize logging from the observability config section.
pub fn init_from_config(config: &ObservabilityConfig) {
    init_logging_with_exclusions(
        &config.log_level,
        &config.log_format,
        &config.excluded_targets,
    );
}

/// Initialize logging with custom excluded targets.
///
/// Initialize logging with the given level and format.
///
/// * `log_level` - Base log level (trace, debug, info, warn, error)
/// * `log_format` - "json" for structured JSON, anything else for human-readable
/// * `excluded_targets` - Extra modules silenced below `warn`
///
/// `RUST_LOG` overrides the computed filter when set.
pub fn init_logging_with_exclusions(
    log_level: &str,
    log_format: &str,
    excluded_targets: &[String],
) {
    let directives = build_directives(log_level, excluded_targets);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));

    let subscriber = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_file(false)
            .with_line_number(false);
        let _ = subscriber.with(fmt_layer).try_init();
    }

    tracing::info!(
        log_level = %log_level,
        log_format = %log_format,
        noise_filtered = NOISY_MODULES.len() + excluded_targets.len(),
        "Logging initialized"
    );
}

/// Generate a new id for a crawl run.
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Create a tracing span for one crawl run.
///
/// ```ignore
/// let span = crawl_span!(run_id, seeds = seeds.len());
/// async { /* ... */ }.instrument(span).await;
/// ```
#[macro_export]
macro_rules! crawl_span {
    ($run_id:expr) => {
        tracing::info_span!("crawl", run_id = %$run_id)
    };
    ($run_id:expr, $($field:tt)*) => {
        tracing::info_span!("crawl", run_id = %$run_id, $($field)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noisy_modules_list() {
        assert!(NOISY_MODULES.contains(&"hyper"));
        assert!(NOISY_MODULES.contains(&"reqwest"));
        assert!(NOISY_MODULES.contains(&"html5ever"));
    }

    #[test]
    fn test_build_directives() {
        let directives = build_directives("debug", &["poll_engine::cache".to_string()]);
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("reqwest=warn"));
        assert!(directives.ends_with("poll_engine::cache=warn"));
    }

    #[test]
    fn test_generate_run_id() {
        let id1 = generate_run_id();
        let id2 = generate_run_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36);
    }
}
