//! Poll Engine - fetches the poll set and prints the current picture.
//!
//! Serves from the cache when it is fresh, crawls otherwise, then logs the
//! latest nation-wide composite and its majorities.

use anyhow::{Context, Result};
use poll_common::config::Config;
use poll_common::logging::init_from_config;
use poll_engine::{Coalition, PollResult, PollStore, RegionSet};
use tokio_util::sync::CancellationToken;

/// Largest coalition size worth reporting.
const MAX_COALITION_PARTIES: usize = 3;

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    let config = Config::load_with_env()?;
    init_from_config(&config.observability);

    tracing::info!("Poll Engine v{}", env!("CARGO_PKG_VERSION"));

    config.validate().context("Invalid configuration")?;

    let store = PollStore::from_config(&config)?;

    if std::env::args().any(|arg| arg == "--refresh") {
        store.invalidate()?;
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping crawl");
            on_signal.cancel();
        }
    });

    let history = match store.history(&cancel).await {
        Ok(history) => history,
        Err(e) if e.is_cancelled() => {
            tracing::warn!("Crawl cancelled before any poll was found");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(
        polls = history.len(),
        dates = history.dates().len(),
        duration_ms = startup_start.elapsed().as_millis() as u64,
        "Poll history loaded"
    );

    let Some(latest) = history.latest_date() else {
        tracing::warn!("No polls available");
        return Ok(());
    };

    let merged = history.slice(latest, &RegionSet::nationwide());
    for (party, share) in merged.shares() {
        tracing::info!(
            date = %latest,
            party = %party,
            share = %format!("{:.1}%", share * 100.0),
            "Composite share"
        );
    }

    for coalition in Coalition::majorities(&merged, MAX_COALITION_PARTIES) {
        let parties: Vec<String> = coalition
            .coalition_parties()
            .iter()
            .map(|p| p.to_string())
            .collect();
        tracing::info!(
            parties = %parties.join("+"),
            seats = %format!("{:.1}%", coalition.coalition_percentage() * 100.0),
            "Majority coalition"
        );
    }

    Ok(())
}
