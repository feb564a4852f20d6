//! Periodic catalogue refresh and legacy term crawl

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::engine::RoutingEngine;
use super::legacy::LegacyResolver;

/// Refresh the catalogue every `period` until the task is dropped or aborted.
/// The first refresh happens one period after start; failures are logged and
/// the engine keeps serving its last good snapshot.
pub async fn run_refresh_loop(engine: Arc<RoutingEngine>, period: Duration) {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    timer.tick().await;

    loop {
        timer.tick().await;
        match engine.refresh().await {
            Ok(report) => tracing::debug!(
                services = report.services,
                terms = report.terms,
                "Scheduled refresh completed"
            ),
            Err(e) => tracing::warn!(error = %e, "Scheduled refresh failed, serving last snapshot"),
        }
    }
}

pub fn spawn_refresh_loop(engine: Arc<RoutingEngine>, period: Duration) -> JoinHandle<()> {
    tracing::info!(interval_secs = period.as_secs(), "Starting catalogue refresh loop");
    tokio::spawn(run_refresh_loop(engine, period))
}

/// Re-crawl the legacy term listings every `period`. As with the catalogue
/// loop the first crawl waits one period; a failed crawl keeps the last list.
pub async fn run_crawl_loop(resolver: Arc<LegacyResolver>, period: Duration) {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer.tick().await;

    loop {
        timer.tick().await;
        match resolver.crawl_terms().await {
            Ok(terms) => tracing::debug!(sources = terms.len(), "Scheduled term crawl completed"),
            Err(e) => tracing::warn!(error = %e, "Scheduled term crawl failed, keeping last term list"),
        }
    }
}

pub fn spawn_crawl_loop(resolver: Arc<LegacyResolver>, period: Duration) -> JoinHandle<()> {
    tracing::info!(interval_secs = period.as_secs(), "Starting legacy term crawl loop");
    tokio::spawn(run_crawl_loop(resolver, period))
}
