use crate::config::DashboardConfig;
use crate::feed::LiveFeed;
use crate::state::FleetState;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// Periodically log dashboard KPIs and feed counters.
///
/// Runs until the task is cancelled. Aggregates are re-derived from the
/// snapshot on every tick.
pub async fn run_summary_reporter(
    state: Arc<FleetState>,
    feed: LiveFeed,
    config: DashboardConfig,
) {
    let mut ticker = interval(Duration::from_secs(config.summary_interval_seconds.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let stale_after = config.stale_after();

    loop {
        ticker.tick().await;

        let summary = state.summary(Utc::now(), stale_after);
        let metrics = feed.metrics().snapshot();

        info!(
            feed = ?feed.state(),
            active_buses = summary.active,
            onboard_students = summary.onboard,
            occupancy_pct = (summary.occupancy_rate() * 100.0).round(),
            late_buses = summary.delayed(),
            active_alerts = state.unread_count(),
            frames = metrics.frames_received,
            dropped = metrics.frames_dropped,
            "Fleet summary"
        );

        if summary.stale > 0 {
            warn!(
                stale = summary.stale,
                threshold_seconds = config.stale_after_seconds,
                "Buses not reporting"
            );
        }
        if summary.over_capacity > 0 {
            warn!(buses = summary.over_capacity, "Buses over capacity");
        }
    }
}
