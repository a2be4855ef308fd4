use anyhow::Result;
use busfeed::config::{load_config, BusfeedConfig};
use busfeed::feed::LiveFeed;
use busfeed::state::reporter::run_summary_reporter;
use busfeed::state::{load_seed, FleetState, Seed};
use busfeed::subscription::EventRouter;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "busfeed=info".into()),
        )
        .init();

    info!("Busfeed starting...");

    let mut config = match std::env::var("BUSFEED_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading configuration");
            load_config(&path)?
        }
        Err(_) => BusfeedConfig::default(),
    };
    config.apply_env();

    // Seed the snapshot before the feed starts
    let state = Arc::new(FleetState::with_config(&config.store));
    let seed = match &config.store.seed_path {
        Some(path) => load_seed(path)?,
        None => Seed::demo(),
    };
    state.load_seed(seed);

    let router = Arc::new(EventRouter::new());
    let projection = state.attach(&router);

    let feed = LiveFeed::new(&config, Arc::clone(&router));
    feed.connect();
    info!(
        url = config.feed.url.as_deref().unwrap_or("<none>"),
        reconnect_delay_ms = config.feed.reconnect_delay_ms,
        "Live feed started"
    );

    let reporter = tokio::spawn(run_summary_reporter(
        Arc::clone(&state),
        feed.clone(),
        config.dashboard.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    feed.disconnect();
    projection.detach(&router);
    reporter.abort();

    info!(buses = state.len(), "Busfeed stopped");
    Ok(())
}
