use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Complete busfeed configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusfeedConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Live feed connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// `ws://` or `wss://` endpoint. Unset means synthetic data.
    #[serde(default)]
    pub url: Option<String>,
    /// Fixed delay before reconnecting after a close (milliseconds)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Limit on TCP connect plus WebSocket handshake (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl FeedConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Open timeout, never zero
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Synthetic generator used when no transport can be built
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_fallback_enabled")]
    pub enabled: bool,
    /// Emission interval (milliseconds)
    #[serde(default = "default_fallback_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_anchor_lat")]
    pub anchor_lat: f64,
    #[serde(default = "default_anchor_lng")]
    pub anchor_lng: f64,
    /// Maximum position offset from the anchor, in degrees
    #[serde(default = "default_jitter_degrees")]
    pub jitter_degrees: f64,
}

fn default_fallback_enabled() -> bool {
    true
}

fn default_fallback_interval_ms() -> u64 {
    3000
}

fn default_anchor_lat() -> f64 {
    31.097041
}

fn default_anchor_lng() -> f64 {
    30.946548
}

fn default_jitter_degrees() -> f64 {
    0.01
}

impl FallbackConfig {
    /// Emission interval, never zero
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: default_fallback_enabled(),
            interval_ms: default_fallback_interval_ms(),
            anchor_lat: default_anchor_lat(),
            anchor_lng: default_anchor_lng(),
            jitter_degrees: default_jitter_degrees(),
        }
    }
}

/// Fleet snapshot settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Append buses first seen on the live feed instead of ignoring them
    #[serde(default)]
    pub admit_new_buses: bool,
    /// JSON seed file; the built-in demo fleet is used when unset
    #[serde(default)]
    pub seed_path: Option<PathBuf>,
}

/// Periodic KPI report
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_summary_interval")]
    pub summary_interval_seconds: u64,
    /// Buses silent for longer than this count as stale
    #[serde(default = "default_stale_after")]
    pub stale_after_seconds: u64,
}

fn default_summary_interval() -> u64 {
    10
}

fn default_stale_after() -> u64 {
    60
}

impl DashboardConfig {
    /// Staleness threshold, saturating at the largest representable span
    pub fn stale_after(&self) -> chrono::Duration {
        i64::try_from(self.stale_after_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            summary_interval_seconds: default_summary_interval(),
            stale_after_seconds: default_stale_after(),
        }
    }
}

impl BusfeedConfig {
    /// Overlay environment variables, ignoring unparsable values.
    ///
    /// - `BUSFEED_WS_URL`
    /// - `BUSFEED_RECONNECT_DELAY_MS`
    /// - `BUSFEED_FALLBACK_INTERVAL_MS`
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("BUSFEED_WS_URL") {
            if !v.trim().is_empty() {
                self.feed.url = Some(v.trim().to_string());
            }
        }
        if let Ok(v) = std::env::var("BUSFEED_RECONNECT_DELAY_MS") {
            match v.parse::<u64>() {
                Ok(n) => self.feed.reconnect_delay_ms = n,
                Err(_) => warn!(value = %v, "Ignoring invalid BUSFEED_RECONNECT_DELAY_MS"),
            }
        }
        if let Ok(v) = std::env::var("BUSFEED_FALLBACK_INTERVAL_MS") {
            match v.parse::<u64>() {
                Ok(n) => self.fallback.interval_ms = n,
                Err(_) => warn!(value = %v, "Ignoring invalid BUSFEED_FALLBACK_INTERVAL_MS"),
            }
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<BusfeedConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: BusfeedConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}
