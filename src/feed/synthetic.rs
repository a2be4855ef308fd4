use crate::config::FallbackConfig;
use crate::event::{validate_bus_location, DecodeError, FeedEvent, BUS_LOCATION_TOPIC};
use crate::feed::metrics::FeedMetrics;
use crate::state::{BusLocation, BusStatus};
use crate::subscription::EventRouter;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Fixed part of a synthetic bus; position and timestamp vary per tick
struct Template {
    n: u32,
    /// Jitter direction per axis (+1.0 or -1.0)
    lat_sign: f64,
    lng_sign: f64,
    /// Jitter range as a fraction of the configured maximum
    lat_spread: f64,
    lng_spread: f64,
    speed: f64,
    heading: f64,
    occupancy: u32,
    status: BusStatus,
    route_name: &'static str,
    next_stop: &'static str,
    eta: u32,
    driver_name: &'static str,
}

const FLEET: [Template; 4] = [
    Template {
        n: 1,
        lat_sign: 1.0,
        lng_sign: 1.0,
        lat_spread: 1.0,
        lng_spread: 1.0,
        speed: 35.0,
        heading: 45.0,
        occupancy: 28,
        status: BusStatus::OnRoute,
        route_name: "Route Alpha",
        next_stop: "City Center",
        eta: 8,
        driver_name: "Ahmad K.",
    },
    Template {
        n: 2,
        lat_sign: -1.0,
        lng_sign: 1.0,
        lat_spread: 1.0,
        lng_spread: 0.8,
        speed: 20.0,
        heading: 120.0,
        occupancy: 35,
        status: BusStatus::Approaching,
        route_name: "Route Beta",
        next_stop: "University Gate",
        eta: 3,
        driver_name: "Sara M.",
    },
    Template {
        n: 3,
        lat_sign: 1.0,
        lng_sign: -1.0,
        lat_spread: 0.8,
        lng_spread: 1.0,
        speed: 0.0,
        heading: 0.0,
        occupancy: 0,
        status: BusStatus::Idle,
        route_name: "Route Gamma",
        next_stop: "Depot",
        eta: 0,
        driver_name: "Omar R.",
    },
    Template {
        n: 4,
        lat_sign: -1.0,
        lng_sign: -1.0,
        lat_spread: 0.6,
        lng_spread: 0.7,
        speed: 45.0,
        heading: 270.0,
        occupancy: 22,
        status: BusStatus::OnRoute,
        route_name: "Route Delta",
        next_stop: "Mall Junction",
        eta: 12,
        driver_name: "Lina H.",
    },
];

/// Plausible fake telemetry around a fixed anchor
#[derive(Debug, Clone)]
pub struct SyntheticFleet {
    anchor_lat: f64,
    anchor_lng: f64,
    jitter: f64,
}

impl SyntheticFleet {
    /// Rejects a non-finite or out-of-range anchor and a non-finite jitter
    pub fn new(config: &FallbackConfig) -> Result<Self, DecodeError> {
        let checks = [
            ("anchor_lat", config.anchor_lat, -90.0..=90.0),
            ("anchor_lng", config.anchor_lng, -180.0..=180.0),
            ("jitter_degrees", config.jitter_degrees, f64::MIN..=f64::MAX),
        ];
        for (field, value, range) in checks {
            if !value.is_finite() || !range.contains(&value) {
                return Err(DecodeError::InvalidValue { field, value });
            }
        }

        Ok(Self {
            anchor_lat: config.anchor_lat,
            anchor_lng: config.anchor_lng,
            jitter: config.jitter_degrees.abs(),
        })
    }

    /// One batch: every synthetic bus with fresh jitter, stamped now
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Vec<BusLocation> {
        let now = Utc::now();
        FLEET
            .iter()
            .map(|t| {
                let lat_offset = rng.gen_range(0.0..=1.0) * self.jitter * t.lat_spread;
                let lng_offset = rng.gen_range(0.0..=1.0) * self.jitter * t.lng_spread;
                BusLocation {
                    bus_id: format!("bus-{}", t.n),
                    bus_number: format!("SB-{}", 100 + t.n),
                    lat: self.anchor_lat + t.lat_sign * lat_offset,
                    lng: self.anchor_lng + t.lng_sign * lng_offset,
                    speed: t.speed,
                    heading: t.heading,
                    occupancy: t.occupancy,
                    capacity: 40,
                    status: t.status,
                    route_name: t.route_name.to_string(),
                    next_stop: t.next_stop.to_string(),
                    eta: t.eta,
                    driver_name: t.driver_name.to_string(),
                    last_updated: now,
                }
            })
            .collect()
    }
}

/// Emit a synthetic batch every `config.interval_ms` until cancelled.
///
/// The first batch goes out immediately. Each bus is routed on the
/// bus-location topic exactly like a real frame.
pub async fn run_synthetic_feed(
    router: Arc<EventRouter>,
    metrics: FeedMetrics,
    fleet: SyntheticFleet,
    config: FallbackConfig,
) {
    let mut ticker = interval(config.interval());

    // Skip missed ticks to prevent bursts after a stall
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        interval_ms = config.interval_ms,
        anchor_lat = config.anchor_lat,
        anchor_lng = config.anchor_lng,
        "Synthetic feed started"
    );

    loop {
        ticker.tick().await;

        // ThreadRng is !Send; keep it out of the await
        let batch = fleet.sample(&mut rand::thread_rng());
        for bus in batch {
            // Jitter can push an anchor near a pole or the antimeridian out of range
            if let Err(e) = validate_bus_location(&bus) {
                metrics.record_dropped();
                warn!(bus_id = %bus.bus_id, error = %e, "Dropping synthetic sample");
                continue;
            }
            let event = FeedEvent::BusLocation(bus);
            let report = router.dispatch(BUS_LOCATION_TOPIC, &event);
            metrics.record_dispatch(report.failed);
        }
        metrics.record_synthetic_batch();
        debug!("Synthetic batch dispatched");
    }
}
