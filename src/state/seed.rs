use crate::state::entity::{BusLocation, BusStatus, Notification, Severity};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Initial snapshot loaded before the feed starts
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub buses: Vec<BusLocation>,
    /// Newest first
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

impl Seed {
    /// Built-in demo fleet and notifications
    pub fn demo() -> Self {
        Self {
            buses: demo_fleet(),
            notifications: demo_notifications(),
        }
    }
}

/// Load a JSON seed file
pub fn load_seed(path: impl AsRef<Path>) -> Result<Seed> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse seed file {}", path.display()))
}

#[allow(clippy::too_many_arguments)]
fn bus(
    n: u32,
    lat: f64,
    lng: f64,
    speed: f64,
    heading: f64,
    occupancy: u32,
    status: BusStatus,
    route_name: &str,
    next_stop: &str,
    eta: u32,
    driver_name: &str,
) -> BusLocation {
    BusLocation {
        bus_id: format!("bus-{}", n),
        bus_number: format!("SB-{}", 100 + n),
        lat,
        lng,
        speed,
        heading,
        occupancy,
        capacity: 40,
        status,
        route_name: route_name.to_string(),
        next_stop: next_stop.to_string(),
        eta,
        driver_name: driver_name.to_string(),
        last_updated: Utc::now(),
    }
}

/// Five buses around the demo city centre
pub fn demo_fleet() -> Vec<BusLocation> {
    vec![
        bus(1, 33.8886, 35.4955, 35.0, 45.0, 28, BusStatus::OnRoute, "Route Alpha", "City Center", 8, "Ahmad K."),
        bus(2, 33.8950, 35.5010, 20.0, 120.0, 35, BusStatus::Approaching, "Route Beta", "University Gate", 3, "Sara M."),
        bus(3, 33.8820, 35.4880, 0.0, 0.0, 0, BusStatus::Idle, "Route Gamma", "Depot", 0, "Omar R."),
        bus(4, 33.8900, 35.5050, 45.0, 270.0, 22, BusStatus::OnRoute, "Route Delta", "Mall Junction", 12, "Lina H."),
        bus(5, 33.8870, 35.4920, 15.0, 180.0, 38, BusStatus::Delayed, "Route Epsilon", "Hospital Road", 18, "Karim B."),
    ]
}

/// Demo notifications, newest first
pub fn demo_notifications() -> Vec<Notification> {
    let now = Utc::now();
    let note = |id: &str, title: &str, message: &str, severity, minutes_ago, read| Notification {
        id: id.to_string(),
        title: title.to_string(),
        message: message.to_string(),
        severity,
        timestamp: now - Duration::minutes(minutes_ago),
        read,
    };

    vec![
        note("1", "Bus SB-105 Delayed", "SB-105 is running 10 minutes behind schedule due to traffic.", Severity::Warning, 2, false),
        note("2", "Bus SB-102 Approaching", "SB-102 will arrive at University Gate in 3 minutes.", Severity::Info, 5, false),
        note("3", "Attendance Recorded", "28 students boarded SB-101 successfully.", Severity::Success, 10, true),
        note("4", "Route Optimized", "Route Alpha has been optimized, saving 12 minutes.", Severity::Success, 15, true),
        note("5", "SB-103 Maintenance Due", "Bus SB-103 is due for scheduled maintenance.", Severity::Error, 30, false),
    ]
}
