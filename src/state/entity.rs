use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Operating status reported for a bus
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BusStatus {
    OnRoute,
    Approaching,
    Arrived,
    Idle,
    Delayed,
}

/// Latest known telemetry for one tracked bus.
///
/// The record is always replaced as a whole; there is no field-level merge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusLocation {
    /// Stable fleet-wide identifier (e.g., "bus-1")
    pub bus_id: String,

    /// Human-readable label (e.g., "SB-101")
    pub bus_number: String,

    pub lat: f64,
    pub lng: f64,

    /// Speed in km/h
    pub speed: f64,

    /// Degrees clockwise from north, 0 <= heading < 360
    pub heading: f64,

    /// Students on board. Not checked against `capacity`.
    pub occupancy: u32,
    pub capacity: u32,

    pub status: BusStatus,
    pub route_name: String,
    pub next_stop: String,

    /// Minutes until `next_stop`
    pub eta: u32,

    pub driver_name: String,
    pub last_updated: DateTime<Utc>,
}

impl BusLocation {
    /// Time elapsed since the bus last reported
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_updated
    }

    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.age(now) > threshold
    }

    pub fn is_over_capacity(&self) -> bool {
        self.occupancy > self.capacity
    }

    /// Case-insensitive match on bus number, route name or driver name
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.bus_number.to_lowercase().contains(&query)
            || self.route_name.to_lowercase().contains(&query)
            || self.driver_name.to_lowercase().contains(&query)
    }
}

/// Notification severity (`type` on the wire)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Success,
    Error,
}

/// Operator-facing notification
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Notification {
    /// Create an unread notification stamped now, with a UUIDv7 id
    pub fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            title: title.into(),
            message: message.into(),
            severity,
            timestamp: Utc::now(),
            read: false,
        }
    }
}

/// Change notification broadcast to snapshot readers
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// Whole bus snapshot replaced (seed load)
    BusesReplaced { count: usize },
    /// Whole notification list replaced (seed load)
    NotificationsReplaced { count: usize },
    BusUpdated(BusLocation),
    BusInserted(BusLocation),
    NotificationAdded(Notification),
    NotificationRead { id: String },
}
