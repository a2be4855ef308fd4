use crate::state::entity::{BusLocation, BusStatus};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Bus count per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub on_route: usize,
    pub approaching: usize,
    pub arrived: usize,
    pub idle: usize,
    pub delayed: usize,
}

impl StatusCounts {
    fn record(&mut self, status: BusStatus) {
        match status {
            BusStatus::OnRoute => self.on_route += 1,
            BusStatus::Approaching => self.approaching += 1,
            BusStatus::Arrived => self.arrived += 1,
            BusStatus::Idle => self.idle += 1,
            BusStatus::Delayed => self.delayed += 1,
        }
    }
}

/// Dashboard KPIs derived from a bus snapshot.
///
/// Recomputed from scratch on every read; fleets are small.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FleetSummary {
    pub total: usize,
    /// Buses not idle
    pub active: usize,
    /// Students on board across the fleet
    pub onboard: u64,
    pub capacity: u64,
    pub by_status: StatusCounts,
    pub over_capacity: usize,
    /// Buses with no report within the staleness threshold
    pub stale: usize,
}

impl FleetSummary {
    pub fn from_snapshot(buses: &[BusLocation], now: DateTime<Utc>, stale_after: Duration) -> Self {
        let mut summary = FleetSummary {
            total: buses.len(),
            ..Default::default()
        };

        for bus in buses {
            summary.by_status.record(bus.status);
            if bus.status != BusStatus::Idle {
                summary.active += 1;
            }
            summary.onboard += u64::from(bus.occupancy);
            summary.capacity += u64::from(bus.capacity);
            if bus.is_over_capacity() {
                summary.over_capacity += 1;
            }
            if bus.is_stale(now, stale_after) {
                summary.stale += 1;
            }
        }

        summary
    }

    /// Delayed buses ("late buses" on the dashboard)
    pub fn delayed(&self) -> usize {
        self.by_status.delayed
    }

    /// Fleet-wide occupancy as a fraction of capacity (0.0 when empty)
    pub fn occupancy_rate(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.onboard as f64 / self.capacity as f64
        }
    }
}
