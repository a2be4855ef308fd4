// Fleet snapshot and the projection that folds feed events into it

mod engine;
mod entity;
pub mod reporter;
pub mod seed;
pub mod summary;

pub use engine::{FleetState, Projection, UpsertOutcome};
pub use entity::{BusLocation, BusStatus, Notification, Severity, StateChange};
pub use seed::{demo_fleet, demo_notifications, load_seed, Seed};
pub use summary::{FleetSummary, StatusCounts};

#[cfg(test)]
mod tests;
