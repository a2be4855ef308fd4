use crate::config::StoreConfig;
use crate::event::{FeedEvent, BUS_LOCATION_TOPIC, NOTIFICATION_TOPIC};
use crate::state::entity::{BusLocation, Notification, StateChange};
use crate::state::seed::Seed;
use crate::state::summary::FleetSummary;
use crate::subscription::{handler, EventRouter, Handler};
use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// What `upsert_one` did with an incoming record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Existing entry replaced wholesale
    Replaced,
    /// Unknown bus appended (only when new buses are admitted)
    Inserted,
    /// Unknown bus ignored
    Ignored,
}

/// In-memory fleet snapshot fed by routed events.
///
/// Single writer for bus and notification state; readers get cloned
/// snapshots and re-derive aggregates on every read.
pub struct FleetState {
    /// Buses in seed order
    buses: RwLock<Vec<BusLocation>>,

    /// Notifications, newest first
    notifications: RwLock<Vec<Notification>>,

    /// Append unknown buses on update instead of ignoring them
    admit_new_buses: bool,

    /// Broadcast channel for snapshot changes
    change_tx: broadcast::Sender<StateChange>,
}

impl FleetState {
    pub fn new() -> Self {
        Self::with_config(&StoreConfig::default())
    }

    pub fn with_config(config: &StoreConfig) -> Self {
        let (change_tx, _) = broadcast::channel(1000);

        Self {
            buses: RwLock::new(Vec::new()),
            notifications: RwLock::new(Vec::new()),
            admit_new_buses: config.admit_new_buses,
            change_tx,
        }
    }

    /// Replace the whole bus snapshot
    pub fn set_all(&self, buses: Vec<BusLocation>) {
        let count = buses.len();
        *self.buses.write() = buses;

        info!(buses = count, "Fleet snapshot replaced");
        let _ = self.change_tx.send(StateChange::BusesReplaced { count });
    }

    /// Fold one bus update into the snapshot.
    ///
    /// A known `bus_id` is replaced with the incoming record as a whole.
    /// An unknown one is ignored unless new buses are admitted.
    pub fn upsert_one(&self, bus: BusLocation) -> UpsertOutcome {
        let outcome = {
            let mut buses = self.buses.write();
            match buses.iter_mut().find(|b| b.bus_id == bus.bus_id) {
                Some(existing) => {
                    *existing = bus.clone();
                    UpsertOutcome::Replaced
                }
                None if self.admit_new_buses => {
                    buses.push(bus.clone());
                    UpsertOutcome::Inserted
                }
                None => UpsertOutcome::Ignored,
            }
        };

        match outcome {
            UpsertOutcome::Replaced => {
                let _ = self.change_tx.send(StateChange::BusUpdated(bus));
            }
            UpsertOutcome::Inserted => {
                info!(bus_id = %bus.bus_id, "New bus admitted to snapshot");
                let _ = self.change_tx.send(StateChange::BusInserted(bus));
            }
            UpsertOutcome::Ignored => {
                debug!(bus_id = %bus.bus_id, "Update for unknown bus ignored");
            }
        }

        outcome
    }

    /// Current bus snapshot
    pub fn snapshot(&self) -> Vec<BusLocation> {
        self.buses.read().clone()
    }

    pub fn get(&self, bus_id: &str) -> Option<BusLocation> {
        self.buses.read().iter().find(|b| b.bus_id == bus_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.buses.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.read().is_empty()
    }

    /// Buses whose number, route or driver contains `query` (case-insensitive)
    pub fn search(&self, query: &str) -> Vec<BusLocation> {
        self.buses
            .read()
            .iter()
            .filter(|b| b.matches(query))
            .cloned()
            .collect()
    }

    /// Dashboard aggregates derived from the current snapshot
    pub fn summary(&self, now: DateTime<Utc>, stale_after: Duration) -> FleetSummary {
        FleetSummary::from_snapshot(&self.buses.read(), now, stale_after)
    }

    /// Prepend a notification (newest first)
    pub fn add_notification(&self, notification: Notification) {
        self.notifications.write().insert(0, notification.clone());
        let _ = self.change_tx.send(StateChange::NotificationAdded(notification));
    }

    /// Replace all notifications; expects newest-first order
    pub fn set_notifications(&self, notifications: Vec<Notification>) {
        let count = notifications.len();
        *self.notifications.write() = notifications;
        let _ = self
            .change_tx
            .send(StateChange::NotificationsReplaced { count });
    }

    /// Mark a notification read. Returns false if unknown or already read.
    pub fn mark_notification_read(&self, id: &str) -> bool {
        let changed = {
            let mut notifications = self.notifications.write();
            match notifications.iter_mut().find(|n| n.id == id) {
                Some(n) if !n.read => {
                    n.read = true;
                    true
                }
                _ => false,
            }
        };

        if changed {
            let _ = self.change_tx.send(StateChange::NotificationRead { id: id.to_string() });
        }
        changed
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.read().clone()
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.read().iter().filter(|n| !n.read).count()
    }

    /// Load buses and notifications from a seed
    pub fn load_seed(&self, seed: Seed) {
        self.set_notifications(seed.notifications);
        self.set_all(seed.buses);
    }

    /// Subscribe to snapshot changes
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.change_tx.subscribe()
    }

    /// Register this projection's handlers on `router`.
    ///
    /// Bus telemetry is folded with `upsert_one`, notifications are
    /// prepended. Keep the returned [`Projection`] to detach later.
    pub fn attach(self: &Arc<Self>, router: &EventRouter) -> Projection {
        let state = Arc::clone(self);
        let on_bus = handler(move |event| match event {
            FeedEvent::BusLocation(bus) => {
                state.upsert_one(bus.clone());
                Ok(())
            }
            other => Err(anyhow!("unexpected {} event on bus topic", other.topic())),
        });

        let state = Arc::clone(self);
        let on_notification = handler(move |event| match event {
            FeedEvent::Notification(notification) => {
                state.add_notification(notification.clone());
                Ok(())
            }
            other => Err(anyhow!(
                "unexpected {} event on notification topic",
                other.topic()
            )),
        });

        router.subscribe(BUS_LOCATION_TOPIC, Arc::clone(&on_bus));
        router.subscribe(NOTIFICATION_TOPIC, Arc::clone(&on_notification));

        Projection {
            on_bus,
            on_notification,
        }
    }
}

impl Default for FleetState {
    fn default() -> Self {
        Self::new()
    }
}

/// Handlers registered by [`FleetState::attach`]
pub struct Projection {
    on_bus: Handler,
    on_notification: Handler,
}

impl Projection {
    /// Unregister from `router`; the snapshot keeps its last state
    pub fn detach(self, router: &EventRouter) {
        router.unsubscribe(BUS_LOCATION_TOPIC, &self.on_bus);
        router.unsubscribe(NOTIFICATION_TOPIC, &self.on_notification);
    }
}
