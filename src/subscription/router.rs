use crate::event::{DecodeError, FeedEvent};
use dashmap::DashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Subscriber callback.
///
/// Identity is the `Arc` allocation: keep a clone of the handler you
/// subscribed if you intend to unsubscribe it later.
pub type Handler = Arc<dyn Fn(&FeedEvent) -> anyhow::Result<()> + Send + Sync>;

/// Wrap a closure as a [`Handler`]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&FeedEvent) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Outcome of a single dispatch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that returned Ok
    pub delivered: usize,
    /// Handlers that returned Err or panicked
    pub failed: usize,
}

/// Topic-based fan-out from the feed to its consumers
pub struct EventRouter {
    /// topic -> handlers, in registration order. Duplicates are kept.
    handlers: DashMap<String, Vec<Handler>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Register `handler` under `topic`.
    ///
    /// Registering the same handler twice makes it fire twice per event.
    pub fn subscribe(&self, topic: &str, handler: Handler) {
        self.handlers
            .entry(topic.to_string())
            .or_default()
            .push(handler);
        debug!(topic = %topic, "Handler subscribed");
    }

    /// Remove every registration of `handler` under `topic`.
    ///
    /// Returns how many entries were removed; unknown topics and handlers are
    /// a no-op.
    pub fn unsubscribe(&self, topic: &str, handler: &Handler) -> usize {
        let removed = match self.handlers.get_mut(topic) {
            Some(mut list) => {
                let before = list.len();
                list.retain(|h| !Arc::ptr_eq(h, handler));
                before - list.len()
            }
            None => 0,
        };

        // Drop empty topics so topics() only reports live ones
        self.handlers.remove_if(topic, |_, list| list.is_empty());

        if removed > 0 {
            debug!(topic = %topic, removed = removed, "Handler unsubscribed");
        }
        removed
    }

    /// Invoke every handler registered under `topic` with `event`.
    ///
    /// Handlers run synchronously in registration order. A handler that
    /// fails or panics is logged and skipped; the rest still run.
    pub fn dispatch(&self, topic: &str, event: &FeedEvent) -> DispatchReport {
        // Clone the list out so handlers may subscribe/unsubscribe re-entrantly
        let handlers: Vec<Handler> = match self.handlers.get(topic) {
            Some(list) => list.clone(),
            None => return DispatchReport::default(),
        };

        let mut report = DispatchReport::default();
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!(topic = %topic, error = %e, "Subscriber failed, continuing");
                    report.failed += 1;
                }
                Err(_) => {
                    warn!(topic = %topic, "Subscriber panicked, continuing");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Decode a text frame and dispatch it under its topic
    pub fn route_text(&self, text: &str) -> Result<DispatchReport, DecodeError> {
        let event = FeedEvent::decode(text)?;
        Ok(self.dispatch(event.topic(), &event))
    }

    /// Number of registrations under `topic`
    pub fn handler_count(&self, topic: &str) -> usize {
        self.handlers.get(topic).map(|list| list.len()).unwrap_or(0)
    }

    /// Topics with at least one registration
    pub fn topics(&self) -> Vec<String> {
        self.handlers.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}
