use crate::config::{BusfeedConfig, FallbackConfig, FeedConfig};
use crate::event::DecodeError;
use crate::feed::metrics::FeedMetrics;
use crate::feed::synthetic::{run_synthetic_feed, SyntheticFleet};
use crate::feed::transport::{Endpoint, Frame, Transport, TransportError, WsTransport};
use crate::subscription::{DispatchReport, EventRouter, Handler};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Lifecycle of the live feed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    /// Transport error on an open connection; force-closing
    Errored,
    Closed,
    /// Waiting out the fixed reconnect delay
    ReconnectScheduled,
    /// No usable transport; synthetic generator running
    Synthetic,
}

/// Mutable lifecycle state. Never held across an await.
struct Lifecycle {
    state: ConnectionState,
    /// Bumped on every attempt, fallback start and disconnect. Tasks carry the
    /// generation they were started for and do nothing once it moves on.
    generation: u64,
    /// Tells the live session to close its connection
    session_close: Option<oneshot::Sender<()>>,
    session: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    synthetic: Option<JoinHandle<()>>,
}

struct Shared {
    feed: FeedConfig,
    fallback: FallbackConfig,
    transport: Arc<dyn Transport>,
    router: Arc<EventRouter>,
    metrics: FeedMetrics,
    lifecycle: Mutex<Lifecycle>,
    state_tx: watch::Sender<ConnectionState>,
}

/// Live-location feed: one logical connection, fixed-delay reconnect,
/// synthetic fallback.
///
/// Cheap to clone; all clones drive the same connection. Must be used from
/// within a Tokio runtime. Call [`LiveFeed::disconnect`] at shutdown: running
/// tasks keep the feed alive until then.
#[derive(Clone)]
pub struct LiveFeed {
    shared: Arc<Shared>,
}

impl LiveFeed {
    /// Feed over WebSocket
    pub fn new(config: &BusfeedConfig, router: Arc<EventRouter>) -> Self {
        Self::with_transport(config, router, Arc::new(WsTransport))
    }

    pub fn with_transport(
        config: &BusfeedConfig,
        router: Arc<EventRouter>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);

        Self {
            shared: Arc::new(Shared {
                feed: config.feed.clone(),
                fallback: config.fallback.clone(),
                transport,
                router,
                metrics: FeedMetrics::new(),
                lifecycle: Mutex::new(Lifecycle {
                    state: ConnectionState::Idle,
                    generation: 0,
                    session_close: None,
                    session: None,
                    reconnect: None,
                    synthetic: None,
                }),
                state_tx,
            }),
        }
    }

    /// Start the feed if nothing usable is running.
    ///
    /// No-op while connecting, open, or synthetic. An armed reconnect timer
    /// is cancelled in favour of an immediate attempt. A missing or unusable
    /// URL starts the synthetic generator instead of failing.
    pub fn connect(&self) {
        let mut lc = self.shared.lifecycle.lock();
        let state = lc.state;

        match state {
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Synthetic => {
                debug!(state = ?state, "Feed already active, connect ignored");
                return;
            }
            ConnectionState::ReconnectScheduled => {
                if let Some(timer) = lc.reconnect.take() {
                    timer.abort();
                }
            }
            ConnectionState::Errored | ConnectionState::Closed => {
                // Supersede the session that is still winding down
                if let Some(tx) = lc.session_close.take() {
                    let _ = tx.send(());
                }
                lc.session = None;
            }
            ConnectionState::Idle => {}
        }

        self.shared.start(&mut lc);
    }

    /// Stop everything and return to `Idle`. Idempotent.
    ///
    /// An armed reconnect timer is cancelled and can never fire afterwards.
    pub fn disconnect(&self) {
        let mut lc = self.shared.lifecycle.lock();
        lc.generation += 1;

        if let Some(timer) = lc.reconnect.take() {
            timer.abort();
        }
        if let Some(tx) = lc.session_close.take() {
            // Session sends a close frame and exits
            let _ = tx.send(());
        }
        lc.session = None;
        if let Some(task) = lc.synthetic.take() {
            task.abort();
        }

        if lc.state != ConnectionState::Idle {
            self.shared.set_state(&mut lc, ConnectionState::Idle);
            info!("Feed disconnected");
        }
    }

    pub fn subscribe(&self, topic: &str, handler: Handler) {
        self.shared.router.subscribe(topic, handler);
    }

    pub fn unsubscribe(&self, topic: &str, handler: &Handler) -> usize {
        self.shared.router.unsubscribe(topic, handler)
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.shared.router
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lifecycle.lock().state
    }

    /// Receiver that observes every state transition
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn metrics(&self) -> &FeedMetrics {
        &self.shared.metrics
    }
}

impl Shared {
    fn set_state(&self, lc: &mut Lifecycle, state: ConnectionState) {
        lc.state = state;
        self.state_tx.send_replace(state);
        debug!(state = ?state, "Feed state changed");
    }

    /// Move to `state` if `generation` is still current
    fn transition(&self, generation: u64, state: ConnectionState) -> bool {
        let mut lc = self.lifecycle.lock();
        if lc.generation != generation {
            return false;
        }
        self.set_state(&mut lc, state);
        true
    }

    fn endpoint(&self) -> Result<Endpoint, TransportError> {
        match self.feed.url.as_deref() {
            Some(url) => Endpoint::parse(url),
            None => Err(TransportError::InvalidEndpoint(
                "no feed URL configured".to_string(),
            )),
        }
    }

    /// Begin a real attempt, or fall back when no transport can be built
    fn start(self: &Arc<Self>, lc: &mut Lifecycle) {
        match self.endpoint() {
            Ok(endpoint) => self.begin_attempt(lc, endpoint),
            Err(e) => {
                warn!(error = %e, "Live transport unavailable");
                self.start_synthetic(lc);
            }
        }
    }

    fn begin_attempt(self: &Arc<Self>, lc: &mut Lifecycle, endpoint: Endpoint) {
        lc.generation += 1;
        let generation = lc.generation;

        let (close_tx, close_rx) = oneshot::channel();
        lc.session_close = Some(close_tx);
        self.set_state(lc, ConnectionState::Connecting);
        self.metrics.record_attempt();

        info!(endpoint = %endpoint, "Connecting to live feed");
        lc.session = Some(tokio::spawn(run_session(
            Arc::clone(self),
            endpoint,
            generation,
            close_rx,
        )));
    }

    fn start_synthetic(&self, lc: &mut Lifecycle) {
        lc.generation += 1;

        if !self.fallback.enabled {
            warn!("Synthetic fallback disabled, feed stays idle");
            self.set_state(lc, ConnectionState::Idle);
            return;
        }

        let fleet = match SyntheticFleet::new(&self.fallback) {
            Ok(fleet) => fleet,
            Err(e) => {
                warn!(error = %e, "Synthetic fallback misconfigured, feed stays idle");
                self.set_state(lc, ConnectionState::Idle);
                return;
            }
        };

        lc.synthetic = Some(tokio::spawn(run_synthetic_feed(
            Arc::clone(&self.router),
            self.metrics.clone(),
            fleet,
            self.fallback.clone(),
        )));
        self.set_state(lc, ConnectionState::Synthetic);
    }

    /// Connection for `generation` is gone: arm exactly one reconnect timer
    fn on_closed(self: &Arc<Self>, generation: u64) {
        let mut lc = self.lifecycle.lock();
        if lc.generation != generation {
            return;
        }

        lc.session_close = None;
        lc.session = None;
        self.set_state(&mut lc, ConnectionState::Closed);

        let delay = self.feed.reconnect_delay();
        let shared = Arc::clone(self);
        lc.reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.fire_reconnect(generation);
        }));
        self.metrics.record_reconnect_scheduled();
        self.set_state(&mut lc, ConnectionState::ReconnectScheduled);

        info!(delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
    }

    fn fire_reconnect(self: &Arc<Self>, generation: u64) {
        let mut lc = self.lifecycle.lock();
        if lc.generation != generation || lc.state != ConnectionState::ReconnectScheduled {
            return;
        }

        // This is the timer task itself; just forget the handle
        lc.reconnect = None;
        self.start(&mut lc);
    }

    /// Decode and route one inbound frame
    fn route_frame(&self, frame: Frame) -> Result<DispatchReport, DecodeError> {
        let text = match frame {
            Frame::Text(text) => text,
            Frame::Binary(bytes) => String::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?,
        };
        self.router.route_text(&text)
    }

    fn handle_frame(&self, frame: Frame) {
        self.metrics.record_frame();
        match self.route_frame(frame) {
            Ok(report) => self.metrics.record_dispatch(report.failed),
            Err(e) => {
                self.metrics.record_dropped();
                warn!(error = %e, "Dropping feed frame");
            }
        }
    }
}

/// One connection attempt: open, pump frames until close/error, then hand
/// back to the lifecycle for a reconnect.
async fn run_session(
    shared: Arc<Shared>,
    endpoint: Endpoint,
    generation: u64,
    mut close_rx: oneshot::Receiver<()>,
) {
    let connect_timeout = shared.feed.connect_timeout();
    let opened = tokio::select! {
        biased;
        _ = &mut close_rx => return,
        result = timeout(connect_timeout, shared.transport.open(&endpoint)) => result,
    };

    let mut conn = match opened {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            warn!(endpoint = %endpoint, error = %e, "Feed connection failed");
            shared.on_closed(generation);
            return;
        }
        Err(_) => {
            warn!(
                endpoint = %endpoint,
                timeout_ms = connect_timeout.as_millis() as u64,
                "Feed connection timed out"
            );
            shared.on_closed(generation);
            return;
        }
    };

    if !shared.transition(generation, ConnectionState::Open) {
        let _ = conn.close().await;
        return;
    }
    info!(endpoint = %endpoint, "Live feed open");

    loop {
        tokio::select! {
            biased;
            _ = &mut close_rx => {
                if let Err(e) = conn.close().await {
                    debug!(error = %e, "Close handshake failed");
                }
                return;
            }
            frame = conn.recv() => match frame {
                Some(Ok(frame)) => shared.handle_frame(frame),
                Some(Err(e)) => {
                    warn!(error = %e, "Feed transport error, forcing close");
                    if !shared.transition(generation, ConnectionState::Errored) {
                        return;
                    }
                    let _ = conn.close().await;
                    break;
                }
                None => {
                    info!("Live feed closed by peer");
                    break;
                }
            }
        }
    }

    shared.on_closed(generation);
}
