// Live feed connection management

mod manager;
pub mod metrics;
pub mod synthetic;
pub mod transport;

pub use manager::{ConnectionState, LiveFeed};
pub use metrics::{FeedMetrics, FeedMetricsSnapshot};
pub use synthetic::SyntheticFleet;
pub use transport::{Connection, Endpoint, Frame, Transport, TransportError, WsTransport};
