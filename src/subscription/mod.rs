// Topic-based event routing

pub mod router;

pub use router::{handler, DispatchReport, EventRouter, Handler};
