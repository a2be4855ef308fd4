// Configuration loading and environment overrides
pub mod config;

// Wire envelope, event model and validation
pub mod event;

// Live feed connection management and synthetic fallback
pub mod feed;

// Fleet snapshot and dashboard aggregates
pub mod state;

// Topic-based event routing
pub mod subscription;
