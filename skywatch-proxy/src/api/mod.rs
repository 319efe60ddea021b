//! HTTP API handlers

pub mod aggregate;
pub mod feeds;
pub mod health;

pub use aggregate::aggregate_routes;
pub use feeds::feed_routes;
pub use health::health_routes;
