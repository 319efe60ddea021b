//! Upstream shielding: TTL cache, request coalescing, and the composed
//! feed cache the aggregator and passthrough handlers read through.

mod feed_cache;
mod single_flight;
mod ttl;

pub use feed_cache::FeedCache;
pub use single_flight::SingleFlight;
pub use ttl::TtlCache;
