//! In-process [`CacheStore`] backend for Muster.
//!
//! A single shared instance serves every request in the process, which
//! matches the system's consistency model: one cache, one record store,
//! staleness bounded by TTL plus explicit invalidation.

mod memory;

pub use memory::{CacheMetricsSnapshot, MemoryCache};
