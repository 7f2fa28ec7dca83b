//! The data-access core of Muster.
//!
//! Wires six collaborators behind one [`RosterService`] facade:
//!
//! - [`query::QueryBuilder`] — filter normalization and canonical cache keys
//! - [`reader::CacheAsideReader`] — cache-aside list and single-record reads
//! - [`writer::WriteInvalidator`] — store-first writes with bulk eviction
//! - [`loader::CreatorLoader`] — request-scoped batched creator resolution
//! - [`authz`] — role/ownership/field authorization policies
//! - [`stats::StatsAggregator`] — roster-wide derived metrics
//!
//! The service is constructed once at process start with `Arc` handles to
//! a [`muster_core::store::RecordStore`] and a
//! [`muster_core::store::CacheStore`]; request handlers receive it by
//! reference. Nothing in this crate holds global mutable state.

pub mod authz;
pub mod loader;
pub mod query;
pub mod reader;
pub mod service;
pub mod stats;
pub mod writer;

pub use service::{RosterService, ServiceConfig};
