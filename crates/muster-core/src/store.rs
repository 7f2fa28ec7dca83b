//! The `RecordStore` and `CacheStore` traits.
//!
//! `RecordStore` is implemented by persistence backends (e.g.
//! `muster-store-sqlite`); `CacheStore` by cache backends (e.g.
//! `muster-cache`). Higher layers depend on these abstractions, not on
//! any concrete backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (tokio with `axum`).

use std::{future::Future, time::Duration};

use uuid::Uuid;

use crate::{
  identity::{IdentityRecord, NewIdentity},
  person::{NewAttendanceEntry, NewPersonRecord, PersonRecord, RecordPatch},
  query::{RecordQuery, SortSpec},
};

// ─── Aggregation descriptors ─────────────────────────────────────────────────

/// A typed aggregation pipeline descriptor. The store executes it and
/// returns labelled rows; the stats aggregator interprets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateSpec {
  /// Rows: `("total", n)`, `("active", n)` over all records.
  RecordCounts,
  /// Row: `(None, avg)` — average age over all records, 0 when empty.
  AverageAge,
  /// Rows: `("total", n)`, `("present", n)` over all attendance entries.
  AttendanceTotals,
  /// One `(Some(department), n)` row per department with active records;
  /// records without a department are excluded.
  ActiveByDepartment,
}

/// One row of an aggregation result.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
  pub label: Option<String>,
  pub value: f64,
}

// ─── RecordStore ─────────────────────────────────────────────────────────────

/// Abstraction over the persistence backend for personnel and identity
/// records.
///
/// Single-record updates are atomic at the store. The backend's error
/// type converts into the core taxonomy ([`crate::Error`]) via `Into`,
/// which the service layer relies on.
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Person records — reads ────────────────────────────────────────────

  /// Fetch one page slice matching `query`, ordered by `sort`.
  fn find<'a>(
    &'a self,
    query: &'a RecordQuery,
    sort: &'a SortSpec,
    skip: u64,
    limit: u64,
  ) -> impl Future<Output = Result<Vec<PersonRecord>, Self::Error>> + Send + 'a;

  /// Count all records matching `query`, independent of pagination.
  fn count<'a>(
    &'a self,
    query: &'a RecordQuery,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Retrieve a record by id, active or not. `None` if absent.
  fn find_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<PersonRecord>, Self::Error>> + Send + '_;

  /// Exact-match lookup by (lowercased) email, active or not.
  fn find_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<PersonRecord>, Self::Error>> + Send + 'a;

  /// Free-text search over names, email, class, department and code.
  /// Returns the page slice and the total match count.
  fn text_search<'a>(
    &'a self,
    text: &'a str,
    skip: u64,
    limit: u64,
  ) -> impl Future<Output = Result<(Vec<PersonRecord>, u64), Self::Error>>
  + Send
  + 'a;

  // ── Person records — writes ───────────────────────────────────────────

  /// Persist a new record. The store assigns the id, the sequential code
  /// (atomic increment-and-read, race-safe under concurrent creates) and
  /// both timestamps.
  fn insert(
    &self,
    new: NewPersonRecord,
    created_by: Uuid,
  ) -> impl Future<Output = Result<PersonRecord, Self::Error>> + Send + '_;

  /// Apply a field patch atomically. `None` if the id has no record.
  fn update_by_id(
    &self,
    id: Uuid,
    patch: RecordPatch,
  ) -> impl Future<Output = Result<Option<PersonRecord>, Self::Error>> + Send + '_;

  /// Apply one patch to many records; returns the affected count.
  fn update_many<'a>(
    &'a self,
    ids: &'a [Uuid],
    patch: &'a RecordPatch,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Append an attendance entry. `None` if the id has no record.
  fn append_attendance(
    &self,
    id: Uuid,
    entry: NewAttendanceEntry,
  ) -> impl Future<Output = Result<Option<PersonRecord>, Self::Error>> + Send + '_;

  // ── Aggregation ───────────────────────────────────────────────────────

  fn aggregate(
    &self,
    spec: AggregateSpec,
  ) -> impl Future<Output = Result<Vec<AggregateRow>, Self::Error>> + Send + '_;

  // ── Identities ────────────────────────────────────────────────────────

  fn identity_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<IdentityRecord>, Self::Error>>
  + Send
  + 'a;

  /// Bulk lookup for the batching loader. Missing ids are simply absent
  /// from the result; the loader turns absence into an explicit `None`.
  fn identities_by_ids<'a>(
    &'a self,
    ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<IdentityRecord>, Self::Error>>
  + Send
  + 'a;

  fn insert_identity(
    &self,
    new: NewIdentity,
  ) -> impl Future<Output = Result<IdentityRecord, Self::Error>> + Send + '_;

  /// Stamp `last_login_at`; called by the auth boundary on verification.
  fn touch_last_login(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── CacheStore ──────────────────────────────────────────────────────────────

/// Abstraction over the key/value cache.
///
/// The interface is infallible by contract: implementations absorb
/// backend failures, log them, and present them as a miss (`get`) or a
/// no-op (writes). Cache unavailability must never surface as an
/// operation failure, only as extra latency.
pub trait CacheStore: Send + Sync {
  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Option<String>> + Send + 'a;

  fn set<'a>(
    &'a self,
    key: &'a str,
    value: String,
    ttl: Duration,
  ) -> impl Future<Output = ()> + Send + 'a;

  fn delete<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = ()> + Send + 'a;

  /// Evict every key beginning with `prefix` — the bulk-invalidation
  /// primitive the write path relies on.
  fn delete_by_prefix<'a>(
    &'a self,
    prefix: &'a str,
  ) -> impl Future<Output = ()> + Send + 'a;
}
