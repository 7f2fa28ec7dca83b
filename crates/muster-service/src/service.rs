//! [`RosterService`] — the operation facade.
//!
//! Every operation runs the same gauntlet: authenticate, authorize
//! through the role policy, then delegate to the read or write path. A
//! fresh [`CreatorLoader`] is constructed per operation so batched
//! lookups never cross a request boundary.

use std::{sync::Arc, time::Duration};

use muster_core::{
  Error, Result,
  identity::Principal,
  person::{
    NewAttendanceEntry, NewPersonRecord, PersonRecord, RecordPatch,
    RecordView,
  },
  query::{FilterSpec, PageEnvelope, PageSpec, SortSpec},
  store::{CacheStore, RecordStore},
};
use uuid::Uuid;

use crate::{
  authz::{RosterAction, policy_for, require_authenticated},
  loader::CreatorLoader,
  query::QueryBuilder,
  reader::{CacheAsideReader, expand_views},
  stats::{RosterStats, StatsAggregator},
  writer::WriteInvalidator,
};

/// Construction-time tuning for the service core.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
  /// TTL for cached list envelopes.
  pub list_cache_ttl:   Duration,
  /// TTL for cached single records.
  pub record_cache_ttl: Duration,
  pub max_page_size:    u32,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      list_cache_ttl:   Duration::from_secs(300),
      record_cache_ttl: Duration::from_secs(300),
      max_page_size:    100,
    }
  }
}

/// The roster operation surface. Constructed once at process start and
/// shared by reference across request handlers.
pub struct RosterService<S, C> {
  store:   Arc<S>,
  queries: QueryBuilder,
  reader:  CacheAsideReader<S, C>,
  writer:  WriteInvalidator<S, C>,
  stats:   StatsAggregator<S>,
}

impl<S, C> RosterService<S, C>
where
  S: RecordStore,
  S::Error: Into<Error>,
  C: CacheStore,
{
  pub fn new(store: Arc<S>, cache: Arc<C>, config: ServiceConfig) -> Self {
    Self {
      queries: QueryBuilder::new(config.max_page_size),
      reader:  CacheAsideReader::new(
        Arc::clone(&store),
        Arc::clone(&cache),
        config.list_cache_ttl,
        config.record_cache_ttl,
      ),
      writer:  WriteInvalidator::new(Arc::clone(&store), Arc::clone(&cache)),
      stats:   StatsAggregator::new(Arc::clone(&store)),
      store,
    }
  }

  /// One loader per operation: request isolation for batched lookups.
  fn loader(&self) -> CreatorLoader<S> {
    CreatorLoader::new(Arc::clone(&self.store))
  }

  // ── Reads ───────────────────────────────────────────────────────────────

  pub async fn list_records(
    &self,
    caller: Option<&Principal>,
    filter: &FilterSpec,
    sort: SortSpec,
    page: PageSpec,
  ) -> Result<PageEnvelope<RecordView>> {
    let caller = require_authenticated(caller)?;
    policy_for(caller.role).authorize_roster(caller, RosterAction::List)?;

    let plan = self.queries.plan(filter, sort, page)?;
    let loader = self.loader();
    self.reader.list(&plan, &loader).await
  }

  pub async fn get_record(
    &self,
    caller: Option<&Principal>,
    id: Uuid,
  ) -> Result<RecordView> {
    let caller = require_authenticated(caller)?;
    policy_for(caller.role).authorize_read(caller, id)?;

    let loader = self.loader();
    self.reader.get(id, &loader).await
  }

  pub async fn search_records(
    &self,
    caller: Option<&Principal>,
    text: &str,
    page: PageSpec,
  ) -> Result<PageEnvelope<RecordView>> {
    let caller = require_authenticated(caller)?;
    policy_for(caller.role).authorize_roster(caller, RosterAction::Search)?;
    self.queries.validate_page(&page)?;

    let text = text.trim();
    if text.is_empty() {
      return Err(Error::Validation("search text must not be empty".into()));
    }

    let (records, total) = self
      .store
      .text_search(text, page.skip(), page.limit as u64)
      .await
      .map_err(Into::into)?;

    let loader = self.loader();
    let views = expand_views(&loader, records).await?;
    Ok(PageEnvelope::new(views, total, page.page, page.limit))
  }

  pub async fn get_stats(
    &self,
    caller: Option<&Principal>,
  ) -> Result<RosterStats> {
    let caller = require_authenticated(caller)?;
    policy_for(caller.role).authorize_roster(caller, RosterAction::Stats)?;

    self.stats.collect().await
  }

  // ── Writes ──────────────────────────────────────────────────────────────

  pub async fn create_record(
    &self,
    caller: Option<&Principal>,
    new: NewPersonRecord,
  ) -> Result<PersonRecord> {
    let caller = require_authenticated(caller)?;
    policy_for(caller.role).authorize_roster(caller, RosterAction::Create)?;

    self.writer.create(new, caller.identity_id).await
  }

  pub async fn update_record(
    &self,
    caller: Option<&Principal>,
    id: Uuid,
    patch: RecordPatch,
  ) -> Result<PersonRecord> {
    let caller = require_authenticated(caller)?;
    policy_for(caller.role).authorize_update(caller, id, &patch.fields())?;

    self.writer.update(id, patch).await
  }

  pub async fn delete_record(
    &self,
    caller: Option<&Principal>,
    id: Uuid,
  ) -> Result<PersonRecord> {
    let caller = require_authenticated(caller)?;
    policy_for(caller.role).authorize_roster(caller, RosterAction::Delete)?;

    self.writer.soft_delete(id).await
  }

  pub async fn mark_attendance(
    &self,
    caller: Option<&Principal>,
    id: Uuid,
    entry: NewAttendanceEntry,
  ) -> Result<PersonRecord> {
    let caller = require_authenticated(caller)?;
    policy_for(caller.role)
      .authorize_roster(caller, RosterAction::MarkAttendance)?;

    self.writer.append_attendance(id, entry).await
  }

  pub async fn bulk_update_records(
    &self,
    caller: Option<&Principal>,
    ids: &[Uuid],
    patch: RecordPatch,
  ) -> Result<u64> {
    let caller = require_authenticated(caller)?;
    policy_for(caller.role)
      .authorize_roster(caller, RosterAction::BulkUpdate)?;

    self.writer.bulk_update(ids, patch).await
  }
}
