//! [`CacheAsideReader`] — check the cache, fall back to the store,
//! populate on miss.
//!
//! A cache hit is returned unchanged with no re-validation against the
//! live store; staleness is bounded by the entry TTL plus the write
//! path's eviction. Cache trouble of any kind (missing backend, corrupt
//! payload) degrades to a direct store read with a logged warning and is
//! never surfaced to the caller.

use std::{sync::Arc, time::Duration};

use futures_util::future::join_all;
use muster_core::{
  Error, Result,
  person::{PersonRecord, RecordView},
  query::PageEnvelope,
  store::{CacheStore, RecordStore},
};
use uuid::Uuid;

use crate::{
  loader::CreatorLoader,
  query::{ListPlan, record_cache_key},
};

pub struct CacheAsideReader<S, C> {
  store:      Arc<S>,
  cache:      Arc<C>,
  list_ttl:   Duration,
  record_ttl: Duration,
}

impl<S, C> CacheAsideReader<S, C>
where
  S: RecordStore,
  S::Error: Into<Error>,
  C: CacheStore,
{
  pub fn new(
    store: Arc<S>,
    cache: Arc<C>,
    list_ttl: Duration,
    record_ttl: Duration,
  ) -> Self {
    Self { store, cache, list_ttl, record_ttl }
  }

  /// Serve a list request, preferring the cached envelope.
  pub async fn list(
    &self,
    plan: &ListPlan,
    loader: &CreatorLoader<S>,
  ) -> Result<PageEnvelope<RecordView>> {
    if let Some(cached) = self.lookup(&plan.cache_key).await {
      return Ok(cached);
    }

    // Page slice and total are independent store queries; the envelope
    // math needs both.
    let records = self
      .store
      .find(
        &plan.query,
        &plan.sort,
        plan.page.skip(),
        plan.page.limit as u64,
      )
      .await
      .map_err(Into::into)?;
    let total = self.store.count(&plan.query).await.map_err(Into::into)?;

    let views = expand_views(loader, records).await?;
    let envelope =
      PageEnvelope::new(views, total, plan.page.page, plan.page.limit);

    self.populate(&plan.cache_key, &envelope, self.list_ttl).await;
    Ok(envelope)
  }

  /// Serve a single-record read under its dedicated per-id key.
  ///
  /// A miss on the store itself is [`Error::NotFound`] and is not
  /// cached: absence of a key is indistinguishable from a cache miss,
  /// and negative caching would mask a subsequent successful create.
  pub async fn get(
    &self,
    id: Uuid,
    loader: &CreatorLoader<S>,
  ) -> Result<RecordView> {
    let key = record_cache_key(id);
    if let Some(cached) = self.lookup::<RecordView>(&key).await {
      return Ok(cached);
    }

    let record = self
      .store
      .find_by_id(id)
      .await
      .map_err(Into::into)?
      .ok_or(Error::NotFound(id))?;

    let creator = loader.load(record.created_by).await?;
    let view = RecordView::new(record, creator);

    self.populate(&key, &view, self.record_ttl).await;
    Ok(view)
  }

  async fn lookup<T: serde::de::DeserializeOwned>(
    &self,
    key: &str,
  ) -> Option<T> {
    let raw = self.cache.get(key).await?;
    match serde_json::from_str(&raw) {
      Ok(value) => {
        tracing::debug!(key, "cache hit");
        Some(value)
      }
      Err(err) => {
        tracing::warn!(key, error = %err, "corrupt cache entry, treating as miss");
        None
      }
    }
  }

  async fn populate<T: serde::Serialize>(
    &self,
    key: &str,
    value: &T,
    ttl: Duration,
  ) {
    match serde_json::to_string(value) {
      Ok(json) => self.cache.set(key, json, ttl).await,
      Err(err) => {
        tracing::warn!(key, error = %err, "failed to serialize cache entry");
      }
    }
  }
}

/// Resolve the creator of every record through the loader; duplicated
/// creators collapse into one batched store call.
pub(crate) async fn expand_views<S>(
  loader: &CreatorLoader<S>,
  records: Vec<PersonRecord>,
) -> Result<Vec<RecordView>>
where
  S: RecordStore,
  S::Error: Into<Error>,
{
  let creators =
    join_all(records.iter().map(|r| loader.load(r.created_by))).await;

  records
    .into_iter()
    .zip(creators)
    .map(|(record, creator)| Ok(RecordView::new(record, creator?)))
    .collect()
}
