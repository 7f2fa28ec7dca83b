//! [`WriteInvalidator`] — store-first writes with conservative eviction.
//!
//! Every mutation follows the same sequence: validate, write to the
//! record store, and only on confirmed success evict the affected
//! per-id keys plus the entire list namespace. Any write can change
//! which records satisfy some filter, so no dependency tracking is
//! attempted — false eviction is accepted, false retention is not.

use std::sync::Arc;

use muster_core::{
  Error, Result,
  person::{NewAttendanceEntry, NewPersonRecord, PersonRecord, RecordPatch},
  store::{CacheStore, RecordStore},
};
use uuid::Uuid;

use crate::query::{LIST_KEY_PREFIX, record_cache_key};

pub struct WriteInvalidator<S, C> {
  store: Arc<S>,
  cache: Arc<C>,
}

impl<S, C> WriteInvalidator<S, C>
where
  S: RecordStore,
  S::Error: Into<Error>,
  C: CacheStore,
{
  pub fn new(store: Arc<S>, cache: Arc<C>) -> Self { Self { store, cache } }

  /// Create a record. The email uniqueness pre-check runs before the
  /// store write so a duplicate has no store or cache effect; the
  /// store's UNIQUE index backstops the check under races.
  pub async fn create(
    &self,
    new: NewPersonRecord,
    created_by: Uuid,
  ) -> Result<PersonRecord> {
    let new = new.normalized()?;

    if self
      .store
      .find_by_email(&new.email)
      .await
      .map_err(Into::into)?
      .is_some()
    {
      return Err(Error::DuplicateKey(format!(
        "email {} is already in use",
        new.email
      )));
    }

    let record =
      self.store.insert(new, created_by).await.map_err(Into::into)?;
    self.evict(std::slice::from_ref(&record.person_id)).await;
    Ok(record)
  }

  /// Apply a field patch to one record.
  pub async fn update(
    &self,
    id: Uuid,
    patch: RecordPatch,
  ) -> Result<PersonRecord> {
    let patch = patch.normalized()?;
    if patch.is_empty() {
      return Err(Error::Validation("no fields to update".into()));
    }

    if let Some(email) = &patch.email
      && let Some(existing) =
        self.store.find_by_email(email).await.map_err(Into::into)?
      && existing.person_id != id
    {
      return Err(Error::DuplicateKey(format!(
        "email {email} is already in use"
      )));
    }

    let record = self
      .store
      .update_by_id(id, patch)
      .await
      .map_err(Into::into)?
      .ok_or(Error::NotFound(id))?;

    self.evict(std::slice::from_ref(&record.person_id)).await;
    Ok(record)
  }

  /// Soft-delete: flip `is_active`; the row, its email and its code
  /// remain so they can never be reused.
  pub async fn soft_delete(&self, id: Uuid) -> Result<PersonRecord> {
    let patch =
      RecordPatch { is_active: Some(false), ..RecordPatch::default() };
    let record = self
      .store
      .update_by_id(id, patch)
      .await
      .map_err(Into::into)?
      .ok_or(Error::NotFound(id))?;

    self.evict(std::slice::from_ref(&record.person_id)).await;
    Ok(record)
  }

  pub async fn append_attendance(
    &self,
    id: Uuid,
    entry: NewAttendanceEntry,
  ) -> Result<PersonRecord> {
    let record = self
      .store
      .append_attendance(id, entry)
      .await
      .map_err(Into::into)?
      .ok_or(Error::NotFound(id))?;

    self.evict(std::slice::from_ref(&record.person_id)).await;
    Ok(record)
  }

  /// Apply one patch to many records; returns the affected count.
  pub async fn bulk_update(
    &self,
    ids: &[Uuid],
    patch: RecordPatch,
  ) -> Result<u64> {
    if ids.is_empty() {
      return Err(Error::Validation("no record ids supplied".into()));
    }
    let patch = patch.normalized()?;
    if patch.is_empty() {
      return Err(Error::Validation("no fields to update".into()));
    }
    if patch.email.is_some() {
      // One email across many records is a guaranteed uniqueness
      // violation.
      return Err(Error::Validation("email cannot be bulk-updated".into()));
    }

    let affected =
      self.store.update_many(ids, &patch).await.map_err(Into::into)?;
    self.evict(ids).await;
    Ok(affected)
  }

  /// Evict every key a completed write could have staled: the per-id
  /// entries for the affected records and the whole list namespace.
  async fn evict(&self, ids: &[Uuid]) {
    for id in ids {
      self.cache.delete(&record_cache_key(*id)).await;
    }
    self.cache.delete_by_prefix(LIST_KEY_PREFIX).await;
  }
}
