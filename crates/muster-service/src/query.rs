//! [`QueryBuilder`] — filter normalization and canonical cache keys.
//!
//! Two logically identical list requests must hit the same cache entry.
//! Normalizing into the typed [`RecordQuery`] fixes field order, drops
//! empty predicates and lowercases the email predicate; the cache key is
//! then a SHA-256 over the canonical JSON of (query, sort, page).

use muster_core::{
  Error, Result,
  query::{FilterSpec, PageSpec, RecordQuery, SortSpec},
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Namespace for cached list envelopes; evicted wholesale on any write.
pub const LIST_KEY_PREFIX: &str = "record-list:";

/// Namespace for cached single records.
pub const RECORD_KEY_PREFIX: &str = "record:";

/// Cache key for a single record.
pub fn record_cache_key(id: Uuid) -> String {
  format!("{RECORD_KEY_PREFIX}{id}")
}

/// A validated, normalized list request with its cache key.
#[derive(Debug, Clone)]
pub struct ListPlan {
  pub query:     RecordQuery,
  pub sort:      SortSpec,
  pub page:      PageSpec,
  pub cache_key: String,
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
  max_page_size: u32,
}

impl QueryBuilder {
  pub fn new(max_page_size: u32) -> Self { Self { max_page_size } }

  /// Normalize a list request and derive its cache key.
  pub fn plan(
    &self,
    filter: &FilterSpec,
    sort: SortSpec,
    page: PageSpec,
  ) -> Result<ListPlan> {
    self.validate_page(&page)?;
    let query = normalize(filter);
    let cache_key = list_cache_key(&query, &sort, &page);
    Ok(ListPlan { query, sort, page, cache_key })
  }

  /// Reject out-of-range pagination before any store work.
  pub fn validate_page(&self, page: &PageSpec) -> Result<()> {
    if page.page < 1 {
      return Err(Error::Validation(format!(
        "page must be at least 1, got {}",
        page.page
      )));
    }
    if page.limit < 1 || page.limit > self.max_page_size {
      return Err(Error::Validation(format!(
        "limit must be between 1 and {}, got {}",
        self.max_page_size, page.limit
      )));
    }
    Ok(())
  }
}

/// Only non-empty predicates contribute; the active-only default applies
/// unless the filter overrides it explicitly.
fn normalize(filter: &FilterSpec) -> RecordQuery {
  fn clean(value: &Option<String>) -> Option<String> {
    value
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_owned)
  }

  RecordQuery {
    name_contains:  clean(&filter.name),
    email_contains: clean(&filter.email).map(|e| e.to_lowercase()),
    class_group:    clean(&filter.class_group),
    department:     clean(&filter.department),
    age_min:        filter.age_min,
    age_max:        filter.age_max,
    subject:        clean(&filter.subject),
    is_active:      Some(filter.is_active.unwrap_or(true)),
  }
}

fn list_cache_key(
  query: &RecordQuery,
  sort: &SortSpec,
  page: &PageSpec,
) -> String {
  // Typed structs serialize with a fixed field order, so this JSON is
  // canonical for a logical request.
  let canonical = serde_json::json!({
    "query": query,
    "sort": sort,
    "page": page,
  });

  let mut hasher = Sha256::new();
  hasher.update(canonical.to_string().as_bytes());
  format!("{LIST_KEY_PREFIX}{}", hex::encode(hasher.finalize()))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
