//! Query, sort, pagination and page-envelope types.
//!
//! [`FilterSpec`] is the caller-facing filter; [`RecordQuery`] is its
//! normalized form, produced by the service's query builder and consumed
//! by the store. Keeping the normalized form a typed struct makes cache
//! keys canonical: field order cannot vary.

use serde::{Deserialize, Serialize};

// ─── Filter ──────────────────────────────────────────────────────────────────

/// Caller-facing list filter. All predicates are optional and conjoined.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
  /// Substring match over first and last name.
  pub name:        Option<String>,
  /// Substring match over email.
  pub email:       Option<String>,
  pub class_group: Option<String>,
  pub department:  Option<String>,
  pub age_min:     Option<u8>,
  pub age_max:     Option<u8>,
  /// Records whose subject set contains this value.
  pub subject:     Option<String>,
  /// Explicit override of the default active-only scope.
  pub is_active:   Option<bool>,
}

/// The normalized store query. Only non-empty predicates are present;
/// `is_active` carries the active-only default unless overridden.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordQuery {
  pub name_contains:  Option<String>,
  pub email_contains: Option<String>,
  pub class_group:    Option<String>,
  pub department:     Option<String>,
  pub age_min:        Option<u8>,
  pub age_max:        Option<u8>,
  pub subject:        Option<String>,
  pub is_active:      Option<bool>,
}

// ─── Sort ────────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
  #[default]
  CreatedAt,
  Name,
  Age,
  Email,
  Code,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
  Asc,
  #[default]
  Desc,
}

/// Sort specification; defaults to creation time descending.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub struct SortSpec {
  pub field:     SortField,
  pub direction: SortDirection,
}

// ─── Pagination ──────────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpec {
  pub page:  u32,
  pub limit: u32,
}

impl Default for PageSpec {
  fn default() -> Self {
    Self { page: 1, limit: DEFAULT_PAGE_SIZE }
  }
}

impl PageSpec {
  /// Number of records to skip for this page.
  pub fn skip(&self) -> u64 { (self.page as u64 - 1) * self.limit as u64 }
}

// ─── Envelope ────────────────────────────────────────────────────────────────

/// A page of results with derived pagination metadata.
///
/// Invariants: `pages = ceil(total / limit)`,
/// `has_next_page = page < pages`, `has_prev_page = page > 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageEnvelope<T> {
  pub items:         Vec<T>,
  pub total:         u64,
  pub page:          u32,
  pub limit:         u32,
  pub pages:         u32,
  pub has_next_page: bool,
  pub has_prev_page: bool,
}

impl<T> PageEnvelope<T> {
  /// Compute the derived fields from the independent ones.
  /// `limit` must be positive — the query builder guarantees it.
  pub fn new(items: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
    let pages = total.div_ceil(limit as u64) as u32;
    Self {
      items,
      total,
      page,
      limit,
      pages,
      has_next_page: page < pages,
      has_prev_page: page > 1,
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn envelope_pages_is_ceiling_division() {
    let env = PageEnvelope::<u32>::new(vec![], 21, 1, 10);
    assert_eq!(env.pages, 3);
    let env = PageEnvelope::<u32>::new(vec![], 20, 1, 10);
    assert_eq!(env.pages, 2);
    let env = PageEnvelope::<u32>::new(vec![], 0, 1, 10);
    assert_eq!(env.pages, 0);
  }

  #[test]
  fn envelope_boundaries() {
    // First of three pages: next but no previous.
    let env = PageEnvelope::<u32>::new(vec![], 25, 1, 10);
    assert!(env.has_next_page);
    assert!(!env.has_prev_page);

    // Middle page: both.
    let env = PageEnvelope::<u32>::new(vec![], 25, 2, 10);
    assert!(env.has_next_page);
    assert!(env.has_prev_page);

    // Last page (page == pages): previous but no next.
    let env = PageEnvelope::<u32>::new(vec![], 25, 3, 10);
    assert!(!env.has_next_page);
    assert!(env.has_prev_page);
  }

  #[test]
  fn empty_result_has_neither_direction() {
    let env = PageEnvelope::<u32>::new(vec![], 0, 1, 10);
    assert!(!env.has_next_page);
    assert!(!env.has_prev_page);
  }

  #[test]
  fn page_spec_skip() {
    assert_eq!(PageSpec::default().skip(), 0);
    assert_eq!(PageSpec { page: 3, limit: 10 }.skip(), 20);
  }
}
