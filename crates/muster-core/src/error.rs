//! The shared error taxonomy for `muster`.
//!
//! Every operation in the service surfaces one of these kinds. Cache
//! degradation is deliberately absent: cache failures are absorbed where
//! they occur and logged, never returned to a caller.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// No verified caller identity was supplied with the request.
  #[error("authentication required")]
  Unauthenticated,

  /// The caller is authenticated but the role/ownership rules deny the
  /// operation. Never transient; never retried.
  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("record not found: {0}")]
  NotFound(Uuid),

  /// Email or sequential-code collision. Raised before the store write
  /// where possible; the store's unique indexes back-stop races.
  #[error("duplicate key: {0}")]
  DuplicateKey(String),

  /// A semantic validation failure (range, emptiness, allow-list).
  #[error("validation failed: {0}")]
  Validation(String),

  /// The record store is unreachable or rejected the operation. Driver
  /// detail goes to the log, not to the caller.
  #[error("record store unavailable: {0}")]
  StoreUnavailable(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl Error {
  /// Stable machine-readable discriminant, carried alongside the
  /// human-readable message in every user-visible error.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Unauthenticated => "unauthenticated",
      Self::Forbidden(_) => "forbidden",
      Self::NotFound(_) => "not_found",
      Self::DuplicateKey(_) => "duplicate_key",
      Self::Validation(_) => "validation",
      Self::StoreUnavailable(_) => "store_unavailable",
      Self::Internal(_) => "internal",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
