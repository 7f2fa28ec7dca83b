//! Error type for `muster-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A stored column failed to decode into its domain type.
  #[error("column decode error: {0}")]
  Decode(String),

  /// A UNIQUE index rejected the write (email or code collision).
  #[error("duplicate key: {0}")]
  Duplicate(String),
}

/// Detect unique-constraint violations so they keep their taxonomy kind
/// instead of collapsing into a generic database error.
pub(crate) fn map_db_err(err: tokio_rusqlite::Error) -> Error {
  if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
    e,
    Some(msg),
  )) = &err
    && e.code == rusqlite::ErrorCode::ConstraintViolation
  {
    return Error::Duplicate(msg.clone());
  }
  Error::Database(err)
}

impl From<Error> for muster_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Duplicate(msg) => muster_core::Error::DuplicateKey(msg),
      other => {
        // Driver detail goes to the log; callers get the taxonomy kind.
        tracing::error!(error = %other, "record store operation failed");
        muster_core::Error::StoreUnavailable(
          "record store operation failed".into(),
        )
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
