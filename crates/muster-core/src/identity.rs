//! Identities and the per-request caller principal.
//!
//! Identity records are owned by the authentication boundary; the core
//! reads only the role and the person back-reference. The password hash
//! never leaves that boundary: `IdentityRecord` has no serde derives and
//! only [`IdentitySummary`] is ever serialized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  Member,
}

/// A stored identity. Lives in the record store but belongs to the
/// authentication boundary.
#[derive(Debug, Clone)]
pub struct IdentityRecord {
  pub identity_id:   Uuid,
  /// Globally unique; stored lowercase.
  pub email:         String,
  /// Argon2 PHC string. Never serialized, never exposed.
  pub password_hash: String,
  pub role:          Role,
  pub is_active:     bool,
  /// Back-reference to the one PersonRecord this identity owns, if any.
  pub person_id:     Option<Uuid>,
  pub last_login_at: Option<DateTime<Utc>>,
}

/// Input to identity registration. The hash is produced by the auth
/// boundary before this struct is built.
#[derive(Debug, Clone)]
pub struct NewIdentity {
  pub email:         String,
  pub password_hash: String,
  pub role:          Role,
  pub person_id:     Option<Uuid>,
}

/// The identity shape the read path exposes — everything except the
/// credential and bookkeeping fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySummary {
  pub identity_id: Uuid,
  pub email:       String,
  pub role:        Role,
}

impl From<&IdentityRecord> for IdentitySummary {
  fn from(identity: &IdentityRecord) -> Self {
    Self {
      identity_id: identity.identity_id,
      email:       identity.email.clone(),
      role:        identity.role,
    }
  }
}

/// The verified caller, as supplied by the authentication boundary.
/// The core trusts this payload as-is.
#[derive(Debug, Clone)]
pub struct Principal {
  pub identity_id: Uuid,
  pub email:       String,
  pub role:        Role,
  /// The record this principal owns, if any. Ownership checks for
  /// member-role callers resolve against this.
  pub person_ref:  Option<Uuid>,
}

impl Principal {
  pub fn from_identity(identity: &IdentityRecord) -> Self {
    Self {
      identity_id: identity.identity_id,
      email:       identity.email.clone(),
      role:        identity.role,
      person_ref:  identity.person_id,
    }
  }
}
