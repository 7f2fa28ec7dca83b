//! HTTP Basic-auth extractor backed by stored identities.
//!
//! Credentials are an identity email and password; verification is
//! argon2 against the stored PHC string. A verified request yields a
//! [`Principal`] and stamps the identity's `last_login_at`
//! (best-effort — a failed stamp never fails the request).
//!
//! [`hash_password`] and [`verify_password`] are standalone functions so
//! the hashing step of identity registration is directly testable.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use muster_core::{
  Error,
  identity::Principal,
  store::{CacheStore, RecordStore},
};
use rand_core::OsRng;

use crate::{AppState, error::ApiError};

/// Produce an argon2 PHC string for a new password.
pub fn hash_password(
  password: &str,
) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)?
      .to_string(),
  )
}

/// Verify a password against a stored PHC string. A malformed stored
/// hash verifies as false, never as an error.
pub fn verify_password(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc)
    .map(|hash| {
      Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok()
    })
    .unwrap_or(false)
}

/// The verified caller; present in a handler's signature means the
/// request was authenticated.
pub struct Caller(pub Principal);

fn unauthenticated() -> ApiError { ApiError(Error::Unauthenticated) }

/// Verify credentials directly from headers against the identity store.
pub async fn authenticate<S>(
  headers: &HeaderMap,
  store: &S,
) -> Result<Principal, ApiError>
where
  S: RecordStore,
  S::Error: Into<Error>,
{
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or_else(unauthenticated)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or_else(unauthenticated)?;

  let decoded = B64.decode(encoded).map_err(|_| unauthenticated())?;
  let creds =
    std::str::from_utf8(&decoded).map_err(|_| unauthenticated())?;

  let (email, password) =
    creds.split_once(':').ok_or_else(unauthenticated)?;

  let identity = store
    .identity_by_email(email)
    .await
    .map_err(|e| ApiError(e.into()))?
    .ok_or_else(unauthenticated)?;

  if !identity.is_active
    || !verify_password(password, &identity.password_hash)
  {
    return Err(unauthenticated());
  }

  if let Err(err) = store.touch_last_login(identity.identity_id).await {
    tracing::warn!(error = %err, "failed to stamp last login");
  }

  Ok(Principal::from_identity(&identity))
}

impl<S, C> FromRequestParts<AppState<S, C>> for Caller
where
  S: RecordStore + 'static,
  S::Error: Into<Error>,
  C: CacheStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, C>,
  ) -> Result<Self, Self::Rejection> {
    let principal = authenticate(&parts.headers, state.store.as_ref()).await?;
    Ok(Caller(principal))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_then_verify_roundtrip() {
    let hash = hash_password("secret").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("secret", &hash));
    assert!(!verify_password("wrong", &hash));
  }

  #[test]
  fn malformed_stored_hash_verifies_false() {
    assert!(!verify_password("secret", "not-a-phc-string"));
  }
}
