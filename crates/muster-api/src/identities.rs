//! Handler for `POST /identities` — identity registration.
//!
//! This lives at the authentication boundary rather than in the service
//! core: the password is hashed here and only the PHC string crosses
//! into the store.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use muster_core::{
  Error,
  identity::{IdentitySummary, NewIdentity, Role},
  store::{CacheStore, RecordStore},
};
use muster_service::authz::{RosterAction, policy_for};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Caller, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub email:     String,
  pub password:  String,
  pub role:      Role,
  /// The record this identity will own, for member-role callers.
  pub person_id: Option<Uuid>,
}

/// `POST /identities` — admin only.
pub async fn register<S, C>(
  State(state): State<AppState<S, C>>,
  Caller(principal): Caller,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore + 'static,
  S::Error: Into<Error>,
  C: CacheStore + 'static,
{
  policy_for(principal.role)
    .authorize_roster(&principal, RosterAction::RegisterIdentity)?;

  if body.password.len() < 8 {
    return Err(ApiError(Error::Validation(
      "password must be at least 8 characters".into(),
    )));
  }

  let password_hash = crate::auth::hash_password(&body.password)
    .map_err(|e| ApiError(Error::Internal(format!("password hash: {e}"))))?;

  let identity = state
    .store
    .insert_identity(NewIdentity {
      email: body.email,
      password_hash,
      role: body.role,
      person_id: body.person_id,
    })
    .await
    .map_err(|e| ApiError(e.into()))?;

  Ok((StatusCode::CREATED, Json(IdentitySummary::from(&identity))))
}
