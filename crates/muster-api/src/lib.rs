//! JSON HTTP layer for Muster.
//!
//! Exposes an axum [`Router`] backed by any
//! [`muster_core::store::RecordStore`] and
//! [`muster_core::store::CacheStore`] pair. TLS and process concerns
//! are the binary's responsibility.

pub mod auth;
pub mod error;
pub mod identities;
pub mod records;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use muster_core::{
  Error,
  store::{CacheStore, RecordStore},
};
use muster_service::RosterService;
use serde::Deserialize;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` (with
/// `MUSTER_*` environment overrides).
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  /// Bootstrap admin identity, created on startup if missing.
  pub admin_email:         String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub admin_password_hash: String,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, C> {
  pub service: Arc<RosterService<S, C>>,
  /// Direct store handle for the authentication boundary.
  pub store:   Arc<S>,
}

impl<S, C> Clone for AppState<S, C> {
  fn clone(&self) -> Self {
    Self {
      service: Arc::clone(&self.service),
      store:   Arc::clone(&self.store),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for the given state.
pub fn router<S, C>(state: AppState<S, C>) -> Router
where
  S: RecordStore + 'static,
  S::Error: Into<Error>,
  C: CacheStore + 'static,
{
  Router::new()
    .route(
      "/records",
      get(records::list::<S, C>).post(records::create::<S, C>),
    )
    .route("/records/search", get(records::search::<S, C>))
    .route("/records/stats", get(records::stats::<S, C>))
    .route("/records/bulk-update", post(records::bulk_update::<S, C>))
    .route(
      "/records/{id}",
      get(records::get_one::<S, C>)
        .patch(records::update::<S, C>)
        .delete(records::delete::<S, C>),
    )
    .route(
      "/records/{id}/attendance",
      post(records::mark_attendance::<S, C>),
    )
    .route("/identities", post(identities::register::<S, C>))
    .with_state(state)
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use muster_cache::MemoryCache;
  use muster_core::{
    identity::{NewIdentity, Role},
    store::RecordStore as _,
  };
  use muster_service::ServiceConfig;
  use muster_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  async fn make_state(password: &str) -> AppState<SqliteStore, MemoryCache> {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    store
      .insert_identity(NewIdentity {
        email:         "admin@example.com".into(),
        password_hash: auth::hash_password(password).unwrap(),
        role:          Role::Admin,
        person_id:     None,
      })
      .await
      .unwrap();

    let cache = Arc::new(MemoryCache::new());
    let service = Arc::new(RosterService::new(
      Arc::clone(&store),
      cache,
      ServiceConfig::default(),
    ));
    AppState { service, store }
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn oneshot_raw(
    state:   AppState<SqliteStore, MemoryCache>,
    method:  &str,
    uri:     &str,
    auth:    Option<&str>,
    body:    Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    let req = match body {
      Some(v) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(v.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };

    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
  }

  fn jane_body() -> Value {
    json!({
      "first_name": "Jane",
      "last_name": "Smith",
      "email": "jane@x.com",
      "age": 28,
      "class_group": "Grade 10",
      "subjects": ["Math"],
    })
  }

  // ── Auth ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn unauthenticated_requests_return_401() {
    let state = make_state("secret").await;
    let req = Request::builder()
      .method("GET")
      .uri("/records")
      .body(Body::empty())
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  #[tokio::test]
  async fn wrong_password_returns_401() {
    let state = make_state("secret").await;
    let (status, body) = oneshot_raw(
      state,
      "GET",
      "/records",
      Some(&basic("admin@example.com", "wrong")),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");
  }

  // ── Records ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_and_list_roundtrip() {
    let state = make_state("secret").await;
    let auth = basic("admin@example.com", "secret");

    let (status, created) = oneshot_raw(
      state.clone(),
      "POST",
      "/records",
      Some(&auth),
      Some(jane_body()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["code"], "PER-0001");
    assert_eq!(created["email"], "jane@x.com");

    let (status, listed) =
      oneshot_raw(state, "GET", "/records", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["record"]["code"], "PER-0001");
    assert_eq!(
      listed["items"][0]["creator"]["email"],
      "admin@example.com"
    );
  }

  #[tokio::test]
  async fn duplicate_email_returns_409() {
    let state = make_state("secret").await;
    let auth = basic("admin@example.com", "secret");

    oneshot_raw(
      state.clone(),
      "POST",
      "/records",
      Some(&auth),
      Some(jane_body()),
    )
    .await;
    let (status, body) =
      oneshot_raw(state, "POST", "/records", Some(&auth), Some(jane_body()))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "duplicate_key");
  }

  #[tokio::test]
  async fn semantic_validation_returns_400() {
    let state = make_state("secret").await;
    let auth = basic("admin@example.com", "secret");

    let mut body = jane_body();
    body["age"] = json!(10);
    let (status, body) =
      oneshot_raw(state, "POST", "/records", Some(&auth), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
  }

  #[tokio::test]
  async fn get_unknown_record_returns_404() {
    let state = make_state("secret").await;
    let auth = basic("admin@example.com", "secret");
    let (status, body) = oneshot_raw(
      state,
      "GET",
      &format!("/records/{}", uuid::Uuid::new_v4()),
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
  }

  // ── Member authorization over HTTP ──────────────────────────────────────

  #[tokio::test]
  async fn member_update_is_field_gated() {
    let state = make_state("secret").await;
    let admin = basic("admin@example.com", "secret");

    let (_, created) = oneshot_raw(
      state.clone(),
      "POST",
      "/records",
      Some(&admin),
      Some(jane_body()),
    )
    .await;
    let person_id = created["person_id"].as_str().unwrap().to_owned();

    // Register a member identity owning Jane's record.
    let (status, _) = oneshot_raw(
      state.clone(),
      "POST",
      "/identities",
      Some(&admin),
      Some(json!({
        "email": "jane@member.example.com",
        "password": "memberpass",
        "role": "member",
        "person_id": person_id,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let member = basic("jane@member.example.com", "memberpass");

    // Allowed field.
    let (status, updated) = oneshot_raw(
      state.clone(),
      "PATCH",
      &format!("/records/{person_id}"),
      Some(&member),
      Some(json!({"subjects": ["Chemistry"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["subjects"][0], "Chemistry");

    // Field outside the allow-list.
    let (status, body) = oneshot_raw(
      state.clone(),
      "PATCH",
      &format!("/records/{person_id}"),
      Some(&member),
      Some(json!({"salary": 90000.0})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");

    // Roster-wide reads are admin-only.
    let (status, _) = oneshot_raw(
      state.clone(),
      "GET",
      "/records/stats",
      Some(&member),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Identity registration is admin-only too.
    let (status, _) = oneshot_raw(
      state,
      "POST",
      "/identities",
      Some(&member),
      Some(json!({
        "email": "rogue@example.com",
        "password": "password1",
        "role": "admin",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
  }

  // ── Soft delete / attendance / stats ────────────────────────────────────

  #[tokio::test]
  async fn soft_delete_moves_record_out_of_default_scope() {
    let state = make_state("secret").await;
    let auth = basic("admin@example.com", "secret");

    let (_, created) = oneshot_raw(
      state.clone(),
      "POST",
      "/records",
      Some(&auth),
      Some(jane_body()),
    )
    .await;
    let person_id = created["person_id"].as_str().unwrap().to_owned();

    let (status, deleted) = oneshot_raw(
      state.clone(),
      "DELETE",
      &format!("/records/{person_id}"),
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["is_active"], false);

    let (_, active) =
      oneshot_raw(state.clone(), "GET", "/records", Some(&auth), None).await;
    assert_eq!(active["total"], 0);

    let (_, inactive) = oneshot_raw(
      state,
      "GET",
      "/records?is_active=false",
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(inactive["total"], 1);
  }

  #[tokio::test]
  async fn attendance_marks_accumulate_into_the_rate() {
    let state = make_state("secret").await;
    let auth = basic("admin@example.com", "secret");

    let (_, created) = oneshot_raw(
      state.clone(),
      "POST",
      "/records",
      Some(&auth),
      Some(jane_body()),
    )
    .await;
    let person_id = created["person_id"].as_str().unwrap().to_owned();

    for (date, status) in [
      ("2024-09-02", "present"),
      ("2024-09-03", "present"),
      ("2024-09-04", "present"),
      ("2024-09-05", "absent"),
    ] {
      let (code, _) = oneshot_raw(
        state.clone(),
        "POST",
        &format!("/records/{person_id}/attendance"),
        Some(&auth),
        Some(json!({"date": date, "status": status})),
      )
      .await;
      assert_eq!(code, StatusCode::OK);
    }

    let (_, view) = oneshot_raw(
      state,
      "GET",
      &format!("/records/{person_id}"),
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(view["attendance_rate"], 75.0);
    assert_eq!(view["record"]["attendance"].as_array().unwrap().len(), 4);
  }

  #[tokio::test]
  async fn stats_reports_roster_metrics() {
    let state = make_state("secret").await;
    let auth = basic("admin@example.com", "secret");

    oneshot_raw(
      state.clone(),
      "POST",
      "/records",
      Some(&auth),
      Some(jane_body()),
    )
    .await;

    let (status, stats) =
      oneshot_raw(state, "GET", "/records/stats", Some(&auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["active"], 1);
    assert_eq!(stats["inactive"], 0);
    assert_eq!(stats["average_age"], 28.0);
  }

  #[tokio::test]
  async fn search_is_reachable_for_admins() {
    let state = make_state("secret").await;
    let auth = basic("admin@example.com", "secret");

    oneshot_raw(
      state.clone(),
      "POST",
      "/records",
      Some(&auth),
      Some(jane_body()),
    )
    .await;

    let (status, found) = oneshot_raw(
      state,
      "GET",
      "/records/search?q=smith",
      Some(&auth),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["total"], 1);
  }
}
