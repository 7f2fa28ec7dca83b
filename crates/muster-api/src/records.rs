//! Handlers for `/records` endpoints.
//!
//! | Method   | Path                       | Notes                        |
//! |----------|----------------------------|------------------------------|
//! | `GET`    | `/records`                 | Filter/sort/page params      |
//! | `POST`   | `/records`                 | Admin only                   |
//! | `GET`    | `/records/search`          | `?q=` free text, admin only  |
//! | `GET`    | `/records/stats`           | Admin only                   |
//! | `GET`    | `/records/:id`             | Owner or admin               |
//! | `PATCH`  | `/records/:id`             | Field-level authorization    |
//! | `DELETE` | `/records/:id`             | Soft delete, admin only      |
//! | `POST`   | `/records/:id/attendance`  | Admin only                   |
//! | `POST`   | `/records/bulk-update`     | Admin only                   |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use muster_core::{
  Error,
  person::{
    NewAttendanceEntry, NewPersonRecord, PersonRecord, RecordPatch,
    RecordView,
  },
  query::{
    FilterSpec, PageEnvelope, PageSpec, SortDirection, SortField, SortSpec,
  },
  store::{CacheStore, RecordStore},
};
use muster_service::stats::RosterStats;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::Caller, error::ApiError};

fn page_spec(page: Option<u32>, limit: Option<u32>) -> PageSpec {
  let defaults = PageSpec::default();
  PageSpec {
    page:  page.unwrap_or(defaults.page),
    limit: limit.unwrap_or(defaults.limit),
  }
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub name:        Option<String>,
  pub email:       Option<String>,
  pub class_group: Option<String>,
  pub department:  Option<String>,
  pub age_min:     Option<u8>,
  pub age_max:     Option<u8>,
  pub subject:     Option<String>,
  pub is_active:   Option<bool>,
  pub sort_by:     Option<SortField>,
  pub order:       Option<SortDirection>,
  pub page:        Option<u32>,
  pub limit:       Option<u32>,
}

/// `GET /records[?name=…&class_group=…&sort_by=…&page=…]`
pub async fn list<S, C>(
  State(state): State<AppState<S, C>>,
  Caller(principal): Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<PageEnvelope<RecordView>>, ApiError>
where
  S: RecordStore + 'static,
  S::Error: Into<Error>,
  C: CacheStore + 'static,
{
  let filter = FilterSpec {
    name:        params.name,
    email:       params.email,
    class_group: params.class_group,
    department:  params.department,
    age_min:     params.age_min,
    age_max:     params.age_max,
    subject:     params.subject,
    is_active:   params.is_active,
  };
  let sort = SortSpec {
    field:     params.sort_by.unwrap_or_default(),
    direction: params.order.unwrap_or_default(),
  };
  let page = page_spec(params.page, params.limit);

  let envelope = state
    .service
    .list_records(Some(&principal), &filter, sort, page)
    .await?;
  Ok(Json(envelope))
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  pub q:     String,
  pub page:  Option<u32>,
  pub limit: Option<u32>,
}

/// `GET /records/search?q=…`
pub async fn search<S, C>(
  State(state): State<AppState<S, C>>,
  Caller(principal): Caller,
  Query(params): Query<SearchParams>,
) -> Result<Json<PageEnvelope<RecordView>>, ApiError>
where
  S: RecordStore + 'static,
  S::Error: Into<Error>,
  C: CacheStore + 'static,
{
  let page = page_spec(params.page, params.limit);
  let envelope = state
    .service
    .search_records(Some(&principal), &params.q, page)
    .await?;
  Ok(Json(envelope))
}

// ─── Stats ───────────────────────────────────────────────────────────────────

/// `GET /records/stats`
pub async fn stats<S, C>(
  State(state): State<AppState<S, C>>,
  Caller(principal): Caller,
) -> Result<Json<RosterStats>, ApiError>
where
  S: RecordStore + 'static,
  S::Error: Into<Error>,
  C: CacheStore + 'static,
{
  let report = state.service.get_stats(Some(&principal)).await?;
  Ok(Json(report))
}

// ─── Single record ───────────────────────────────────────────────────────────

/// `GET /records/:id`
pub async fn get_one<S, C>(
  State(state): State<AppState<S, C>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<RecordView>, ApiError>
where
  S: RecordStore + 'static,
  S::Error: Into<Error>,
  C: CacheStore + 'static,
{
  let view = state.service.get_record(Some(&principal), id).await?;
  Ok(Json(view))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /records`
pub async fn create<S, C>(
  State(state): State<AppState<S, C>>,
  Caller(principal): Caller,
  Json(body): Json<NewPersonRecord>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore + 'static,
  S::Error: Into<Error>,
  C: CacheStore + 'static,
{
  let record = state.service.create_record(Some(&principal), body).await?;
  Ok((StatusCode::CREATED, Json(record)))
}

// ─── Update / delete ─────────────────────────────────────────────────────────

/// `PATCH /records/:id`
pub async fn update<S, C>(
  State(state): State<AppState<S, C>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
  Json(patch): Json<RecordPatch>,
) -> Result<Json<PersonRecord>, ApiError>
where
  S: RecordStore + 'static,
  S::Error: Into<Error>,
  C: CacheStore + 'static,
{
  let record = state
    .service
    .update_record(Some(&principal), id, patch)
    .await?;
  Ok(Json(record))
}

/// `DELETE /records/:id` — soft delete.
pub async fn delete<S, C>(
  State(state): State<AppState<S, C>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<PersonRecord>, ApiError>
where
  S: RecordStore + 'static,
  S::Error: Into<Error>,
  C: CacheStore + 'static,
{
  let record = state.service.delete_record(Some(&principal), id).await?;
  Ok(Json(record))
}

// ─── Attendance ──────────────────────────────────────────────────────────────

/// `POST /records/:id/attendance`
pub async fn mark_attendance<S, C>(
  State(state): State<AppState<S, C>>,
  Caller(principal): Caller,
  Path(id): Path<Uuid>,
  Json(entry): Json<NewAttendanceEntry>,
) -> Result<Json<PersonRecord>, ApiError>
where
  S: RecordStore + 'static,
  S::Error: Into<Error>,
  C: CacheStore + 'static,
{
  let record = state
    .service
    .mark_attendance(Some(&principal), id, entry)
    .await?;
  Ok(Json(record))
}

// ─── Bulk update ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BulkUpdateBody {
  pub ids:   Vec<Uuid>,
  pub patch: RecordPatch,
}

#[derive(Debug, Serialize)]
pub struct BulkUpdateResponse {
  pub affected: u64,
}

/// `POST /records/bulk-update`
pub async fn bulk_update<S, C>(
  State(state): State<AppState<S, C>>,
  Caller(principal): Caller,
  Json(body): Json<BulkUpdateBody>,
) -> Result<Json<BulkUpdateResponse>, ApiError>
where
  S: RecordStore + 'static,
  S::Error: Into<Error>,
  C: CacheStore + 'static,
{
  let affected = state
    .service
    .bulk_update_records(Some(&principal), &body.ids, body.patch)
    .await?;
  Ok(Json(BulkUpdateResponse { affected }))
}
