//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body carries the stable machine-readable `kind` next to
//! the human-readable message: `{"kind": "...", "message": "..."}`.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use muster_core::Error;
use serde_json::json;

/// An error returned by an API handler; a thin HTTP wrapper over the
/// core taxonomy.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
  fn from(err: Error) -> Self { Self(err) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self.0 {
      Error::Unauthenticated => StatusCode::UNAUTHORIZED,
      Error::Forbidden(_) => StatusCode::FORBIDDEN,
      Error::NotFound(_) => StatusCode::NOT_FOUND,
      Error::DuplicateKey(_) => StatusCode::CONFLICT,
      Error::Validation(_) => StatusCode::BAD_REQUEST,
      Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = Json(json!({
      "kind": self.0.kind(),
      "message": self.0.to_string(),
    }));

    let mut res = (status, body).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"muster\""),
      );
    }
    res
  }
}
