//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("store error: {0}")]
  Store(#[from] tendril_core::Error),

  #[error("engine error: {0}")]
  Engine(#[from] tendril_engine::Error),

  #[error("publish error: {0}")]
  Publish(#[from] tendril_publish::Error),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
      }
      ApiError::Engine(e) => {
        tracing::error!(error = %e, "engine failure");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
      }
      ApiError::Publish(e) => {
        tracing::error!(error = %e, "publish failure");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

pub type ApiResult<T> = Result<T, ApiError>;
