//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use pharmacy_auth::AuthError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler. Every variant renders as
/// `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  /// Wrong username or password. Deliberately says nothing about which.
  #[error("invalid credentials")]
  InvalidCredentials,

  /// Missing or rejected bearer token.
  #[error("unauthorized: {0}")]
  Unauthorized(&'static str),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    ApiError::Internal(Box::new(e))
  }
}

impl From<AuthError> for ApiError {
  fn from(e: AuthError) -> Self {
    match e {
      AuthError::InvalidCredentials => ApiError::InvalidCredentials,
      AuthError::DuplicateSubject => ApiError::Conflict("username already taken".into()),
      AuthError::InvalidToken => ApiError::Unauthorized("Invalid token"),
      other => ApiError::Internal(Box::new(other)),
    }
  }
}

impl From<pharmacy_core::Error> for ApiError {
  fn from(e: pharmacy_core::Error) -> Self {
    match e {
      pharmacy_core::Error::InvalidMedicine(m) => ApiError::BadRequest(m),
      pharmacy_core::Error::DuplicateUsername(_) => {
        ApiError::Conflict("username already taken".into())
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
      ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid credentials".into()),
      ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.into()),
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".into())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn render(e: ApiError) -> (StatusCode, serde_json::Value) {
    let resp = e.into_response();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[tokio::test]
  async fn internal_errors_hide_their_cause() {
    let cause = std::io::Error::other("disk /var/lib/pharmacy.db is full");
    let (status, body) = render(ApiError::store(cause)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "internal server error" }));
  }

  #[tokio::test]
  async fn auth_errors_map_to_statuses() {
    let (status, body) = render(AuthError::InvalidCredentials.into()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid credentials");

    let (status, _) = render(AuthError::DuplicateSubject.into()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = render(AuthError::InvalidToken.into()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");

    let (status, _) = render(AuthError::Hash("argon2".into()).into()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[tokio::test]
  async fn invalid_medicine_is_a_bad_request() {
    let (status, body) =
      render(pharmacy_core::Error::InvalidMedicine("name must not be empty".into()).into()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "name must not be empty");
  }
}
