//! Request extractors: bearer authentication and JSON/path bodies that
//! reject with [`ApiError`] instead of axum's plain-text rejections.

use axum::{
  Json,
  extract::{FromRequest, FromRequestParts, Path, Request},
  http::{header, request::Parts},
};
use pharmacy_auth::SessionClaims;
use pharmacy_core::store::CredentialStore;
use serde::de::DeserializeOwned;

use crate::{AppState, error::ApiError};

const BEARER: &str = "Bearer ";

// ─── Bearer auth ─────────────────────────────────────────────────────────────

/// Verified session claims. Present in a handler means the request carried a
/// valid, unexpired bearer token.
#[derive(Debug, Clone)]
pub struct Authenticated(pub SessionClaims);

/// Verify the `Authorization: Bearer <token>` header of `parts`. Stateless:
/// only the signing secret is consulted.
pub fn verify_bearer<S: CredentialStore>(
  parts: &Parts,
  state: &AppState<S>,
) -> Result<SessionClaims, ApiError> {
  let value = parts
    .headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .ok_or(ApiError::Unauthorized("Authorization header required"))?;

  let token = value
    .strip_prefix(BEARER)
    .ok_or(ApiError::Unauthorized("Invalid token"))?;

  Ok(state.tokens.validate_token(token.trim())?)
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: CredentialStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_bearer(parts, state).map(Authenticated)
  }
}

// ─── Bodies and paths ────────────────────────────────────────────────────────

/// A JSON request body. Malformed or incomplete bodies are a 400.
#[derive(Debug)]
pub struct Payload<T>(pub T);

impl<T, S> FromRequest<S> for Payload<T>
where
  T: DeserializeOwned,
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    let Json(value) = Json::<T>::from_request(req, state)
      .await
      .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(Payload(value))
  }
}

/// The numeric `{id}` path segment.
#[derive(Debug, Clone, Copy)]
pub struct RecordId(pub i64);

impl<S> FromRequestParts<S> for RecordId
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
    let Path(id) = Path::<i64>::from_request_parts(parts, state)
      .await
      .map_err(|_| ApiError::BadRequest("id must be an integer".into()))?;
    Ok(RecordId(id))
  }
}
