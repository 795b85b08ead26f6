//! Handlers for `/auth` endpoints.
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `POST` | `/auth/register` | `{"username":"…","password":"…"}` |
//! | `POST` | `/auth/login`    | `{"username":"…","password":"…"}` |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use pharmacy_auth::AuthError;
use pharmacy_core::store::CredentialStore;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{AppState, error::ApiError, extract::Payload};

#[derive(Debug, Deserialize)]
pub struct Credentials {
  #[serde(default)]
  pub username: String,
  #[serde(default)]
  pub password: String,
}

impl Credentials {
  fn require(&self) -> Result<(), ApiError> {
    if self.username.is_empty() || self.password.is_empty() {
      return Err(ApiError::BadRequest("username and password are required".into()));
    }
    Ok(())
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
  pub token: String,
}

// ─── Register ────────────────────────────────────────────────────────────────

/// `POST /auth/register`
pub async fn register<S>(
  State(state): State<AppState<S>>,
  Payload(body): Payload<Credentials>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CredentialStore + 'static,
{
  body.require()?;

  let user = state.tokens.register(&body.username, &body.password).await?;
  state.events.registered(&user.username);

  Ok((StatusCode::CREATED, Json(json!({ "message": "User registered successfully" }))))
}

// ─── Login ───────────────────────────────────────────────────────────────────

/// `POST /auth/login`
///
/// Publishes a login event for successful and rejected attempts alike.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Payload(body): Payload<Credentials>,
) -> Result<Json<TokenResponse>, ApiError>
where
  S: CredentialStore + 'static,
{
  body.require()?;

  match state.tokens.login(&body.username, &body.password).await {
    Ok(token) => {
      state.events.login_attempt(&body.username, true);
      Ok(Json(TokenResponse { token }))
    }
    Err(AuthError::InvalidCredentials) => {
      state.events.login_attempt(&body.username, false);
      Err(ApiError::InvalidCredentials)
    }
    Err(e) => Err(e.into()),
  }
}
