//! Handlers for `/medicines` endpoints. All require a bearer token.
//!
//! | Method   | Path              | Notes |
//! |----------|-------------------|-------|
//! | `GET`    | `/medicines`      | Ordered by id |
//! | `POST`   | `/medicines`      | Body: [`MedicineInput`] |
//! | `GET`    | `/medicines/{id}` | 404 if not found |
//! | `PUT`    | `/medicines/{id}` | Replaces every field; 404 if not found |
//! | `DELETE` | `/medicines/{id}` | 204; 404 if not found |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use pharmacy_core::{
  medicine::{Medicine, MedicineInput},
  store::{CredentialStore, MedicineStore},
};
use pharmacy_events::MedicineAction;

use crate::{
  AppState,
  error::ApiError,
  extract::{Authenticated, Payload, RecordId},
};

fn not_found(id: i64) -> ApiError { ApiError::NotFound(format!("medicine {id} not found")) }

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /medicines`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  _auth: Authenticated,
) -> Result<Json<Vec<Medicine>>, ApiError>
where
  S: CredentialStore + MedicineStore + 'static,
{
  let medicines = state.store.list().await.map_err(ApiError::store)?;
  Ok(Json(medicines))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /medicines`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Authenticated(claims): Authenticated,
  Payload(input): Payload<MedicineInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CredentialStore + MedicineStore + 'static,
{
  input.validate()?;

  let medicine = state.store.create(input).await.map_err(ApiError::store)?;
  state
    .events
    .medicine_changed(MedicineAction::Created, medicine.id, &claims.username);

  Ok((StatusCode::CREATED, Json(medicine)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /medicines/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  _auth: Authenticated,
  RecordId(id): RecordId,
) -> Result<Json<Medicine>, ApiError>
where
  S: CredentialStore + MedicineStore + 'static,
{
  let medicine = state
    .store
    .get(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(medicine))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PUT /medicines/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Authenticated(claims): Authenticated,
  RecordId(id): RecordId,
  Payload(input): Payload<MedicineInput>,
) -> Result<Json<Medicine>, ApiError>
where
  S: CredentialStore + MedicineStore + 'static,
{
  input.validate()?;

  let medicine = state
    .store
    .update(id, input)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(id))?;
  state
    .events
    .medicine_changed(MedicineAction::Updated, medicine.id, &claims.username);

  Ok(Json(medicine))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /medicines/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Authenticated(claims): Authenticated,
  RecordId(id): RecordId,
) -> Result<StatusCode, ApiError>
where
  S: CredentialStore + MedicineStore + 'static,
{
  let deleted = state.store.delete(id).await.map_err(ApiError::store)?;
  if !deleted {
    return Err(not_found(id));
  }
  state
    .events
    .medicine_changed(MedicineAction::Deleted, id, &claims.username);

  Ok(StatusCode::NO_CONTENT)
}
