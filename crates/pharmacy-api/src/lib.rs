//! JSON HTTP API for the pharmacy service.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`CredentialStore`] and [`MedicineStore`]. Handlers publish a domain event
//! after every successful state change; publish failures never change the
//! response.
//!
//! | Method   | Path              | Auth   |
//! |----------|-------------------|--------|
//! | `POST`   | `/auth/register`  | –      |
//! | `POST`   | `/auth/login`     | –      |
//! | `GET`    | `/medicines`      | bearer |
//! | `POST`   | `/medicines`      | bearer |
//! | `GET`    | `/medicines/{id}` | bearer |
//! | `PUT`    | `/medicines/{id}` | bearer |
//! | `DELETE` | `/medicines/{id}` | bearer |

pub mod auth;
pub mod error;
pub mod extract;
pub mod medicines;


use std::sync::Arc;

use axum::{
  Router,
  http::{Method, header},
  routing::{get, post},
};
use pharmacy_auth::TokenService;
use pharmacy_core::store::{CredentialStore, MedicineStore};
use pharmacy_events::EventPublisher;
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

pub use error::ApiError;
pub use extract::Authenticated;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:  Arc<S>,
  pub tokens: TokenService<S>,
  pub events: EventPublisher,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:  self.store.clone(),
      tokens: self.tokens.clone(),
      events: self.events.clone(),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router for `state`, wrapped in CORS and request tracing.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: CredentialStore + MedicineStore + 'static,
{
  Router::new()
    // Auth
    .route("/auth/register", post(auth::register::<S>))
    .route("/auth/login", post(auth::login::<S>))
    // Medicines
    .route("/medicines", get(medicines::list::<S>).post(medicines::create::<S>))
    .route(
      "/medicines/{id}",
      get(medicines::get_one::<S>)
        .put(medicines::update::<S>)
        .delete(medicines::delete::<S>),
    )
    .layer(TraceLayer::new_for_http())
    .layer(cors())
    .with_state(state)
}

fn cors() -> CorsLayer {
  CorsLayer::new()
    .allow_origin(Any)
    .allow_methods([Method::POST, Method::GET, Method::PUT, Method::DELETE, Method::OPTIONS])
    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}
