//! Credential and session handling for the pharmacy service.
//!
//! [`TokenService`] turns a username/password pair into a signed session
//! token and turns a token back into verified [`SessionClaims`]. Passwords
//! are hashed with argon2; tokens are HS256 JWTs.
//!
//! Validation is stateless: [`TokenSigner::validate`] never touches the
//! credential store, so authorised requests keep working while the store is
//! unavailable.

pub mod claims;
pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod signer;

pub use claims::SessionClaims;
pub use config::TokenConfig;
pub use error::AuthError;
pub use service::TokenService;
pub use signer::TokenSigner;
