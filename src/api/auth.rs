//! Bearer-token authentication extractor.
//!
//! Handlers take an [`AuthenticatedUser`] argument; extraction resolves
//! the `Authorization: Bearer <token>` header through the configured
//! [`crate::persistence::Authenticator`] and rejects the request with
//! `401 {"error": "Unauthorized"}` when the header is missing or the
//! token is unknown.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::error::GatewayError;

/// The resolved identity of the calling user.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub uuid::Uuid);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(GatewayError::Unauthorized)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(GatewayError::Unauthorized)?;

        let user_id = state
            .authenticator
            .resolve(token)
            .await?
            .ok_or(GatewayError::Unauthorized)?;

        Ok(Self(user_id))
    }
}
