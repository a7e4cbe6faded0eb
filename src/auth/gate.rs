//! Bearer-token guard shared by every protected route.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::auth::token::{TokenCodec, TokenError};
use crate::error::AppError;
use crate::models::user::User;
use crate::store::UserStore;
use crate::AppState;

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("no bearer token in the authorization header")]
    NoToken,
    #[error("token rejected: {0}")]
    Rejected(#[from] TokenError),
    #[error("token carries no user id")]
    MissingUserId,
    #[error("token user no longer exists")]
    UnknownUser,
    #[error("user lookup failed: {0}")]
    Lookup(#[source] sqlx::Error),
}

/// Extract `<token>` from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Resolve an authorization header to a live identity.
pub async fn authenticate<S>(
    users: &S,
    tokens: &TokenCodec,
    authorization: Option<&str>,
) -> Result<User, GateError>
where
    S: UserStore + ?Sized,
{
    let token = authorization
        .and_then(bearer_token)
        .ok_or(GateError::NoToken)?;

    let claims = tokens.decode(token)?;
    if claims.id.trim().is_empty() {
        return Err(GateError::MissingUserId);
    }

    users
        .find_by_id(&claims.id)
        .await
        .map_err(GateError::Lookup)?
        .ok_or(GateError::UnknownUser)
}

/// The authenticated caller. Adding this extractor to a handler is what makes
/// the route protected.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let authorization = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match authenticate(&state.store, &state.tokens, authorization).await {
            Ok(user) => Ok(CurrentUser(user)),
            Err(GateError::Lookup(e)) => Err(AppError::Sqlx(e)),
            Err(e) => {
                tracing::debug!(reason = %e, path = %parts.uri.path(), "request rejected by auth gate");
                Err(AppError::Unauthenticated)
            }
        }
    }
}
