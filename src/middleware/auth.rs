//! Bearer-token extractor for handlers requiring an authenticated user

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::auth::Auth;
use crate::error::AppError;

const INVALID_CREDENTIALS: &str = "Invalid authentication credentials";

/// Username of the caller, taken from a valid `Authorization: Bearer` token.
///
/// # Example
///
/// ```ignore
/// async fn me(CurrentUser(username): CurrentUser) -> String {
///     format!("Hello, {username}!")
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

impl<S> FromRequestParts<S> for CurrentUser
where
    Auth: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        Auth::from_ref(state)
            .current_user(token)
            .map(CurrentUser)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected bearer token");
                AppError::Unauthorized(INVALID_CREDENTIALS.to_string())
            })
    }
}
