//! Request middleware and extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::common::ApiError;

/// Header carrying the authenticated user identity.
///
/// Authentication itself is the auth gateway's job; by the time a request
/// reaches this service the gateway has already verified the caller and
/// stamped this header.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user on this request.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .map(AuthUser)
            .ok_or(ApiError::Unauthorized)
    }
}
