//! Authentication and authorization
//!
//! Callers present an HS256 bearer token. [`AuthenticatedUser`] validates it
//! in the extractor; [`policy::authorize`] decides what the caller may do.

mod jwt;
pub mod policy;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    RequestPartsExt,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use uuid::Uuid;

pub use jwt::{issue_token, verify_token, Claims, JwtKeys};
pub use policy::{authorize, Action};

use crate::error::ApiError;
use crate::models::UserRole;

/// Caller identity taken from a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub role: UserRole,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::Unauthorized("Not authorized to access this route".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = verify_token(&keys, bearer.token()).map_err(|err| {
            tracing::warn!(error = %err, uri = %parts.uri, "Rejected bearer token");
            ApiError::Unauthorized("Not authorized to access this route".into())
        })?;

        Ok(Self {
            id: claims.sub,
            role: claims.role,
        })
    }
}
