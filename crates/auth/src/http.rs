//! Thin HTTP glue for axum handlers
//!
//! Routing, request parsing, and response schemas live with the application;
//! this module only turns the incoming `Authorization` header into a resolved
//! identity via [`AuthService`], in the two flavors handlers need.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use nazonexus_shared::Identity;

use crate::{error::AuthError, service::AuthService};

/// Extractor for endpoints that require an authenticated caller.
///
/// Rejects with 401 when the request resolves anonymously, and with 403 when a
/// verified token points at a user that no longer exists.
pub struct AuthUser(pub Identity);

/// Extractor for endpoints that tolerate anonymous access.
pub struct MaybeAuthUser(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let service = Arc::<AuthService>::from_ref(state);
        let authorization = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        Ok(Self(service.authenticate(authorization).await?))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeAuthUser(identity) = MaybeAuthUser::from_request_parts(parts, state).await?;
        identity.map(Self).ok_or(AuthError::Unauthorized)
    }
}
