// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for guarded routes.
//!
//! The guard middleware authenticates the request; these extractors only
//! read its result:
//!
//! ```rust,ignore
//! async fn me(Auth(auth): Auth) -> impl IntoResponse {
//!     // auth.guard, auth.principal, auth.claims
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::guard::Authenticated;
use super::AuthError;

/// Principal accepted by the guard middleware.
///
/// Rejects with 401 when the route is not behind
/// [`require_guards`](super::require_guards).
pub struct Auth(pub Authenticated);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .cloned()
            .map(Auth)
            .ok_or_else(AuthError::unauthenticated)
    }
}

/// Optional authentication extractor.
pub struct OptionalAuth(pub Option<Authenticated>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(parts.extensions.get::<Authenticated>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::ClaimSet;
    use crate::auth::provider::PrincipalRecord;
    use axum::http::Request;
    use std::sync::Arc;

    fn empty_parts() -> Parts {
        Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn authenticated() -> Authenticated {
        Authenticated {
            guard: "jwt_users".to_string(),
            principal: Arc::new(PrincipalRecord::new("Pepe")),
            claims: ClaimSet::new(),
        }
    }

    #[tokio::test]
    async fn auth_requires_middleware_result() {
        let mut parts = empty_parts();
        let result = Auth::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AuthError::Unauthenticated { reason: None })));
    }

    #[tokio::test]
    async fn auth_reads_extensions() {
        let mut parts = empty_parts();
        parts.extensions.insert(authenticated());

        let Auth(auth) = Auth::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(auth.guard, "jwt_users");
        assert_eq!(auth.principal.auth_identifier(), "Pepe");
    }

    #[tokio::test]
    async fn optional_auth_returns_none_without_principal() {
        let mut parts = empty_parts();
        let OptionalAuth(auth) = OptionalAuth::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(auth.is_none());

        parts.extensions.insert(authenticated());
        let OptionalAuth(auth) = OptionalAuth::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(auth.is_some());
    }
}
