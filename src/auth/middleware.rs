// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Guard middleware for Axum.
//!
//! Protects a router subtree with an ordered list of guards:
//!
//! ```rust,ignore
//! let guards = GuardLayer::new(registry, ["jwt_users", "jwt_admins"]);
//!
//! let app = Router::new()
//!     .route("/protected", get(protected_handler))
//!     .layer(axum::middleware::from_fn_with_state(guards, require_guards));
//! ```
//!
//! The whole `Authorization` header value is the token; no scheme prefix is
//! parsed. On success the [`Authenticated`] principal is placed in request
//! extensions for the [`Auth`](super::Auth) extractor.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::guard::{Authenticated, GuardRegistry};

/// Middleware state: the registry plus the guards protecting a route.
#[derive(Debug, Clone)]
pub struct GuardLayer {
    registry: Arc<GuardRegistry>,
    guards: Arc<[String]>,
}

impl GuardLayer {
    pub fn new<I, S>(registry: Arc<GuardRegistry>, guards: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            registry,
            guards: guards.into_iter().map(Into::into).collect(),
        }
    }

    pub fn guards(&self) -> &[String] {
        &self.guards
    }
}

/// Authentication middleware function.
pub async fn require_guards(
    State(layer): State<GuardLayer>,
    mut request: Request,
    next: Next,
) -> Response {
    let raw_token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    match layer.registry.authenticate_any(raw_token, &layer.guards) {
        Ok(authenticated) => {
            request.extensions_mut().insert::<Authenticated>(authenticated);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::ClaimSet;
    use crate::auth::config::JwtConfig;
    use crate::auth::manager::JwtManager;
    use crate::auth::memo::DecodeMemo;
    use crate::auth::provider::{InMemoryPrincipalProvider, PrincipalRecord};
    use crate::auth::Auth;
    use axum::{
        body::{to_bytes, Body},
        http::StatusCode,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn registry(show_error_reason: bool) -> Arc<GuardRegistry> {
        let manager = Arc::new(JwtManager::new(JwtConfig {
            secret: Some("s3cr3t".to_string()),
            ..JwtConfig::default()
        }));
        let mut registry =
            GuardRegistry::new(Arc::new(DecodeMemo::new())).with_error_reasons(show_error_reason);
        registry.register(
            "jwt_users",
            Arc::clone(&manager),
            Arc::new(InMemoryPrincipalProvider::new([PrincipalRecord::new("Pepe")])),
        );
        registry.register(
            "jwt_admins",
            manager,
            Arc::new(InMemoryPrincipalProvider::new([PrincipalRecord::new("PepeAdmin")])),
        );
        Arc::new(registry)
    }

    fn token(registry: &GuardRegistry, guard: &str, subject: &str) -> String {
        registry
            .guard(guard)
            .unwrap()
            .issue(subject, ClaimSet::new(), true)
            .unwrap()
    }

    async fn whoami(Auth(auth): Auth) -> String {
        format!("{}:{}", auth.guard, auth.principal.auth_identifier())
    }

    fn app(registry: Arc<GuardRegistry>, guards: &[&str]) -> Router {
        let layer = GuardLayer::new(registry, guards.iter().copied());
        Router::new()
            .route("/", get(whoami))
            .layer(axum::middleware::from_fn_with_state(layer, require_guards))
    }

    async fn call(app: Router, authorization: Option<&str>) -> (StatusCode, String) {
        let mut request = axum::http::Request::builder().uri("/");
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        let response = app
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn guard_accepts_its_own_token() {
        let registry = registry(false);
        let token = token(&registry, "jwt_users", "Pepe");

        let (status, body) = call(app(registry, &["jwt_users"]), Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "jwt_users:Pepe");
    }

    #[tokio::test]
    async fn token_of_another_guard_is_unauthorized() {
        let registry = registry(false);
        let token = token(&registry, "jwt_users", "Pepe");

        let (status, body) = call(app(registry, &["jwt_admins"]), Some(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "Unauthenticated");
        assert_eq!(body["error_code"], "unauthenticated");
    }

    #[tokio::test]
    async fn any_listed_guard_may_accept() {
        let registry = registry(false);
        let users = token(&registry, "jwt_users", "Pepe");
        let admins = token(&registry, "jwt_admins", "PepeAdmin");
        let app = app(registry, &["jwt_users", "jwt_admins"]);

        let (status, body) = call(app.clone(), Some(&users)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "jwt_users:Pepe");

        let (status, body) = call(app, Some(&admins)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "jwt_admins:PepeAdmin");
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let (status, _) = call(app(registry(false), &["jwt_users"]), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bearer_prefix_is_not_stripped() {
        let registry = registry(false);
        let token = format!("Bearer {}", token(&registry, "jwt_users", "Pepe"));

        let (status, _) = call(app(registry, &["jwt_users"]), Some(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn reason_is_exposed_when_enabled() {
        let (status, body) = call(app(registry(true), &["jwt_users"]), Some("a.b.c")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "Unauthenticated: token is malformed");
    }

    #[tokio::test]
    async fn unknown_guard_is_a_server_error() {
        let registry = registry(false);
        let token = token(&registry, "jwt_users", "Pepe");

        let (status, body) = call(app(registry, &["jwt_nobody"]), Some(&token)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error_code"], "unknown_guard");
    }
}
