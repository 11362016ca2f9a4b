// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{require_guards, GuardLayer, PrincipalRecord},
    state::AppState,
};

pub mod health;
pub mod session;

pub fn router(state: AppState) -> Router {
    // `/v1/me` accepts a token from any configured guard.
    let guards = GuardLayer::new(Arc::clone(&state.registry), state.guard_ids());

    let protected = Router::new()
        .route("/me", get(session::me))
        .route_layer(middleware::from_fn_with_state(guards, require_guards));

    let v1_routes = Router::new()
        .route("/login/{guard}", post(session::login))
        .merge(protected);

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(health::health, session::login, session::me),
    components(
        schemas(
            health::HealthResponse,
            health::HealthChecks,
            session::LoginRequest,
            session::LoginResponse,
            session::MeResponse,
            PrincipalRecord
        )
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Session", description = "Token issuance and inspection")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthSettings, PrincipalDirectory};

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = router(AppState::new(
            AuthSettings::default(),
            &PrincipalDirectory::new(),
        ));
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }

    #[test]
    fn openapi_lists_every_path() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();
        assert_eq!(paths, vec!["/health", "/v1/login/{guard}", "/v1/me"]);
    }
}
