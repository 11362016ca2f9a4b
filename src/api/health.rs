// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Signing and verification keys of the base configuration.
    pub keys: String,
    /// Number of registered guards.
    pub guards: usize,
}

/// Health check endpoint handler.
///
/// Returns 200 if the base key material loads, 503 otherwise.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Key material is unavailable", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let keys_ok = match state.manager.check_keys() {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Key material unavailable");
            false
        }
    };

    let response = HealthResponse {
        status: if keys_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            keys: if keys_ok { "ok" } else { "unavailable" }.to_string(),
            guards: state.registry.guard_ids().count(),
        },
    };

    let status = if keys_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtConfig;
    use crate::config::{AuthSettings, PrincipalDirectory};

    fn state(jwt: JwtConfig) -> AppState {
        let settings = AuthSettings {
            jwt,
            ..AuthSettings::default()
        };
        AppState::new(settings, &PrincipalDirectory::new())
    }

    #[tokio::test]
    async fn healthy_with_secret() {
        let state = state(JwtConfig {
            secret: Some("s3cr3t".to_string()),
            ..JwtConfig::default()
        });

        let (status, Json(body)) = health(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.checks.keys, "ok");
        assert_eq!(body.checks.guards, 1);
    }

    #[tokio::test]
    async fn degraded_without_key_material() {
        let (status, Json(body)) = health(State(state(JwtConfig::default()))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert_eq!(body.checks.keys, "unavailable");
    }
}
