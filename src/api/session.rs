// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::auth::{claims, Auth, ClaimSet, Credentials};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Attributes matched against the guard's principal records
    #[schema(value_type = Object)]
    pub credentials: Credentials,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Compact JWT; send it as the whole `Authorization` header value
    pub access_token: String,
    pub guard: String,
    /// Seconds until `exp`, absent when tokens do not expire
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub guard: String,
    pub subject: String,
    #[schema(value_type = Object)]
    pub claims: ClaimSet,
}

/// Exchange credentials for a token owned by `guard`.
#[utoipa::path(
    post,
    path = "/v1/login/{guard}",
    tag = "Session",
    params(("guard" = String, Path, description = "Guard id")),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "No credentials given"),
        (status = 401, description = "Credentials not recognised"),
        (status = 404, description = "Unknown guard")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Path(guard_id): Path<String>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let guard = state
        .registry
        .guard(&guard_id)
        .ok_or_else(|| ApiError::not_found(format!("guard '{guard_id}' is not configured")))?;

    if request.credentials.is_empty() {
        return Err(ApiError::bad_request("credentials must not be empty"));
    }

    let principal = guard
        .validate(&request.credentials)
        .ok_or_else(|| ApiError::unauthorized("invalid credentials"))?;

    let ttl = state.manager.config().ttl.on_create;
    let mut lifetime = ClaimSet::new();
    claims::stamp_lifetime(
        &mut lifetime,
        &state.settings.issuer,
        chrono::Utc::now().timestamp(),
        ttl,
    );

    let access_token = guard.issue_for(principal.as_ref(), lifetime, true)?;
    info!(guard = %guard_id, subject = %principal.auth_identifier(), "Issued token");

    Ok(Json(LoginResponse {
        access_token,
        guard: guard_id,
        expires_in: (ttl > 0).then_some(ttl),
    }))
}

/// Principal behind the request token.
#[utoipa::path(
    get,
    path = "/v1/me",
    tag = "Session",
    responses(
        (status = 200, description = "Authenticated principal", body = MeResponse),
        (status = 401, description = "No guard accepted the token")
    )
)]
pub async fn me(Auth(auth): Auth) -> Json<MeResponse> {
    Json(MeResponse {
        subject: auth.principal.auth_identifier(),
        guard: auth.guard,
        claims: auth.claims,
    })
}
