// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Two layers:
//!
//! - [`TokenError`] is raised by the token manager (key loading, signing,
//!   verification, required claims). Callers issuing tokens see it untouched.
//! - [`AuthError`] is what the HTTP boundary renders. Token failures collapse
//!   into [`AuthError::Unauthenticated`], optionally carrying the reason.

use std::io;
use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::errors::ErrorKind;
use serde::Serialize;

use super::keys::KeyUse;

/// Failure of a single encode/decode/validate call on the token manager.
///
/// All variants are terminal for the call that produced them.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("{0} key not configured")]
    MissingKey(KeyUse),

    #[error("the {key_use} key file path is not valid: {}", path.display())]
    KeyFileNotFound { key_use: KeyUse, path: PathBuf },

    #[error("the {key_use} key file could not be loaded: {}", path.display())]
    KeyFileUnreadable {
        key_use: KeyUse,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("token is malformed")]
    MalformedToken,

    #[error("token algorithm does not match the configured algorithm")]
    AlgorithmMismatch,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    TokenExpired,

    #[error("token is not yet valid")]
    TokenNotYetValid,

    #[error("required claim '{0}' is missing in the payload")]
    MissingRequiredClaim(String),

    #[error("a guard id is required to issue tokens")]
    GuardIdRequired,

    #[error("token signing failed: {0}")]
    SigningFailed(String),

    #[error("token verification failed: {0}")]
    VerificationFailed(String),
}

impl TokenError {
    /// Map a `jsonwebtoken` failure raised while verifying a token.
    pub(crate) fn from_verification(error: jsonwebtoken::errors::Error) -> Self {
        match error.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::MalformedToken,
            ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
            ErrorKind::ExpiredSignature => TokenError::TokenExpired,
            ErrorKind::ImmatureSignature => TokenError::TokenNotYetValid,
            ErrorKind::InvalidAlgorithm => TokenError::AlgorithmMismatch,
            _ => TokenError::VerificationFailed(error.to_string()),
        }
    }

    /// Map a `jsonwebtoken` failure raised while signing a token.
    pub(crate) fn from_signing(error: jsonwebtoken::errors::Error) -> Self {
        TokenError::SigningFailed(error.to_string())
    }

    /// Stable machine-readable code, used in error responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            TokenError::MissingKey(_) => "missing_key",
            TokenError::KeyFileNotFound { .. } => "key_file_not_found",
            TokenError::KeyFileUnreadable { .. } => "key_file_unreadable",
            TokenError::MalformedToken => "malformed_token",
            TokenError::AlgorithmMismatch => "algorithm_mismatch",
            TokenError::SignatureInvalid => "invalid_signature",
            TokenError::TokenExpired => "token_expired",
            TokenError::TokenNotYetValid => "token_not_yet_valid",
            TokenError::MissingRequiredClaim(_) => "missing_required_claim",
            TokenError::GuardIdRequired => "guard_id_required",
            TokenError::SigningFailed(_) => "signing_failed",
            TokenError::VerificationFailed(_) => "verification_failed",
        }
    }
}

/// Authentication error rendered at the HTTP boundary.
#[derive(Debug)]
pub enum AuthError {
    /// No configured guard accepted the request.
    ///
    /// `reason` is only populated when the registry exposes failure reasons.
    Unauthenticated { reason: Option<String> },
    /// A route references a guard id that was never registered
    UnknownGuard(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Unauthenticated without a reason.
    pub fn unauthenticated() -> Self {
        AuthError::Unauthenticated { reason: None }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated { .. } => "unauthenticated",
            AuthError::UnknownGuard(_) => "unknown_guard",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            AuthError::UnknownGuard(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Unauthenticated { reason: None } => write!(f, "Unauthenticated"),
            AuthError::Unauthenticated {
                reason: Some(reason),
            } => write!(f, "Unauthenticated: {reason}"),
            AuthError::UnknownGuard(id) => write!(f, "Authentication guard '{id}' is not configured"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
