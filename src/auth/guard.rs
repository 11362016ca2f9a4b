// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Guards bind tokens to principal stores.
//!
//! A [`JwtGuard`] owns one guard id and one [`PrincipalProvider`]. Several
//! guards usually share one [`JwtManager`] and one [`DecodeMemo`], which is
//! what [`GuardRegistry`] sets up. Guards with different managers may share
//! the memo: entries are scoped to the manager configuration that verified
//! them.
//!
//! Authentication never raises: any decode or validation failure means "no
//! principal". The failure is only kept (as a reason string) so the HTTP
//! boundary can expose it when configured to.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::claims::{self, ClaimSet};
use super::error::{AuthError, TokenError};
use super::manager::JwtManager;
use super::memo::DecodeMemo;
use super::provider::{Authenticatable, Credentials, Principal, PrincipalProvider};

/// Principal accepted by a guard, with the claims of its token.
///
/// Inserted into request extensions by the guard middleware.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub guard: String,
    pub principal: Principal,
    pub claims: ClaimSet,
}

/// Why a guard did not yield a principal.
#[derive(Debug)]
enum Rejection {
    NoToken,
    Invalid(TokenError),
    ForeignGuard,
    UnknownSubject,
}

impl Rejection {
    fn reason(&self) -> Option<String> {
        match self {
            Rejection::NoToken => None,
            Rejection::Invalid(e) => Some(e.to_string()),
            Rejection::ForeignGuard => Some("token was issued for another guard".to_string()),
            Rejection::UnknownSubject => Some("token subject is unknown".to_string()),
        }
    }
}

/// One named identity domain.
pub struct JwtGuard {
    id: String,
    manager: Arc<JwtManager>,
    provider: Arc<dyn PrincipalProvider>,
    memo: Arc<DecodeMemo>,
}

impl std::fmt::Debug for JwtGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtGuard")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl JwtGuard {
    pub fn new(
        id: impl Into<String>,
        manager: Arc<JwtManager>,
        provider: Arc<dyn PrincipalProvider>,
        memo: Arc<DecodeMemo>,
    ) -> Self {
        Self {
            id: id.into(),
            manager,
            provider,
            memo,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn manager(&self) -> &Arc<JwtManager> {
        &self.manager
    }

    /// Issue a token owned by this guard.
    pub fn issue(
        &self,
        subject: &str,
        custom_claims: ClaimSet,
        add_missing_required_claims: bool,
    ) -> Result<String, TokenError> {
        self.manager
            .issue(&self.id, subject, custom_claims, add_missing_required_claims)
    }

    /// Issue a token owned by this guard for `principal`.
    pub fn issue_for(
        &self,
        principal: &dyn Authenticatable,
        custom_claims: ClaimSet,
        add_missing_required_claims: bool,
    ) -> Result<String, TokenError> {
        self.manager
            .from_principal(&self.id, principal, custom_claims, add_missing_required_claims)
    }

    /// Principal for the raw `Authorization` header value, if this guard
    /// accepts it.
    pub fn authenticate(&self, raw_token: &str) -> Option<Principal> {
        self.resolve(raw_token).map(|auth| auth.principal)
    }

    /// Like [`JwtGuard::authenticate`], keeping the claims.
    pub fn resolve(&self, raw_token: &str) -> Option<Authenticated> {
        self.try_resolve(raw_token).ok()
    }

    /// Principal matching login `credentials`.
    pub fn validate(&self, credentials: &Credentials) -> Option<Principal> {
        self.provider.retrieve_by_credentials(credentials)
    }

    fn try_resolve(&self, raw_token: &str) -> Result<Authenticated, Rejection> {
        if raw_token.is_empty() {
            return Err(Rejection::NoToken);
        }

        let base = self.manager.config();
        let claims = self
            .memo
            .get_or_try_insert_with(raw_token, &base, || {
                self.manager.decode_and_validate_under(&base, raw_token)
            })
            .and_then(|claims| {
                // Memo hits may be older than `exp`.
                self.manager.check_lifetime_under(&base, &claims)?;
                Ok(claims)
            })
            .map_err(|e| {
                debug!(guard = %self.id, error = %e, "Token rejected");
                Rejection::Invalid(e)
            })?;

        let binds_guard = base.resolve_for_claims(&claims).config().add_guard_claim;
        if binds_guard && claims::guard_claim(&claims) != Some(self.id.as_str()) {
            debug!(guard = %self.id, "Token belongs to another guard");
            return Err(Rejection::ForeignGuard);
        }

        let principal = claims::subject_identifier(&claims)
            .and_then(|subject| self.provider.retrieve_by_id(&subject))
            .ok_or_else(|| {
                debug!(guard = %self.id, "Token subject not found");
                Rejection::UnknownSubject
            })?;

        Ok(Authenticated {
            guard: self.id.clone(),
            principal,
            claims,
        })
    }
}

/// Guards by id, sharing one decode memo.
#[derive(Debug)]
pub struct GuardRegistry {
    guards: BTreeMap<String, Arc<JwtGuard>>,
    memo: Arc<DecodeMemo>,
    show_error_reason: bool,
}

impl GuardRegistry {
    pub fn new(memo: Arc<DecodeMemo>) -> Self {
        Self {
            guards: BTreeMap::new(),
            memo,
            show_error_reason: false,
        }
    }

    /// Expose the last failure reason in 401 responses.
    pub fn with_error_reasons(mut self, show_error_reason: bool) -> Self {
        self.show_error_reason = show_error_reason;
        self
    }

    /// Create and register a guard. Replaces any guard with the same id.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        manager: Arc<JwtManager>,
        provider: Arc<dyn PrincipalProvider>,
    ) -> Arc<JwtGuard> {
        let id = id.into();
        let guard = Arc::new(JwtGuard::new(
            id.clone(),
            manager,
            provider,
            Arc::clone(&self.memo),
        ));
        self.guards.insert(id, Arc::clone(&guard));
        guard
    }

    pub fn guard(&self, id: &str) -> Option<&Arc<JwtGuard>> {
        self.guards.get(id)
    }

    pub fn guard_ids(&self) -> impl Iterator<Item = &str> {
        self.guards.keys().map(String::as_str)
    }

    pub fn memo(&self) -> &Arc<DecodeMemo> {
        &self.memo
    }

    /// Try `guard_ids` in order; the first guard yielding a principal wins.
    pub fn authenticate_any<S: AsRef<str>>(
        &self,
        raw_token: &str,
        guard_ids: &[S],
    ) -> Result<Authenticated, AuthError> {
        let guards = guard_ids
            .iter()
            .map(|id| {
                let id = id.as_ref();
                self.guards
                    .get(id)
                    .ok_or_else(|| AuthError::UnknownGuard(id.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut last_rejection = None;
        for guard in guards {
            match guard.try_resolve(raw_token) {
                Ok(auth) => return Ok(auth),
                Err(rejection) => last_rejection = Some(rejection),
            }
        }

        let reason = if self.show_error_reason {
            last_rejection.and_then(|rejection| rejection.reason())
        } else {
            None
        };
        Err(AuthError::Unauthenticated { reason })
    }
}
