// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token manager: encodes and verifies JWTs under per-audience configuration.
//!
//! ## Encode
//!
//! 1. Resolve the effective config from the `aud` claim being encoded
//! 2. Optionally add `null` placeholders for missing required claims
//! 3. Load (or reuse) the signing key for the effective config
//! 4. Sign `header.payload` with the effective algorithm
//!
//! ## Decode
//!
//! 1. Peek at the unverified payload for `aud` (garbage means "no audience")
//! 2. Resolve the effective config from it
//! 3. Load (or reuse) the verification key for the effective config
//! 4. Verify signature and algorithm
//! 5. Check numeric `exp` and `nbf` with leeway (`null` placeholders pass)
//!
//! The audience is read before verification on purpose: it selects the key
//! the audience's own tokens are signed with. Verification then pins the
//! algorithm of the effective config, so a token cannot choose its own.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use jsonwebtoken::{decode, encode, Header, Validation};
use serde_json::Value;
use tracing::debug;

use super::blacklist::{NoopBlacklist, TokenBlacklist};
use super::claims::{self, ClaimSet};
use super::config::JwtConfig;
use super::error::TokenError;
use super::keys::KeyMaterialLoader;
use super::provider::Authenticatable;

/// JWT encoder/decoder shared by one or more guards.
pub struct JwtManager {
    config: RwLock<Arc<JwtConfig>>,
    keys: KeyMaterialLoader,
    blacklist: Arc<dyn TokenBlacklist>,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("config", &self.config())
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            keys: KeyMaterialLoader::new(),
            blacklist: Arc::new(NoopBlacklist),
        }
    }

    /// Use a custom revocation backend.
    pub fn with_blacklist(mut self, blacklist: Arc<dyn TokenBlacklist>) -> Self {
        self.blacklist = blacklist;
        self
    }

    /// Current base configuration.
    pub fn config(&self) -> Arc<JwtConfig> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap the base configuration. Cached keys are reloaded on the next call
    /// whose key source differs.
    pub fn replace_config(&self, config: JwtConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }

    /// Effective configuration for `audience`.
    pub fn config_for_audience(&self, audience: &str) -> JwtConfig {
        self.config().resolve_audience(audience).into_config()
    }

    /// Sign `claims` into a compact JWT.
    ///
    /// With `add_missing_required_claims`, every required claim of the
    /// effective config that `claims` lacks is added as `null`.
    pub fn encode(
        &self,
        mut claims: ClaimSet,
        add_missing_required_claims: bool,
    ) -> Result<String, TokenError> {
        let base = self.config();
        let resolution = base.resolve_for_claims(&claims);
        let effective = resolution.config();

        if add_missing_required_claims {
            claims::fill_required_claims(&mut claims, effective);
        }

        let key = self.keys.encoding_key(effective)?;

        encode(&Header::new(effective.algorithm), &claims, &key).map_err(TokenError::from_signing)
    }

    /// Verify `token` and return its claims.
    ///
    /// Required claims are not checked here; see [`JwtManager::validate_payload`].
    pub fn decode(&self, token: &str) -> Result<ClaimSet, TokenError> {
        self.decode_under(&self.config(), token)
    }

    /// Check the required claims of the config effective for `claims`.
    pub fn validate_payload(
        &self,
        claims: &ClaimSet,
        verify_required_claims: bool,
    ) -> Result<(), TokenError> {
        let base = self.config();
        let resolution = base.resolve_for_claims(claims);
        claims::validate_required_claims(claims, resolution.config(), verify_required_claims)
    }

    /// Decode then validate required claims.
    pub fn decode_and_validate(&self, token: &str) -> Result<ClaimSet, TokenError> {
        self.decode_and_validate_under(&self.config(), token)
    }

    /// Check numeric `exp`/`nbf` of already verified `claims` against now,
    /// with the leeway of the config effective for them.
    pub fn check_lifetime(&self, claims: &ClaimSet) -> Result<(), TokenError> {
        self.check_lifetime_under(&self.config(), claims)
    }

    /// [`JwtManager::decode_and_validate`] against a fixed base snapshot.
    pub(crate) fn decode_and_validate_under(
        &self,
        base: &JwtConfig,
        token: &str,
    ) -> Result<ClaimSet, TokenError> {
        let claims = self.decode_under(base, token)?;
        let resolution = base.resolve_for_claims(&claims);
        claims::validate_required_claims(&claims, resolution.config(), true)?;
        Ok(claims)
    }

    pub(crate) fn check_lifetime_under(
        &self,
        base: &JwtConfig,
        claims: &ClaimSet,
    ) -> Result<(), TokenError> {
        let resolution = base.resolve_for_claims(claims);
        claims::check_lifetime(claims, Utc::now().timestamp(), resolution.config().leeway)
            .inspect_err(|e| debug!(error = %e, "Token lifetime check failed"))
    }

    fn decode_under(&self, base: &JwtConfig, token: &str) -> Result<ClaimSet, TokenError> {
        let audience = claims::peek_unverified_audience(token);
        let resolution = base.resolve(audience.as_ref());
        let effective = resolution.config();

        let key = self.keys.decoding_key(effective)?;

        let mut validation = Validation::new(effective.algorithm);
        // Time claims are checked below, only when numeric.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        // `aud` selects the configuration; it is not an acceptance criterion.
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<ClaimSet>(token, &key, &validation).map_err(|e| {
            debug!(error = %e, "Token verification failed");
            TokenError::from_verification(e)
        })?;

        claims::check_lifetime(&data.claims, Utc::now().timestamp(), effective.leeway)
            .inspect_err(|e| debug!(error = %e, "Token lifetime check failed"))?;
        Ok(data.claims)
    }

    /// Issue a token bound to `guard_id` for `subject`.
    ///
    /// `sub` and `grd` always come from the arguments, never from
    /// `custom_claims`. `grd` is omitted when the effective config disables
    /// the guard claim.
    pub fn issue(
        &self,
        guard_id: &str,
        subject: &str,
        custom_claims: ClaimSet,
        add_missing_required_claims: bool,
    ) -> Result<String, TokenError> {
        if guard_id.is_empty() {
            return Err(TokenError::GuardIdRequired);
        }

        let mut claims = custom_claims;
        claims.insert(claims::SUBJECT.to_string(), Value::from(subject));

        let add_guard_claim = self.config().resolve_for_claims(&claims).config().add_guard_claim;
        if add_guard_claim {
            claims.insert(claims::GUARD.to_string(), Value::from(guard_id));
        } else {
            claims.remove(claims::GUARD);
        }

        self.encode(claims, add_missing_required_claims)
    }

    /// [`JwtManager::issue`] for an authenticatable principal.
    pub fn from_principal(
        &self,
        guard_id: &str,
        principal: &dyn Authenticatable,
        custom_claims: ClaimSet,
        add_missing_required_claims: bool,
    ) -> Result<String, TokenError> {
        self.issue(
            guard_id,
            &principal.auth_identifier(),
            custom_claims,
            add_missing_required_claims,
        )
    }

    /// Every required claim of the base config mapped to `null`.
    pub fn required_claims_defaults(&self) -> ClaimSet {
        claims::required_claims_defaults(&self.config())
    }

    /// Whether `token` decodes and verifies.
    pub fn is_valid(&self, token: &str) -> bool {
        self.decode(token).is_ok()
    }

    /// Load and build both keys of the base configuration.
    pub fn check_keys(&self) -> Result<(), TokenError> {
        let base = self.config();
        self.keys.encoding_key(&base)?;
        self.keys.decoding_key(&base)?;
        Ok(())
    }

    pub fn blacklist(&self, token: &str) {
        self.blacklist.blacklist(token);
    }

    pub fn unblacklist(&self, token: &str) {
        self.blacklist.unblacklist(token);
    }

    pub fn is_blacklisted(&self, token: &str) -> bool {
        self.blacklist.is_blacklisted(token)
    }
}
