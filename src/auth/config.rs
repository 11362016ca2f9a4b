// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token configuration and per-audience resolution.
//!
//! A [`JwtConfig`] is the base configuration of a token manager. Tokens whose
//! `aud` claim names an entry of `aud_config_override` are encoded and
//! verified with that override merged over the base.
//!
//! ## Merge rules
//!
//! | Field             | Rule                                             |
//! |-------------------|--------------------------------------------------|
//! | scalars           | override replaces base                           |
//! | `keys`, `ttl`     | merged per sub-field                             |
//! | `keys` (any)      | also clears the inherited `secret`               |
//! | `required_claims` | override list replaces the base list             |
//! | overrides map     | always the base map                              |
//!
//! Resolution never fails. An override that does not parse, or an audience
//! that is not a string, resolves to the base configuration and is reported
//! as [`ResolutionOutcome::Fallback`]; key loading and signature checks then
//! fail on their own if the base does not fit the token.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::claims::{self, ClaimSet};

/// Default lifetime of a token, in seconds.
pub const DEFAULT_TTL_SECONDS: u64 = 60;

/// Claims a token must carry unless configured otherwise.
pub const DEFAULT_REQUIRED_CLAIMS: [&str; 6] = [
    claims::ISSUER,
    claims::ISSUED_AT,
    claims::EXPIRES_AT,
    claims::NOT_BEFORE,
    claims::SUBJECT,
    claims::GUARD,
];

/// Paths to PEM-encoded key files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPaths {
    pub public: Option<PathBuf>,
    pub private: Option<PathBuf>,
}

impl KeyPaths {
    /// Public key path, ignoring empty values.
    pub fn public_path(&self) -> Option<&Path> {
        non_empty_path(self.public.as_deref())
    }

    /// Private key path, ignoring empty values.
    pub fn private_path(&self) -> Option<&Path> {
        non_empty_path(self.private.as_deref())
    }
}

fn non_empty_path(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty())
}

/// Token lifetimes in seconds. `on_create == 0` means "no `exp` claim".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ttl {
    pub on_create: u64,
    pub on_refresh: u64,
}

impl Default for Ttl {
    fn default() -> Self {
        Self {
            on_create: DEFAULT_TTL_SECONDS,
            on_refresh: DEFAULT_TTL_SECONDS,
        }
    }
}

/// Base configuration of a token manager.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Shared secret. Not used when key files are set.
    pub secret: Option<String>,
    pub keys: KeyPaths,
    pub ttl: Ttl,
    pub algorithm: Algorithm,
    /// Inject the `grd` claim on issuance and check it on retrieval.
    pub add_guard_claim: bool,
    pub required_claims: Vec<String>,
    /// Clock skew tolerance applied to `exp`/`nbf`, in seconds.
    pub leeway: u64,
    /// Declared for configuration compatibility; revocation is not implemented.
    pub blacklist_enabled: bool,
    pub blacklist_grace_period: u64,
    /// Partial configurations keyed by audience. Entries are parsed lazily so
    /// a malformed one only affects tokens for that audience.
    #[serde(rename = "aud_config_override")]
    pub audience_overrides: BTreeMap<String, Value>,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: None,
            keys: KeyPaths::default(),
            ttl: Ttl::default(),
            algorithm: Algorithm::HS256,
            add_guard_claim: true,
            required_claims: DEFAULT_REQUIRED_CLAIMS.iter().map(|c| c.to_string()).collect(),
            leeway: 0,
            blacklist_enabled: true,
            blacklist_grace_period: 0,
            audience_overrides: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("keys", &self.keys)
            .field("ttl", &self.ttl)
            .field("algorithm", &self.algorithm)
            .field("add_guard_claim", &self.add_guard_claim)
            .field("required_claims", &self.required_claims)
            .field("leeway", &self.leeway)
            .field("blacklist_enabled", &self.blacklist_enabled)
            .field("blacklist_grace_period", &self.blacklist_grace_period)
            .field(
                "audience_overrides",
                &self.audience_overrides.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Key path override; unset sides are inherited from the base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyPathsOverride {
    pub public: Option<PathBuf>,
    pub private: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TtlOverride {
    pub on_create: Option<u64>,
    pub on_refresh: Option<u64>,
}

/// Partial configuration applied for one audience.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverride {
    pub secret: Option<String>,
    pub keys: Option<KeyPathsOverride>,
    pub ttl: Option<TtlOverride>,
    pub algorithm: Option<Algorithm>,
    pub add_guard_claim: Option<bool>,
    pub required_claims: Option<Vec<String>>,
    pub leeway: Option<u64>,
    pub blacklist_enabled: Option<bool>,
    pub blacklist_grace_period: Option<u64>,
}

/// How a configuration was resolved for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// No audience, or no override registered for it
    Base,
    /// The audience override was merged over the base
    Overridden { audience: String },
    /// An override applied but could not be used; the base was returned
    Fallback { audience: String, reason: String },
}

/// Effective configuration for one encode/decode call.
#[derive(Debug, Clone)]
pub struct Resolution<'a> {
    config: Cow<'a, JwtConfig>,
    outcome: ResolutionOutcome,
}

impl<'a> Resolution<'a> {
    fn base(config: &'a JwtConfig) -> Self {
        Self {
            config: Cow::Borrowed(config),
            outcome: ResolutionOutcome::Base,
        }
    }

    fn fallback(config: &'a JwtConfig, audience: String, reason: String) -> Self {
        warn!(
            audience = %audience,
            reason = %reason,
            "Audience config override ignored, using base configuration"
        );
        Self {
            config: Cow::Borrowed(config),
            outcome: ResolutionOutcome::Fallback { audience, reason },
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn outcome(&self) -> &ResolutionOutcome {
        &self.outcome
    }

    pub fn into_config(self) -> JwtConfig {
        self.config.into_owned()
    }
}

impl JwtConfig {
    /// Secret, ignoring empty values.
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.is_empty())
    }

    /// Resolve against the `aud` claim of `claims`.
    pub fn resolve_for_claims(&self, claims: &ClaimSet) -> Resolution<'_> {
        self.resolve(claims.get(claims::AUDIENCE))
    }

    /// Resolve against a raw audience claim value.
    pub fn resolve(&self, audience: Option<&Value>) -> Resolution<'_> {
        match audience {
            None | Some(Value::Null) => Resolution::base(self),
            Some(Value::String(audience)) => self.resolve_audience(audience),
            Some(other) => Resolution::fallback(
                self,
                other.to_string(),
                "audience claim is not a string".to_string(),
            ),
        }
    }

    /// Resolve for a named audience.
    pub fn resolve_audience(&self, audience: &str) -> Resolution<'_> {
        if audience.is_empty() {
            return Resolution::base(self);
        }
        let Some(entry) = self.audience_overrides.get(audience) else {
            return Resolution::base(self);
        };

        match ConfigOverride::deserialize(entry) {
            Ok(config_override) => Resolution {
                config: Cow::Owned(self.merged_with(&config_override)),
                outcome: ResolutionOutcome::Overridden {
                    audience: audience.to_string(),
                },
            },
            Err(e) => Resolution::fallback(self, audience.to_string(), e.to_string()),
        }
    }

    /// Merge `config_override` over this configuration.
    pub fn merged_with(&self, config_override: &ConfigOverride) -> JwtConfig {
        let mut merged = self.clone();

        if let Some(secret) = &config_override.secret {
            merged.secret = Some(secret.clone());
        }
        if let Some(keys) = &config_override.keys {
            if let Some(public) = &keys.public {
                merged.keys.public = Some(public.clone());
            }
            if let Some(private) = &keys.private {
                merged.keys.private = Some(private.clone());
            }
            // A key pair and an inherited secret must never both be live.
            merged.secret = None;
        }
        if let Some(ttl) = config_override.ttl {
            if let Some(on_create) = ttl.on_create {
                merged.ttl.on_create = on_create;
            }
            if let Some(on_refresh) = ttl.on_refresh {
                merged.ttl.on_refresh = on_refresh;
            }
        }
        if let Some(algorithm) = config_override.algorithm {
            merged.algorithm = algorithm;
        }
        if let Some(add_guard_claim) = config_override.add_guard_claim {
            merged.add_guard_claim = add_guard_claim;
        }
        if let Some(required_claims) = &config_override.required_claims {
            merged.required_claims = required_claims.clone();
        }
        if let Some(leeway) = config_override.leeway {
            merged.leeway = leeway;
        }
        if let Some(blacklist_enabled) = config_override.blacklist_enabled {
            merged.blacklist_enabled = blacklist_enabled;
        }
        if let Some(grace_period) = config_override.blacklist_grace_period {
            merged.blacklist_grace_period = grace_period;
        }

        merged
    }
}
