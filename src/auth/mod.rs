// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Multi-guard JWT authentication.
//!
//! ## Flow
//!
//! 1. A guard issues a token whose `sub` is the principal id and whose `grd`
//!    claim names the guard (`JwtGuard::issue`)
//! 2. The client sends the token as the raw `Authorization` header value
//! 3. The guard middleware tries each guard of the route in order:
//!    - decode and verify the token once (shared [`DecodeMemo`])
//!    - check required claims of the effective config
//!    - reject tokens whose `grd` names another guard
//!    - resolve `sub` through the guard's [`PrincipalProvider`]
//!
//! ## Audience overrides
//!
//! The `aud` claim selects a partial config override (keys, algorithm, TTLs,
//! required claims). Keys are loaded from the effective config and cached per
//! key source.
//!
//! ## Security
//!
//! - Verification pins the algorithm of the effective config
//! - `exp`/`nbf` are enforced with the configured leeway
//! - Failure reasons reach clients only when `show_error_reason` is on

pub mod blacklist;
pub mod claims;
pub mod config;
pub mod error;
pub mod extractor;
pub mod guard;
pub mod keys;
pub mod manager;
pub mod memo;
pub mod middleware;
pub mod provider;

pub use blacklist::{NoopBlacklist, TokenBlacklist};
pub use claims::ClaimSet;
pub use config::{JwtConfig, ResolutionOutcome};
pub use error::{AuthError, TokenError};
pub use extractor::{Auth, OptionalAuth};
pub use guard::{Authenticated, GuardRegistry, JwtGuard};
pub use keys::KeyUse;
pub use manager::JwtManager;
pub use memo::DecodeMemo;
pub use middleware::{require_guards, GuardLayer};
pub use provider::{
    Authenticatable, Credentials, InMemoryPrincipalProvider, Principal, PrincipalProvider,
    PrincipalRecord,
};
