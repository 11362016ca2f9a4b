// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Last-decoded-token memo shared by the guards of a process.
//!
//! When several guards inspect the same request, only the first one decodes
//! and verifies the token; the others reuse the claims and only check the
//! guard claim. The memo holds a single entry and is only consulted on exact
//! string equality, so a different token is always verified again.
//!
//! Each entry also records the configuration snapshot it was verified under.
//! A manager owns its snapshots and `replace_config` installs a new one, so an
//! entry is never reused by another manager or after a key rotation. Entries
//! are not a lifetime check: callers re-check `exp`/`nbf` on every hit.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::claims::ClaimSet;
use super::config::JwtConfig;

struct MemoEntry {
    token: String,
    verified_under: Arc<JwtConfig>,
    claims: ClaimSet,
}

impl MemoEntry {
    fn matches(&self, token: &str, verified_under: &Arc<JwtConfig>) -> bool {
        self.token == token && Arc::ptr_eq(&self.verified_under, verified_under)
    }
}

/// Single-slot cache mapping the last decoded raw token to its claims.
#[derive(Default)]
pub struct DecodeMemo {
    slot: Mutex<Option<MemoEntry>>,
}

impl DecodeMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims of `token` if it is the last one stored under `verified_under`.
    pub fn get(&self, token: &str, verified_under: &Arc<JwtConfig>) -> Option<ClaimSet> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref()
            .filter(|entry| entry.matches(token, verified_under))
            .map(|entry| entry.claims.clone())
    }

    /// Overwrite the slot.
    pub fn put(&self, token: impl Into<String>, verified_under: Arc<JwtConfig>, claims: ClaimSet) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(MemoEntry {
            token: token.into(),
            verified_under,
            claims,
        });
    }

    /// Return the memoized claims of `token`, or run `decode` and store its
    /// result. The lock is held across the lookup, `decode`, and the store.
    ///
    /// Failures are not memoized.
    pub fn get_or_try_insert_with<E>(
        &self,
        token: &str,
        verified_under: &Arc<JwtConfig>,
        decode: impl FnOnce() -> Result<ClaimSet, E>,
    ) -> Result<ClaimSet, E> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = slot
            .as_ref()
            .filter(|entry| entry.matches(token, verified_under))
        {
            debug!("Reusing memoized token claims");
            return Ok(entry.claims.clone());
        }

        let claims = decode()?;
        *slot = Some(MemoEntry {
            token: token.to_string(),
            verified_under: Arc::clone(verified_under),
            claims: claims.clone(),
        });
        Ok(claims)
    }

    pub fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl fmt::Debug for DecodeMemo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let occupied = self
            .slot
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        f.debug_struct("DecodeMemo")
            .field("occupied", &occupied)
            .finish()
    }
}
