// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token revocation capability.
//!
//! Only the interface exists. The default [`NoopBlacklist`] never revokes
//! anything, and authentication does not consult the blacklist; the
//! `blacklist_enabled` / `blacklist_grace_period` settings are accepted for
//! configuration compatibility only.

/// Storage for revoked tokens.
pub trait TokenBlacklist: Send + Sync {
    fn blacklist(&self, token: &str);

    fn unblacklist(&self, token: &str);

    fn is_blacklisted(&self, token: &str) -> bool;
}

/// Blacklist that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBlacklist;

impl TokenBlacklist for NoopBlacklist {
    fn blacklist(&self, _token: &str) {}

    fn unblacklist(&self, _token: &str) {}

    fn is_blacklisted(&self, _token: &str) -> bool {
        false
    }
}
