// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Principal lookup, supplied by the embedding application.
//!
//! A guard resolves the `sub` claim of a verified token through its
//! [`PrincipalProvider`]. Lookups must be side-effect free.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Credential fields submitted for a login (e.g. `username`, `password`).
pub type Credentials = BTreeMap<String, String>;

/// Something a token can be issued for.
pub trait Authenticatable: fmt::Debug + Send + Sync {
    /// Identifier stored in the `sub` claim.
    fn auth_identifier(&self) -> String;
}

/// Principal resolved by a provider.
pub type Principal = Arc<dyn Authenticatable>;

/// Principal store of one guard.
pub trait PrincipalProvider: Send + Sync {
    fn retrieve_by_id(&self, identifier: &str) -> Option<Principal>;

    fn retrieve_by_credentials(&self, credentials: &Credentials) -> Option<Principal>;
}

/// Principal record of the in-memory provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PrincipalRecord {
    /// Identifier used as the token subject
    pub id: String,
    /// Attributes matched against login credentials
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl PrincipalRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    fn matches(&self, credentials: &Credentials) -> bool {
        !credentials.is_empty()
            && credentials
                .iter()
                .all(|(name, value)| self.attributes.get(name) == Some(value))
    }
}

impl Authenticatable for PrincipalRecord {
    fn auth_identifier(&self) -> String {
        self.id.clone()
    }
}

/// Provider backed by a fixed list of records.
///
/// Attributes are compared verbatim; this is a reference implementation for
/// tests and the demo service, not a credential store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPrincipalProvider {
    records: Vec<Arc<PrincipalRecord>>,
}

impl InMemoryPrincipalProvider {
    pub fn new(records: impl IntoIterator<Item = PrincipalRecord>) -> Self {
        Self {
            records: records.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl PrincipalProvider for InMemoryPrincipalProvider {
    fn retrieve_by_id(&self, identifier: &str) -> Option<Principal> {
        self.records
            .iter()
            .find(|record| record.id == identifier)
            .map(|record| Arc::clone(record) as Principal)
    }

    fn retrieve_by_credentials(&self, credentials: &Credentials) -> Option<Principal> {
        self.records
            .iter()
            .find(|record| record.matches(credentials))
            .map(|record| Arc::clone(record) as Principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> InMemoryPrincipalProvider {
        InMemoryPrincipalProvider::new([
            PrincipalRecord::new("Pepe").with_attribute("username", "Pepe"),
            PrincipalRecord::new("Marta")
                .with_attribute("username", "marta")
                .with_attribute("password", "hunter2"),
        ])
    }

    fn credentials(pairs: &[(&str, &str)]) -> Credentials {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn retrieve_by_id_finds_known_subject() {
        let principal = provider().retrieve_by_id("Pepe").unwrap();
        assert_eq!(principal.auth_identifier(), "Pepe");
        assert!(provider().retrieve_by_id("NotFoundPepe").is_none());
    }

    #[test]
    fn retrieve_by_credentials_matches_every_supplied_pair() {
        let provider = provider();
        assert!(provider
            .retrieve_by_credentials(&credentials(&[("username", "Pepe")]))
            .is_some());
        assert!(provider
            .retrieve_by_credentials(&credentials(&[("username", "NotFoundPepe")]))
            .is_none());

        let marta = provider
            .retrieve_by_credentials(&credentials(&[("username", "marta"), ("password", "hunter2")]))
            .unwrap();
        assert_eq!(marta.auth_identifier(), "Marta");

        assert!(provider
            .retrieve_by_credentials(&credentials(&[("username", "marta"), ("password", "nope")]))
            .is_none());
    }

    #[test]
    fn empty_credentials_match_nobody() {
        assert!(provider().retrieve_by_credentials(&Credentials::new()).is_none());
    }

    #[test]
    fn records_deserialize_without_attributes() {
        let record: PrincipalRecord = serde_json::from_str(r#"{"id":"Pepe"}"#).unwrap();
        assert_eq!(record, PrincipalRecord::new("Pepe"));
    }
}
