// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{DecodeMemo, GuardRegistry, InMemoryPrincipalProvider, JwtManager};
use crate::config::{AuthSettings, PrincipalDirectory};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<AuthSettings>,
    pub manager: Arc<JwtManager>,
    pub registry: Arc<GuardRegistry>,
}

impl AppState {
    /// One shared manager and decode memo; one guard per configured guard,
    /// backed by the principal records of its provider.
    pub fn new(settings: AuthSettings, principals: &PrincipalDirectory) -> Self {
        let manager = Arc::new(JwtManager::new(settings.jwt.clone()));
        let mut registry = GuardRegistry::new(Arc::new(DecodeMemo::new()))
            .with_error_reasons(settings.guard.show_error_reason);

        for (id, definition) in &settings.guards {
            let records = principals
                .get(&definition.provider)
                .cloned()
                .unwrap_or_default();
            let provider = InMemoryPrincipalProvider::new(records);
            if provider.is_empty() {
                warn!(guard = %id, provider = %definition.provider, "No principals for provider");
            }
            info!(guard = %id, provider = %definition.provider, principals = provider.len(), "Registered guard");
            registry.register(id.clone(), Arc::clone(&manager), Arc::new(provider));
        }

        Self {
            settings: Arc::new(settings),
            manager,
            registry: Arc::new(registry),
        }
    }

    /// Ids of every configured guard, in order.
    pub fn guard_ids(&self) -> Vec<String> {
        self.registry.guard_ids().map(str::to_string).collect()
    }
}
