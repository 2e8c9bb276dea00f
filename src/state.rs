// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

use std::sync::Arc;

use crate::auth::{AuthService, AuthorizationGate, TokenCodec};
use crate::credentials::CredentialVerifier;
use crate::registry::PermissionRegistry;
use crate::storage::{AuditRepository, AuthStore};

/// Shared handles for every request.
///
/// All components are constructed once at startup; nothing here is global.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AuthStore>,
    pub registry: Arc<PermissionRegistry>,
    pub codec: Arc<TokenCodec>,
    pub gate: Arc<AuthorizationGate>,
    pub service: Arc<AuthService>,
}

impl AppState {
    pub fn new(store: AuthStore, codec: TokenCodec, verifier: CredentialVerifier) -> Self {
        let store = Arc::new(store);
        let registry = Arc::new(PermissionRegistry::new(Arc::clone(&store)));
        let codec = Arc::new(codec);
        let gate = Arc::new(AuthorizationGate::new(
            Arc::clone(&codec),
            Arc::clone(&registry),
        ));
        let service = Arc::new(AuthService::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&codec),
            Arc::new(verifier),
        ));
        Self {
            store,
            registry,
            codec,
            gate,
            service,
        }
    }

    /// Audit log over the shared store.
    pub fn audit(&self) -> AuditRepository<'_> {
        AuditRepository::new(&self.store)
    }
}
