// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! # Authorization Gate
//!
//! Per-request decision procedure:
//!
//! ```text
//! Unauthenticated --authenticate--> Authenticated --authorize--> Authorized
//!                                                          \---> Forbidden
//! ```
//!
//! Authentication and authorization are independent calls so a route can
//! require a valid token without any role, or stack several checks.
//!
//! ## Permission sources
//!
//! - [`PermissionSource::TokenSnapshot`] maps the roles embedded in the
//!   token through a cached copy of the registry policy. The cache is keyed
//!   by the registry generation and rebuilt after any registry mutation.
//! - [`PermissionSource::Live`] resolves the identity's current roles in
//!   the registry, so role changes take effect before the token expires.
//!
//! The gate methods are blocking when they touch the registry; async
//! callers run them on the blocking pool.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use super::{AuthError, AuthenticatedUser, TokenCodec};
use crate::registry::{PermissionRegistry, PolicySnapshot, RegistryError};

/// Where permission checks get role data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionSource {
    /// Roles embedded in the token, mapped through the cached policy.
    TokenSnapshot,
    /// The identity's current assignments in the registry.
    Live,
}

/// Composes the token codec and permission registry into request checks.
pub struct AuthorizationGate {
    codec: Arc<TokenCodec>,
    registry: Arc<PermissionRegistry>,
    policy: RwLock<Option<(u64, Arc<PolicySnapshot>)>>,
}

impl AuthorizationGate {
    pub fn new(codec: Arc<TokenCodec>, registry: Arc<PermissionRegistry>) -> Self {
        Self {
            codec,
            registry,
            policy: RwLock::new(None),
        }
    }

    pub fn codec(&self) -> &Arc<TokenCodec> {
        &self.codec
    }

    pub fn registry(&self) -> &Arc<PermissionRegistry> {
        &self.registry
    }

    /// Validate an `Authorization` header value.
    pub fn authenticate(
        &self,
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedUser, AuthError> {
        let header = header.ok_or(AuthError::MissingCredential)?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MalformedCredential)?;

        match self.codec.validate(token, now) {
            Ok(claims) => Ok(AuthenticatedUser::from_claims(claims)),
            Err(e) => {
                tracing::warn!(reason = e.kind(), "Token rejected");
                Err(AuthError::InvalidToken(e))
            }
        }
    }

    /// Like [`authenticate`](Self::authenticate), but a missing or invalid
    /// credential yields `None` instead of an error.
    pub fn optional_authenticate(
        &self,
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<AuthenticatedUser> {
        header?;
        self.authenticate(header, now).ok()
    }

    /// Any-of match against the token's role snapshot.
    pub fn authorize_roles<S: AsRef<str>>(
        &self,
        user: &AuthenticatedUser,
        roles: &[S],
    ) -> Result<(), AuthError> {
        if user.has_any_role(roles) {
            Ok(())
        } else {
            tracing::debug!(user_id = %user.user_id, "Role check denied");
            Err(AuthError::Forbidden)
        }
    }

    /// Require `action` on `resource`.
    pub fn authorize_permission(
        &self,
        user: &AuthenticatedUser,
        resource: &str,
        action: &str,
        source: PermissionSource,
    ) -> Result<(), AuthError> {
        let allowed = match source {
            PermissionSource::TokenSnapshot => {
                let policy = self.policy().map_err(internal)?;
                policy.allows(user.roles.iter().map(String::as_str), resource, action)
            }
            PermissionSource::Live => {
                match self.registry.has_permission(&user.user_id, resource, action) {
                    Ok(allowed) => allowed,
                    // The identity was removed after the token was issued.
                    Err(RegistryError::NotFound(_)) => false,
                    Err(e) => return Err(internal(e)),
                }
            }
        };

        if allowed {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %user.user_id,
                resource,
                action,
                ?source,
                "Permission check denied"
            );
            Err(AuthError::Forbidden)
        }
    }

    /// Current policy snapshot, rebuilt when the registry has changed.
    pub fn policy(&self) -> Result<Arc<PolicySnapshot>, RegistryError> {
        let generation = self.registry.generation();
        {
            let cached = self.policy.read().unwrap_or_else(PoisonError::into_inner);
            if let Some((cached_generation, snapshot)) = cached.as_ref() {
                if *cached_generation == generation {
                    return Ok(Arc::clone(snapshot));
                }
            }
        }

        let snapshot = Arc::new(self.registry.policy_snapshot()?);
        let mut cached = self.policy.write().unwrap_or_else(PoisonError::into_inner);
        *cached = Some((generation, Arc::clone(&snapshot)));
        tracing::debug!(generation, roles = snapshot.role_count(), "Policy snapshot rebuilt");
        Ok(snapshot)
    }
}

fn internal(e: RegistryError) -> AuthError {
    AuthError::Internal(e.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::token::{test_codec, TokenError};
    use crate::models::Identity;
    use crate::registry::tests::temp_registry;
    use chrono::Duration;
    use tempfile::TempDir;

    pub(crate) fn seeded_gate() -> (AuthorizationGate, TempDir) {
        let (registry, dir) = temp_registry();
        registry.seed_defaults().unwrap();
        let gate = AuthorizationGate::new(Arc::new(test_codec()), Arc::new(registry));
        (gate, dir)
    }

    fn enroll(gate: &AuthorizationGate, email: &str, roles: &[&str]) -> AuthenticatedUser {
        let identity = Identity::new(email, "hash", email);
        let names: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        gate.registry().enroll(&identity, &names, "system").unwrap();
        let issued = gate
            .codec()
            .issue(identity.id, &identity.email, names, Utc::now())
            .unwrap();
        gate.authenticate(Some(&format!("Bearer {}", issued.token)), Utc::now())
            .unwrap()
    }

    #[test]
    fn missing_and_malformed_headers() {
        let (gate, _dir) = seeded_gate();
        let now = Utc::now();

        assert!(matches!(
            gate.authenticate(None, now),
            Err(AuthError::MissingCredential)
        ));
        for header in ["Basic abc", "Bearer", "Bearer ", "bearer token", "token"] {
            assert!(
                matches!(
                    gate.authenticate(Some(header), now),
                    Err(AuthError::MalformedCredential)
                ),
                "{header}"
            );
        }
    }

    #[test]
    fn invalid_token_collapses_sub_kind() {
        let (gate, _dir) = seeded_gate();
        let now = Utc::now();
        let issued = gate
            .codec()
            .issue(uuid::Uuid::new_v4(), "a@b.c", Vec::new(), now)
            .unwrap();
        let header = format!("Bearer {}", issued.token);

        assert!(matches!(
            gate.authenticate(Some(&header), now + Duration::days(2)),
            Err(AuthError::InvalidToken(TokenError::Expired))
        ));
        assert!(matches!(
            gate.authenticate(Some("Bearer not.a.token"), now),
            Err(AuthError::InvalidToken(TokenError::Malformed))
        ));
    }

    #[test]
    fn optional_authenticate_never_errors() {
        let (gate, _dir) = seeded_gate();
        let now = Utc::now();
        assert!(gate.optional_authenticate(None, now).is_none());
        assert!(gate.optional_authenticate(Some("Bearer junk"), now).is_none());

        let user = enroll(&gate, "n@example.org", &["nurse"]);
        let issued = gate
            .codec()
            .issue(user.user_id, &user.email, vec!["nurse".into()], now)
            .unwrap();
        let found = gate
            .optional_authenticate(Some(&format!("Bearer {}", issued.token)), now)
            .unwrap();
        assert_eq!(found.user_id, user.user_id);
    }

    #[test]
    fn role_check_is_any_of() {
        let (gate, _dir) = seeded_gate();
        let user = enroll(&gate, "lab@example.org", &["lab-tech"]);

        assert!(gate.authorize_roles(&user, &["admin", "lab-tech"]).is_ok());
        assert!(matches!(
            gate.authorize_roles(&user, &["admin"]),
            Err(AuthError::Forbidden)
        ));
    }

    #[test]
    fn snapshot_permissions_follow_seeded_matrix() {
        let (gate, _dir) = seeded_gate();
        let nurse = enroll(&gate, "nurse@example.org", &["nurse"]);
        let source = PermissionSource::TokenSnapshot;

        assert!(gate.authorize_permission(&nurse, "patients", "read", source).is_ok());
        assert!(matches!(
            gate.authorize_permission(&nurse, "patients", "create", source),
            Err(AuthError::Forbidden)
        ));
    }

    #[test]
    fn snapshot_cache_tracks_registry_changes() {
        let (gate, _dir) = seeded_gate();
        let nurse = enroll(&gate, "nurse@example.org", &["nurse"]);
        let source = PermissionSource::TokenSnapshot;
        assert!(gate
            .authorize_permission(&nurse, "observations", "create", source)
            .is_err());

        let registry = gate.registry();
        let role = registry.find_role_by_name("nurse").unwrap().unwrap();
        let create = registry
            .find_permission_by_name("observations:create")
            .unwrap()
            .unwrap();
        registry.grant_permission(&role.id, &create.id).unwrap();

        assert!(gate
            .authorize_permission(&nurse, "observations", "create", source)
            .is_ok());
    }

    #[test]
    fn live_source_sees_role_changes_snapshot_does_not() {
        let (gate, _dir) = seeded_gate();
        let user = enroll(&gate, "tech@example.org", &["lab-tech"]);
        let registry = gate.registry();

        let practitioner = registry.find_role_by_name("practitioner").unwrap().unwrap();
        registry
            .assign_role(&user.user_id, &practitioner.id, "admin")
            .unwrap();

        assert!(gate
            .authorize_permission(&user, "patients", "create", PermissionSource::Live)
            .is_ok());
        assert!(matches!(
            gate.authorize_permission(&user, "patients", "create", PermissionSource::TokenSnapshot),
            Err(AuthError::Forbidden)
        ));
    }

    #[test]
    fn live_check_for_deleted_identity_is_forbidden() {
        let (gate, _dir) = seeded_gate();
        let ghost = AuthenticatedUser {
            user_id: uuid::Uuid::new_v4(),
            email: "ghost@example.org".into(),
            roles: ["admin".to_string()].into(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        assert!(matches!(
            gate.authorize_permission(&ghost, "patients", "read", PermissionSource::Live),
            Err(AuthError::Forbidden)
        ));
        // The snapshot path trusts the token.
        assert!(gate
            .authorize_permission(&ghost, "patients", "read", PermissionSource::TokenSnapshot)
            .is_ok());
    }
}
