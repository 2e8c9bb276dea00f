// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! Login, registration and password-change flows.
//!
//! Every method here is blocking (Argon2 and redb); HTTP handlers call
//! them through `tokio::task::spawn_blocking`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::roles::BuiltinRole;
use super::token::{IssuedToken, TokenCodec, TokenError};
use crate::credentials::{CredentialError, CredentialVerifier};
use crate::models::{Identity, IdentityProfile};
use crate::registry::{PermissionRegistry, RegistryError};
use crate::storage::{AuditEvent, AuditEventType, AuditRepository, AuthStore, StoreError};

/// Minimum accepted password length (characters).
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Validation(String),
}

/// A successful login or registration.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: IssuedToken,
    pub identity: Identity,
    /// Role names embedded in the token.
    pub roles: Vec<String>,
}

impl LoginOutcome {
    pub fn profile(&self) -> IdentityProfile {
        IdentityProfile::new(&self.identity, self.roles.clone())
    }
}

/// Input for [`AuthService::register`].
#[derive(Debug, Clone)]
pub struct Registration<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub display_name: &'a str,
    /// Requested role names; `nurse` when empty.
    pub roles: Vec<String>,
    /// Who created the identity (`self` or an admin's identity id).
    pub granted_by: &'a str,
}

/// Composes the identity store, credential verifier, registry and codec.
pub struct AuthService {
    store: Arc<AuthStore>,
    registry: Arc<PermissionRegistry>,
    codec: Arc<TokenCodec>,
    verifier: Arc<CredentialVerifier>,
}

impl AuthService {
    pub fn new(
        store: Arc<AuthStore>,
        registry: Arc<PermissionRegistry>,
        codec: Arc<TokenCodec>,
        verifier: Arc<CredentialVerifier>,
    ) -> Self {
        Self {
            store,
            registry,
            codec,
            verifier,
        }
    }

    fn audit(&self) -> AuditRepository<'_> {
        AuditRepository::new(&self.store)
    }

    /// Verify an email/password pair and issue a token.
    ///
    /// Unknown email, inactive identity and wrong password are all reported
    /// as `InvalidCredentials`, after the same amount of hashing work.
    pub fn login(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, ServiceError> {
        let identity = match self.store.find_identity_by_email(email)? {
            Some(identity) => identity,
            None => {
                self.verifier.verify_dummy(password);
                return Err(self.login_failed(email, "unknown_email"));
            }
        };

        if !self.verifier.verify(password, &identity.secret_hash) {
            return Err(self.login_failed(email, "wrong_password"));
        }
        if !identity.active {
            return Err(self.login_failed(email, "inactive"));
        }

        let roles = self.registry.effective_role_names(&identity.id)?;
        self.store.record_login(&identity.id, now)?;
        let token = self
            .codec
            .issue(identity.id, &identity.email, roles.clone(), now)?;

        tracing::info!(user_id = %identity.id, "Login succeeded");
        self.audit().record(
            AuditEvent::new(AuditEventType::LoginSucceeded)
                .with_actor(identity.id.to_string())
                .with_resource("identity", identity.id),
        );

        let identity = Identity {
            last_login_at: Some(now),
            ..identity
        };
        Ok(LoginOutcome {
            token,
            identity,
            roles,
        })
    }

    fn login_failed(&self, email: &str, reason: &'static str) -> ServiceError {
        tracing::warn!(reason, "Login failed");
        self.audit().record(
            AuditEvent::new(AuditEventType::LoginFailed)
                .with_details(serde_json::json!({ "email": email, "reason": reason }))
                .failed(),
        );
        CredentialError::InvalidCredentials.into()
    }

    /// Create an identity with the requested roles and issue its first token.
    pub fn register(
        &self,
        registration: Registration<'_>,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, ServiceError> {
        validate_email(registration.email)?;
        validate_password(registration.password)?;
        let display_name = registration.display_name.trim();
        if display_name.is_empty() {
            return Err(ServiceError::Validation(
                "display_name must not be empty".to_string(),
            ));
        }

        let mut roles = registration.roles;
        if roles.is_empty() {
            roles.push(BuiltinRole::default().as_str().to_string());
        }
        roles.sort();
        roles.dedup();

        let secret_hash = self.verifier.hash(registration.password)?;
        let identity = Identity::new(registration.email, secret_hash, display_name);

        self.registry
            .enroll(&identity, &roles, registration.granted_by)
            .map_err(|e| match e {
                RegistryError::NotFound(what) => {
                    ServiceError::Validation(format!("Invalid role: {what} does not exist"))
                }
                other => other.into(),
            })?;

        let token = self
            .codec
            .issue(identity.id, &identity.email, roles.clone(), now)?;

        tracing::info!(user_id = %identity.id, roles = ?roles, "Identity registered");
        self.audit().record(
            AuditEvent::new(AuditEventType::IdentityRegistered)
                .with_actor(registration.granted_by)
                .with_resource("identity", identity.id)
                .with_details(serde_json::json!({ "roles": roles })),
        );

        Ok(LoginOutcome {
            token,
            identity,
            roles,
        })
    }

    /// Replace an identity's password after checking the current one.
    pub fn change_password(
        &self,
        identity_id: &Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let identity = self
            .store
            .get_identity(identity_id)?
            .ok_or(CredentialError::InvalidCredentials)?;

        if !self.verifier.verify(current_password, &identity.secret_hash) {
            return Err(CredentialError::InvalidCredentials.into());
        }
        validate_password(new_password)?;

        let secret_hash = self.verifier.hash(new_password)?;
        self.store.update_secret_hash(identity_id, &secret_hash)?;

        tracing::info!(user_id = %identity_id, "Password changed");
        self.audit().record(
            AuditEvent::new(AuditEventType::PasswordChanged)
                .with_actor(identity_id.to_string())
                .with_resource("identity", identity_id),
        );
        Ok(())
    }

    /// Extend a valid token; the role snapshot is carried over unchanged.
    pub fn refresh(&self, token: &str, now: DateTime<Utc>) -> Result<IssuedToken, ServiceError> {
        Ok(self.codec.refresh(token, now)?)
    }

    /// Current profile with live role names.
    pub fn profile(&self, identity_id: &Uuid) -> Result<IdentityProfile, ServiceError> {
        let identity = self
            .store
            .get_identity(identity_id)?
            .ok_or_else(|| RegistryError::NotFound(format!("Identity {identity_id}")))?;
        let roles = self.registry.effective_role_names(identity_id)?;
        Ok(IdentityProfile::new(&identity, roles))
    }
}

fn validate_email(email: &str) -> Result<(), ServiceError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid && email.len() <= 254 {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!("Invalid email: {email}")))
    }
}

fn validate_password(password: &str) -> Result<(), ServiceError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::token::test_codec;
    use crate::credentials::test_verifier;
    use crate::registry::tests::temp_registry;
    use chrono::Duration;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    pub(crate) fn test_service() -> (AuthService, Arc<PermissionRegistry>, TempDir) {
        let (registry, dir) = temp_registry();
        registry.seed_defaults().unwrap();
        let registry = Arc::new(registry);
        let service = AuthService::new(
            Arc::clone(registry.store()),
            Arc::clone(&registry),
            Arc::new(test_codec()),
            Arc::new(test_verifier()),
        );
        (service, registry, dir)
    }

    fn registration<'a>(email: &'a str, roles: &[&str]) -> Registration<'a> {
        Registration {
            email,
            password: "s3cure-passw0rd",
            display_name: "Test User",
            roles: roles.iter().map(|r| r.to_string()).collect(),
            granted_by: "self",
        }
    }

    #[test]
    fn register_then_login() {
        let (service, _registry, _dir) = test_service();
        let now = Utc::now();

        let registered = service
            .register(registration("dr@example.org", &["practitioner"]), now)
            .unwrap();
        assert_eq!(registered.roles, vec!["practitioner"]);

        let outcome = service
            .login("DR@example.org", "s3cure-passw0rd", now)
            .unwrap();
        assert_eq!(outcome.identity.id, registered.identity.id);
        assert_eq!(outcome.roles, vec!["practitioner"]);
        assert_eq!(outcome.identity.last_login_at, Some(now));

        let stored = service.profile(&outcome.identity.id).unwrap();
        assert!(stored.last_login_at.is_some());
    }

    #[test]
    fn register_defaults_to_nurse() {
        let (service, _registry, _dir) = test_service();
        let outcome = service
            .register(registration("n@example.org", &[]), Utc::now())
            .unwrap();
        assert_eq!(outcome.roles, vec!["nurse"]);
    }

    #[test]
    fn register_rejects_bad_input() {
        let (service, _registry, _dir) = test_service();
        let now = Utc::now();

        let mut short = registration("a@example.org", &[]);
        short.password = "short";
        assert!(matches!(
            service.register(short, now),
            Err(ServiceError::Validation(_))
        ));

        assert!(matches!(
            service.register(registration("not-an-email", &[]), now),
            Err(ServiceError::Validation(_))
        ));

        assert!(matches!(
            service.register(registration("b@example.org", &["wizard"]), now),
            Err(ServiceError::Validation(_))
        ));
        assert!(service.login("b@example.org", "s3cure-passw0rd", now).is_err());
    }

    #[test]
    fn duplicate_email_conflicts() {
        let (service, _registry, _dir) = test_service();
        let now = Utc::now();
        service.register(registration("c@example.org", &[]), now).unwrap();
        assert!(matches!(
            service.register(registration("C@EXAMPLE.org", &[]), now),
            Err(ServiceError::Registry(RegistryError::Conflict(_)))
        ));
    }

    #[test]
    fn login_failures_are_indistinguishable() {
        let (service, _registry, _dir) = test_service();
        let now = Utc::now();
        let outcome = service
            .register(registration("d@example.org", &[]), now)
            .unwrap();

        let unknown = service.login("nobody@example.org", "s3cure-passw0rd", now);
        let wrong = service.login("d@example.org", "wrong-password", now);
        service
            .store
            .set_identity_active(&outcome.identity.id, false)
            .unwrap();
        let inactive = service.login("d@example.org", "s3cure-passw0rd", now);

        for result in [unknown, wrong, inactive] {
            match result {
                Err(e) => assert_eq!(e.to_string(), "Invalid email or password"),
                Ok(_) => panic!("login should fail"),
            }
        }

        let failures = service.audit().recent(10).unwrap();
        assert_eq!(
            failures
                .iter()
                .filter(|e| e.event_type == AuditEventType::LoginFailed)
                .count(),
            3
        );
    }

    #[test]
    fn login_picks_up_role_changes_refresh_does_not() {
        let (service, registry, _dir) = test_service();
        let now = Utc::now();
        let outcome = service
            .register(registration("e@example.org", &["nurse"]), now)
            .unwrap();

        let admin = registry.find_role_by_name("admin").unwrap().unwrap();
        registry
            .assign_role(&outcome.identity.id, &admin.id, "test")
            .unwrap();

        let refreshed = service
            .refresh(&outcome.token.token, now + Duration::minutes(5))
            .unwrap();
        let claims = test_codec()
            .validate(&refreshed.token, now + Duration::minutes(5))
            .unwrap();
        assert_eq!(claims.roles, BTreeSet::from(["nurse".to_string()]));

        let relogin = service.login("e@example.org", "s3cure-passw0rd", now).unwrap();
        assert_eq!(relogin.roles, vec!["admin", "nurse"]);
    }

    #[test]
    fn change_password_flow() {
        let (service, _registry, _dir) = test_service();
        let now = Utc::now();
        let outcome = service
            .register(registration("f@example.org", &[]), now)
            .unwrap();
        let id = outcome.identity.id;

        assert!(matches!(
            service.change_password(&id, "wrong-password", "n3w-passw0rd"),
            Err(ServiceError::Credential(CredentialError::InvalidCredentials))
        ));
        assert!(matches!(
            service.change_password(&id, "s3cure-passw0rd", "short"),
            Err(ServiceError::Validation(_))
        ));

        service
            .change_password(&id, "s3cure-passw0rd", "n3w-passw0rd")
            .unwrap();
        assert!(service.login("f@example.org", "s3cure-passw0rd", now).is_err());
        assert!(service.login("f@example.org", "n3w-passw0rd", now).is_ok());
    }
}
