// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! # Data Models
//!
//! Records persisted by the auth database and the request/response shapes
//! of the auth API. Persisted records derive `Serialize`/`Deserialize`;
//! anything that crosses the HTTP boundary also derives `ToSchema`.
//!
//! ## Model Categories
//!
//! - **Identities**: callers that can log in (credential store)
//! - **RBAC**: roles, permissions and the links between them
//! - **Auth API**: login, registration, refresh and profile payloads
//! - **Admin API**: role/permission administration payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// =============================================================================
// Identities
// =============================================================================

/// A caller that can authenticate with an email and secret.
///
/// The secret hash is persisted but never leaves the crate through the API;
/// use [`IdentityProfile`] for responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    /// Normalised (trimmed, lower-cased) email.
    pub email: String,
    /// Argon2 PHC string.
    pub secret_hash: String,
    pub display_name: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Build a new, active identity with a fresh id.
    pub fn new(
        email: &str,
        secret_hash: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            secret_hash: secret_hash.into(),
            display_name: display_name.into(),
            active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Canonical form used for the unique email index.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Public view of an identity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct IdentityProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub active: bool,
    /// Role names currently assigned in the registry.
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl IdentityProfile {
    pub fn new(identity: &Identity, roles: Vec<String>) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            active: identity.active,
            roles,
            last_login_at: identity.last_login_at,
        }
    }
}

// =============================================================================
// RBAC
// =============================================================================

/// A named capability: one action on one resource type.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub struct Permission {
    pub id: Uuid,
    /// Unique name, conventionally `<resource>:<action>`.
    pub name: String,
    pub description: String,
    /// Resource tag, e.g. `patients`.
    pub resource: String,
    /// Action tag, e.g. `read`.
    pub action: String,
    pub created_at: DateTime<Utc>,
}

impl Permission {
    /// Whether this permission grants `action` on `resource`.
    pub fn grants(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }
}

/// A role together with the permissions linked to it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
}

/// A role row as persisted; permissions live in the link tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleRecord {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl RoleRecord {
    pub fn with_permissions(self, permissions: Vec<Permission>) -> Role {
        Role {
            id: self.id,
            name: self.name,
            description: self.description,
            permissions,
            created_at: self.created_at,
        }
    }
}

/// An identity's membership in a role.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct RoleAssignment {
    pub identity_id: Uuid,
    pub role_id: Uuid,
    /// Who granted the role (identity id or `system`).
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
}

// =============================================================================
// Auth API
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    /// Requested role names; defaults to `nurse` when empty.
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RefreshRequest {
    /// A currently valid token.
    pub token: String,
}

/// Token issued by login, registration or refresh.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    /// Role snapshot embedded in the token.
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<IdentityProfile>,
}

impl TokenResponse {
    pub fn bearer(
        token: String,
        expires_at: DateTime<Utc>,
        roles: Vec<String>,
        user: Option<IdentityProfile>,
    ) -> Self {
        Self {
            token,
            token_type: "Bearer".to_string(),
            expires_at,
            roles,
            user,
        }
    }
}

// =============================================================================
// Admin API
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permission_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePermissionRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub resource: String,
    pub action: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_identity_normalises_email() {
        let identity = Identity::new("  Dr.House@Example.ORG ", "hash", "Greg House");
        assert_eq!(identity.email, "dr.house@example.org");
        assert!(identity.active);
        assert!(identity.last_login_at.is_none());
    }

    #[test]
    fn profile_never_serializes_secret_hash() {
        let identity = Identity::new("nurse@example.org", "$argon2id$secret", "Nurse Joy");
        let profile = IdentityProfile::new(&identity, vec!["nurse".to_string()]);
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"roles\":[\"nurse\"]"));
    }

    #[test]
    fn permission_grants_matches_resource_and_action() {
        let permission = Permission {
            id: Uuid::new_v4(),
            name: "patients:read".to_string(),
            description: String::new(),
            resource: "patients".to_string(),
            action: "read".to_string(),
            created_at: Utc::now(),
        };
        assert!(permission.grants("patients", "read"));
        assert!(!permission.grants("patients", "delete"));
        assert!(!permission.grants("observations", "read"));
    }
}
