// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! Canonical permission set and default role matrix.
//!
//! | Role           | patients           | observations       | users |
//! |----------------|--------------------|--------------------|-------|
//! | `admin`        | all                | all                | all   |
//! | `practitioner` | create/read/update | create/read/update | -     |
//! | `nurse`        | read               | read               | -     |
//! | `lab-tech`     | read               | create/read/update | -     |
//!
//! `patient` is a known role name but is not seeded.

use serde::Serialize;
use utoipa::ToSchema;

use super::{PermissionRegistry, RegistryError, RegistryResult};
use crate::auth::roles::BuiltinRole;
use crate::models::{Permission, Role};

/// Resource tags covered by the canonical permission set.
pub const CANONICAL_RESOURCES: [&str; 3] = ["patients", "observations", "users"];

/// Actions covered by the canonical permission set.
pub const CANONICAL_ACTIONS: [&str; 4] = ["create", "read", "update", "delete"];

/// Permission names granted to a seeded role.
pub fn default_grants(role: BuiltinRole) -> &'static [&'static str] {
    match role {
        BuiltinRole::Admin => &[
            "patients:create",
            "patients:read",
            "patients:update",
            "patients:delete",
            "observations:create",
            "observations:read",
            "observations:update",
            "observations:delete",
            "users:create",
            "users:read",
            "users:update",
            "users:delete",
        ],
        BuiltinRole::Practitioner => &[
            "patients:create",
            "patients:read",
            "patients:update",
            "observations:create",
            "observations:read",
            "observations:update",
        ],
        BuiltinRole::Nurse => &["patients:read", "observations:read"],
        BuiltinRole::LabTech => &[
            "patients:read",
            "observations:create",
            "observations:read",
            "observations:update",
        ],
        BuiltinRole::Patient => &[],
    }
}

/// Roles created by [`PermissionRegistry::seed_defaults`].
pub const SEEDED_ROLES: [BuiltinRole; 4] = [
    BuiltinRole::Admin,
    BuiltinRole::Practitioner,
    BuiltinRole::Nurse,
    BuiltinRole::LabTech,
];

/// What a seeding run actually created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SeedReport {
    pub permissions_created: usize,
    pub roles_created: usize,
    pub grants_created: usize,
}

impl SeedReport {
    pub fn is_empty(&self) -> bool {
        self.permissions_created == 0 && self.roles_created == 0 && self.grants_created == 0
    }
}

/// Treat a lost creation race as "already there".
fn tolerate_conflict<T>(result: RegistryResult<T>) -> RegistryResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(RegistryError::Conflict(what)) => {
            tracing::debug!(%what, "Seed row created concurrently");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl PermissionRegistry {
    /// Ensure the canonical permissions, default roles and their grants.
    ///
    /// Idempotent, and safe to run from several tasks at once: the unique
    /// indexes inside each write transaction decide, and a `Conflict` from
    /// a concurrent seeder is swallowed.
    pub fn seed_defaults(&self) -> RegistryResult<SeedReport> {
        let mut report = SeedReport::default();

        let mut permissions = Vec::with_capacity(12);
        for resource in CANONICAL_RESOURCES {
            for action in CANONICAL_ACTIONS {
                let (permission, created) = self.ensure_permission(resource, action)?;
                report.permissions_created += usize::from(created);
                permissions.push(permission);
            }
        }

        for builtin in SEEDED_ROLES {
            let (role, created) = self.ensure_role(builtin)?;
            report.roles_created += usize::from(created);

            for name in default_grants(builtin) {
                if role.permissions.iter().any(|p| p.name == *name) {
                    continue;
                }
                let Some(permission) = permissions.iter().find(|p| p.name == *name) else {
                    continue;
                };
                if tolerate_conflict(self.grant_permission(&role.id, &permission.id))?.is_some() {
                    report.grants_created += 1;
                }
            }
        }

        if report.is_empty() {
            tracing::debug!("Default roles already present");
        } else {
            tracing::info!(
                permissions = report.permissions_created,
                roles = report.roles_created,
                grants = report.grants_created,
                "Default roles seeded"
            );
        }
        Ok(report)
    }

    fn ensure_permission(
        &self,
        resource: &str,
        action: &str,
    ) -> RegistryResult<(Permission, bool)> {
        let name = format!("{resource}:{action}");
        if let Some(existing) = self.find_permission_by_name(&name)? {
            return Ok((existing, false));
        }

        let description = format!("{} {resource}", capitalize(action));
        match tolerate_conflict(self.create_permission(&name, &description, resource, action))? {
            Some(created) => Ok((created, true)),
            None => self
                .find_permission_by_name(&name)?
                .map(|p| (p, false))
                .ok_or_else(|| RegistryError::NotFound(format!("Permission '{name}'"))),
        }
    }

    fn ensure_role(&self, builtin: BuiltinRole) -> RegistryResult<(Role, bool)> {
        let name = builtin.as_str();
        if let Some(existing) = self.find_role_by_name(name)? {
            return Ok((existing, false));
        }

        let description = format!("Default {name} role");
        match tolerate_conflict(self.create_role(name, &description, &[]))? {
            Some(created) => Ok((created, true)),
            None => self
                .find_role_by_name(name)?
                .map(|r| (r, false))
                .ok_or_else(|| RegistryError::NotFound(format!("Role '{name}'"))),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
