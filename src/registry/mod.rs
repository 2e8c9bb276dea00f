// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! # Permission Registry
//!
//! Durable role-based access control: roles, permissions, role-permission
//! grants and identity-role assignments, all stored in the auth database.
//!
//! ## Consistency
//!
//! Every mutation runs in exactly one redb write transaction. A failing
//! step returns `Err` from the transaction closure, which aborts it, so no
//! partial write is ever visible. redb admits one writer at a time, which
//! makes the unique-name checks inside a write transaction authoritative.
//!
//! ## Generation
//!
//! The registry keeps an in-memory generation counter that is bumped after
//! every committed mutation. The authorization gate uses it to know when
//! its cached [`PolicySnapshot`] is stale.

pub mod defaults;
pub mod policy;

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use redb::{ReadableTable, WriteTransaction};
use uuid::Uuid;

use crate::models::{Identity, Permission, Role, RoleAssignment, RoleRecord};
use crate::storage::database::{
    decode, encode, link_key, link_prefix_bounds, split_link_key, IDENTITY_ROLES, PERMISSIONS,
    PERMISSION_NAMES, PERMISSION_ROLES, ROLES, ROLE_IDENTITIES, ROLE_NAMES, ROLE_PERMISSIONS,
};
use crate::storage::identities::{identity_exists, insert_identity, read_identity};
use crate::storage::{AuthStore, StoreError};

pub use defaults::SeedReport;
pub use policy::PolicySnapshot;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Route raw redb/serde errors through `StoreError`.
macro_rules! via_store_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for RegistryError {
                fn from(err: $ty) -> Self {
                    RegistryError::Store(StoreError::from(err))
                }
            }
        )*
    };
}

via_store_error!(
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
    serde_json::Error,
);

fn corrupt(err: impl std::fmt::Display) -> RegistryError {
    RegistryError::Store(StoreError::Corrupt(err.to_string()))
}

// =============================================================================
// Table helpers
// =============================================================================

fn load_role_record<T>(roles: &T, id: &Uuid) -> RegistryResult<Option<RoleRecord>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let key = id.to_string();
    match roles.get(key.as_str())? {
        Some(value) => Ok(Some(decode(value.value())?)),
        None => Ok(None),
    }
}

fn load_permission<T>(permissions: &T, id: &Uuid) -> RegistryResult<Option<Permission>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let key = id.to_string();
    match permissions.get(key.as_str())? {
        Some(value) => Ok(Some(decode(value.value())?)),
        None => Ok(None),
    }
}

fn lookup_name<T>(names: &T, name: &str) -> RegistryResult<Option<Uuid>>
where
    T: ReadableTable<&'static str, &'static str>,
{
    match names.get(name)? {
        Some(value) => Uuid::parse_str(value.value()).map(Some).map_err(corrupt),
        None => Ok(None),
    }
}

/// Right-hand ids of every link whose left half is `left`.
fn linked_ids<T, V>(links: &T, left: &Uuid) -> RegistryResult<Vec<Uuid>>
where
    T: ReadableTable<&'static [u8], V>,
    V: redb::Value + 'static,
{
    let (start, end) = link_prefix_bounds(left);
    let mut ids = Vec::new();
    for entry in links.range(start.as_slice()..=end.as_slice())? {
        let (key, _) = entry?;
        let (_, right) = split_link_key(key.value())?;
        ids.push(right);
    }
    Ok(ids)
}

/// Permissions granted to one role, sorted by name.
fn role_permissions<G, P>(
    grants: &G,
    permissions: &P,
    role_id: &Uuid,
) -> RegistryResult<Vec<Permission>>
where
    G: ReadableTable<&'static [u8], i64>,
    P: ReadableTable<&'static str, &'static [u8]>,
{
    let mut result = Vec::new();
    for permission_id in linked_ids(grants, role_id)? {
        let permission = load_permission(permissions, &permission_id)?
            .ok_or_else(|| corrupt(format!("dangling grant to permission {permission_id}")))?;
        result.push(permission);
    }
    result.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(result)
}

/// Insert a role-permission link in both directions.
fn insert_grant(
    txn: &WriteTransaction,
    role_id: &Uuid,
    permission_id: &Uuid,
) -> RegistryResult<()> {
    let mut grants = txn.open_table(ROLE_PERMISSIONS)?;
    let key = link_key(role_id, permission_id);
    if grants.get(key.as_slice())?.is_some() {
        return Err(RegistryError::Conflict(format!(
            "Permission {permission_id} on role {role_id}"
        )));
    }
    grants.insert(key.as_slice(), Utc::now().timestamp())?;

    let mut reverse = txn.open_table(PERMISSION_ROLES)?;
    reverse.insert(link_key(permission_id, role_id).as_slice(), ())?;
    Ok(())
}

/// Insert an identity-role assignment in both directions.
fn insert_assignment(
    txn: &WriteTransaction,
    identity_id: &Uuid,
    role_id: &Uuid,
    granted_by: &str,
) -> RegistryResult<RoleAssignment> {
    if !identity_exists(txn, identity_id)? {
        return Err(RegistryError::NotFound(format!("Identity {identity_id}")));
    }
    {
        let roles = txn.open_table(ROLES)?;
        if load_role_record(&roles, role_id)?.is_none() {
            return Err(RegistryError::NotFound(format!("Role {role_id}")));
        }
    }

    let mut assignments = txn.open_table(IDENTITY_ROLES)?;
    let key = link_key(identity_id, role_id);
    if assignments.get(key.as_slice())?.is_some() {
        return Err(RegistryError::Conflict(format!(
            "Role {role_id} for identity {identity_id}"
        )));
    }

    let assignment = RoleAssignment {
        identity_id: *identity_id,
        role_id: *role_id,
        granted_by: granted_by.to_string(),
        granted_at: Utc::now(),
    };
    assignments.insert(key.as_slice(), encode(&assignment)?.as_slice())?;

    let mut reverse = txn.open_table(ROLE_IDENTITIES)?;
    reverse.insert(link_key(role_id, identity_id).as_slice(), ())?;
    Ok(assignment)
}

fn paginate<T>(items: Vec<T>, page: usize, limit: usize) -> Vec<T> {
    let offset = page.saturating_sub(1).saturating_mul(limit);
    items.into_iter().skip(offset).take(limit).collect()
}

// =============================================================================
// PermissionRegistry
// =============================================================================

/// Durable RBAC registry.
pub struct PermissionRegistry {
    store: Arc<AuthStore>,
    generation: AtomicU64,
}

impl PermissionRegistry {
    pub fn new(store: Arc<AuthStore>) -> Self {
        Self {
            store,
            generation: AtomicU64::new(0),
        }
    }

    /// The store this registry writes to.
    pub fn store(&self) -> &Arc<AuthStore> {
        &self.store
    }

    /// Current policy generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Run one mutation transaction and bump the generation on commit.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> RegistryResult<T>,
    ) -> RegistryResult<T> {
        let value = self.store.write(f)?;
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(value)
    }

    // -------------------------------------------------------------------------
    // Roles
    // -------------------------------------------------------------------------

    /// Create a role linked to the given permissions.
    ///
    /// Fails with `Conflict` on a duplicate name and with `NotFound` if any
    /// permission id is unknown; in both cases nothing is written.
    pub fn create_role(
        &self,
        name: &str,
        description: &str,
        permission_ids: &[Uuid],
    ) -> RegistryResult<Role> {
        let record = RoleRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        };

        let mut permissions = self.mutate(|txn| {
            let mut names = txn.open_table(ROLE_NAMES)?;
            if names.get(record.name.as_str())?.is_some() {
                return Err(RegistryError::Conflict(format!("Role '{}'", record.name)));
            }

            let mut permissions: Vec<Permission> = Vec::with_capacity(permission_ids.len());
            {
                let table = txn.open_table(PERMISSIONS)?;
                for permission_id in permission_ids {
                    let permission = load_permission(&table, permission_id)?.ok_or_else(|| {
                        RegistryError::NotFound(format!("Permission {permission_id}"))
                    })?;
                    if !permissions.iter().any(|p| p.id == permission.id) {
                        permissions.push(permission);
                    }
                }
            }

            let id = record.id.to_string();
            let mut roles = txn.open_table(ROLES)?;
            roles.insert(id.as_str(), encode(&record)?.as_slice())?;
            names.insert(record.name.as_str(), id.as_str())?;

            for permission in &permissions {
                insert_grant(txn, &record.id, &permission.id)?;
            }
            Ok(permissions)
        })?;

        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::info!(role = %record.name, role_id = %record.id, "Role created");
        Ok(record.with_permissions(permissions))
    }

    /// Look up a role with its permissions.
    pub fn get_role(&self, role_id: &Uuid) -> RegistryResult<Role> {
        self.store.read(|txn| -> RegistryResult<Role> {
            let roles = txn.open_table(ROLES)?;
            let record = load_role_record(&roles, role_id)?
                .ok_or_else(|| RegistryError::NotFound(format!("Role {role_id}")))?;
            let grants = txn.open_table(ROLE_PERMISSIONS)?;
            let permissions = txn.open_table(PERMISSIONS)?;
            let granted = role_permissions(&grants, &permissions, role_id)?;
            Ok(record.with_permissions(granted))
        })
    }

    pub fn find_role_by_name(&self, name: &str) -> RegistryResult<Option<Role>> {
        let role_id = self.store.read(|txn| -> RegistryResult<Option<Uuid>> {
            let names = txn.open_table(ROLE_NAMES)?;
            lookup_name(&names, name)
        })?;
        match role_id {
            Some(id) => self.get_role(&id).map(Some),
            None => Ok(None),
        }
    }

    /// Every role, sorted by name.
    pub fn all_roles(&self) -> RegistryResult<Vec<Role>> {
        self.store.read(|txn| -> RegistryResult<Vec<Role>> {
            let roles = txn.open_table(ROLES)?;
            let grants = txn.open_table(ROLE_PERMISSIONS)?;
            let permissions = txn.open_table(PERMISSIONS)?;

            let mut result = Vec::new();
            for entry in roles.iter()? {
                let (_, value) = entry?;
                let record: RoleRecord = decode(value.value())?;
                let granted = role_permissions(&grants, &permissions, &record.id)?;
                result.push(record.with_permissions(granted));
            }
            result.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(result)
        })
    }

    /// One page of roles (1-based) plus the total count.
    pub fn list_roles(&self, page: usize, limit: usize) -> RegistryResult<(Vec<Role>, usize)> {
        let roles = self.all_roles()?;
        let total = roles.len();
        Ok((paginate(roles, page, limit), total))
    }

    /// Delete a role together with its assignments and grants.
    pub fn delete_role(&self, role_id: &Uuid) -> RegistryResult<()> {
        let name = self.mutate(|txn| {
            let record: RoleRecord = {
                let mut roles = txn.open_table(ROLES)?;
                let key = role_id.to_string();
                let removed = roles
                    .remove(key.as_str())?
                    .ok_or_else(|| RegistryError::NotFound(format!("Role {role_id}")))?;
                decode(removed.value())?
            };
            let mut names = txn.open_table(ROLE_NAMES)?;
            names.remove(record.name.as_str())?;

            let mut members = txn.open_table(ROLE_IDENTITIES)?;
            let mut assignments = txn.open_table(IDENTITY_ROLES)?;
            for identity_id in linked_ids(&members, role_id)? {
                members.remove(link_key(role_id, &identity_id).as_slice())?;
                assignments.remove(link_key(&identity_id, role_id).as_slice())?;
            }

            let mut grants = txn.open_table(ROLE_PERMISSIONS)?;
            let mut reverse = txn.open_table(PERMISSION_ROLES)?;
            for permission_id in linked_ids(&grants, role_id)? {
                grants.remove(link_key(role_id, &permission_id).as_slice())?;
                reverse.remove(link_key(&permission_id, role_id).as_slice())?;
            }
            Ok(record.name)
        })?;

        tracing::info!(role = %name, role_id = %role_id, "Role deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Permissions
    // -------------------------------------------------------------------------

    /// Create a permission. Fails with `Conflict` on a duplicate name.
    pub fn create_permission(
        &self,
        name: &str,
        description: &str,
        resource: &str,
        action: &str,
    ) -> RegistryResult<Permission> {
        let permission = Permission {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            resource: resource.to_string(),
            action: action.to_string(),
            created_at: Utc::now(),
        };

        self.mutate(|txn| {
            let mut names = txn.open_table(PERMISSION_NAMES)?;
            if names.get(permission.name.as_str())?.is_some() {
                return Err(RegistryError::Conflict(format!(
                    "Permission '{}'",
                    permission.name
                )));
            }
            let id = permission.id.to_string();
            let mut permissions = txn.open_table(PERMISSIONS)?;
            permissions.insert(id.as_str(), encode(&permission)?.as_slice())?;
            names.insert(permission.name.as_str(), id.as_str())?;
            Ok(())
        })?;

        tracing::info!(permission = %permission.name, "Permission created");
        Ok(permission)
    }

    pub fn get_permission(&self, permission_id: &Uuid) -> RegistryResult<Permission> {
        self.store.read(|txn| -> RegistryResult<Permission> {
            let permissions = txn.open_table(PERMISSIONS)?;
            load_permission(&permissions, permission_id)?
                .ok_or_else(|| RegistryError::NotFound(format!("Permission {permission_id}")))
        })
    }

    pub fn find_permission_by_name(&self, name: &str) -> RegistryResult<Option<Permission>> {
        self.store.read(|txn| -> RegistryResult<Option<Permission>> {
            let names = txn.open_table(PERMISSION_NAMES)?;
            let Some(id) = lookup_name(&names, name)? else {
                return Ok(None);
            };
            let permissions = txn.open_table(PERMISSIONS)?;
            load_permission(&permissions, &id)
        })
    }

    /// Every permission, sorted by name.
    pub fn all_permissions(&self) -> RegistryResult<Vec<Permission>> {
        self.store.read(|txn| -> RegistryResult<Vec<Permission>> {
            let permissions = txn.open_table(PERMISSIONS)?;
            let mut result: Vec<Permission> = Vec::new();
            for entry in permissions.iter()? {
                let (_, value) = entry?;
                result.push(decode(value.value())?);
            }
            result.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(result)
        })
    }

    /// One page of permissions (1-based) plus the total count.
    pub fn list_permissions(
        &self,
        page: usize,
        limit: usize,
    ) -> RegistryResult<(Vec<Permission>, usize)> {
        let permissions = self.all_permissions()?;
        let total = permissions.len();
        Ok((paginate(permissions, page, limit), total))
    }

    /// Delete a permission and every grant referencing it.
    pub fn delete_permission(&self, permission_id: &Uuid) -> RegistryResult<()> {
        let name = self.mutate(|txn| {
            let permission: Permission = {
                let mut permissions = txn.open_table(PERMISSIONS)?;
                let key = permission_id.to_string();
                let removed = permissions.remove(key.as_str())?.ok_or_else(|| {
                    RegistryError::NotFound(format!("Permission {permission_id}"))
                })?;
                decode(removed.value())?
            };
            let mut names = txn.open_table(PERMISSION_NAMES)?;
            names.remove(permission.name.as_str())?;

            let mut reverse = txn.open_table(PERMISSION_ROLES)?;
            let mut grants = txn.open_table(ROLE_PERMISSIONS)?;
            for role_id in linked_ids(&reverse, permission_id)? {
                reverse.remove(link_key(permission_id, &role_id).as_slice())?;
                grants.remove(link_key(&role_id, permission_id).as_slice())?;
            }
            Ok(permission.name)
        })?;

        tracing::info!(permission = %name, "Permission deleted");
        Ok(())
    }

    /// Link an existing permission to an existing role.
    pub fn grant_permission(&self, role_id: &Uuid, permission_id: &Uuid) -> RegistryResult<()> {
        self.mutate(|txn| {
            {
                let roles = txn.open_table(ROLES)?;
                if load_role_record(&roles, role_id)?.is_none() {
                    return Err(RegistryError::NotFound(format!("Role {role_id}")));
                }
                let permissions = txn.open_table(PERMISSIONS)?;
                if load_permission(&permissions, permission_id)?.is_none() {
                    return Err(RegistryError::NotFound(format!(
                        "Permission {permission_id}"
                    )));
                }
            }
            insert_grant(txn, role_id, permission_id)
        })
    }

    /// Remove a role-permission link. `NotFound` if it does not exist.
    pub fn revoke_permission(&self, role_id: &Uuid, permission_id: &Uuid) -> RegistryResult<()> {
        self.mutate(|txn| {
            let mut grants = txn.open_table(ROLE_PERMISSIONS)?;
            if grants
                .remove(link_key(role_id, permission_id).as_slice())?
                .is_none()
            {
                return Err(RegistryError::NotFound(format!(
                    "Permission {permission_id} on role {role_id}"
                )));
            }
            let mut reverse = txn.open_table(PERMISSION_ROLES)?;
            reverse.remove(link_key(permission_id, role_id).as_slice())?;
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Assignments
    // -------------------------------------------------------------------------

    /// Assign a role to an identity.
    ///
    /// `NotFound` if either side is absent, `Conflict` if already assigned.
    pub fn assign_role(
        &self,
        identity_id: &Uuid,
        role_id: &Uuid,
        granted_by: &str,
    ) -> RegistryResult<RoleAssignment> {
        let assignment =
            self.mutate(|txn| insert_assignment(txn, identity_id, role_id, granted_by))?;
        tracing::info!(
            identity_id = %identity_id,
            role_id = %role_id,
            granted_by = %granted_by,
            "Role assigned"
        );
        Ok(assignment)
    }

    /// Remove a role from an identity. `NotFound` if not assigned.
    pub fn unassign_role(&self, identity_id: &Uuid, role_id: &Uuid) -> RegistryResult<()> {
        self.mutate(|txn| {
            let mut assignments = txn.open_table(IDENTITY_ROLES)?;
            if assignments
                .remove(link_key(identity_id, role_id).as_slice())?
                .is_none()
            {
                return Err(RegistryError::NotFound(format!(
                    "Role {role_id} for identity {identity_id}"
                )));
            }
            let mut reverse = txn.open_table(ROLE_IDENTITIES)?;
            reverse.remove(link_key(role_id, identity_id).as_slice())?;
            Ok(())
        })?;
        tracing::info!(identity_id = %identity_id, role_id = %role_id, "Role unassigned");
        Ok(())
    }

    /// Create an identity and assign it the named roles in one transaction.
    ///
    /// `Conflict` if the email is taken, `NotFound` for an unknown role
    /// name. Either way nothing is written.
    pub fn enroll(
        &self,
        identity: &Identity,
        role_names: &[String],
        granted_by: &str,
    ) -> RegistryResult<Vec<RoleAssignment>> {
        self.mutate(|txn| {
            let mut role_ids = Vec::with_capacity(role_names.len());
            {
                let names = txn.open_table(ROLE_NAMES)?;
                for name in role_names {
                    let id = lookup_name(&names, name)?
                        .ok_or_else(|| RegistryError::NotFound(format!("Role '{name}'")))?;
                    if !role_ids.contains(&id) {
                        role_ids.push(id);
                    }
                }
            }

            insert_identity(txn, identity).map_err(|e| match e {
                StoreError::AlreadyExists(what) => RegistryError::Conflict(what),
                other => RegistryError::Store(other),
            })?;

            role_ids
                .iter()
                .map(|role_id| insert_assignment(txn, &identity.id, role_id, granted_by))
                .collect::<RegistryResult<Vec<_>>>()
        })
    }

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------

    /// Roles currently assigned to an identity, sorted by name.
    pub fn effective_roles(&self, identity_id: &Uuid) -> RegistryResult<Vec<Role>> {
        self.store.read(|txn| -> RegistryResult<Vec<Role>> {
            if read_identity(txn, identity_id)?.is_none() {
                return Err(RegistryError::NotFound(format!("Identity {identity_id}")));
            }

            let assignments = txn.open_table(IDENTITY_ROLES)?;
            let roles = txn.open_table(ROLES)?;
            let grants = txn.open_table(ROLE_PERMISSIONS)?;
            let permissions = txn.open_table(PERMISSIONS)?;

            let mut result = Vec::new();
            for role_id in linked_ids(&assignments, identity_id)? {
                let record = load_role_record(&roles, &role_id)?
                    .ok_or_else(|| corrupt(format!("dangling assignment to role {role_id}")))?;
                let granted = role_permissions(&grants, &permissions, &role_id)?;
                result.push(record.with_permissions(granted));
            }
            result.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(result)
        })
    }

    /// Names of the roles currently assigned to an identity.
    pub fn effective_role_names(&self, identity_id: &Uuid) -> RegistryResult<Vec<String>> {
        Ok(self
            .effective_roles(identity_id)?
            .into_iter()
            .map(|role| role.name)
            .collect())
    }

    /// Union of the permissions of every assigned role, de-duplicated by id.
    pub fn effective_permissions(&self, identity_id: &Uuid) -> RegistryResult<Vec<Permission>> {
        let mut seen = HashSet::new();
        let mut result: Vec<Permission> = self
            .effective_roles(identity_id)?
            .into_iter()
            .flat_map(|role| role.permissions)
            .filter(|permission| seen.insert(permission.id))
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    pub fn has_permission(
        &self,
        identity_id: &Uuid,
        resource: &str,
        action: &str,
    ) -> RegistryResult<bool> {
        Ok(self
            .effective_permissions(identity_id)?
            .iter()
            .any(|permission| permission.grants(resource, action)))
    }

    pub fn has_role(&self, identity_id: &Uuid, role_name: &str) -> RegistryResult<bool> {
        Ok(self
            .effective_roles(identity_id)?
            .iter()
            .any(|role| role.name == role_name))
    }

    /// Role name to granted (resource, action) pairs, for every role.
    pub fn policy_snapshot(&self) -> RegistryResult<PolicySnapshot> {
        Ok(PolicySnapshot::from_roles(&self.all_roles()?))
    }
}

// =============================================================================
// Tests
// =============================================================================
