// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! Embedded auth database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `identities`: identity_id → serialized Identity
//! - `identity_emails`: normalised email → identity_id (unique)
//! - `roles`: role_id → serialized RoleRecord
//! - `role_names`: role name → role_id (unique)
//! - `permissions`: permission_id → serialized Permission
//! - `permission_names`: permission name → permission_id (unique)
//! - `identity_roles`: identity_id|role_id → serialized RoleAssignment
//! - `role_identities`: role_id|identity_id → () (reverse index)
//! - `role_permissions`: role_id|permission_id → link timestamp
//! - `permission_roles`: permission_id|role_id → () (reverse index)
//! - `audit_events`: timestamp_be|event_id → serialized AuditEvent
//!
//! Link keys are two raw 16-byte UUIDs, so every link touching one entity
//! is a single prefix range scan.

use std::path::Path;

use redb::{Database, ReadTransaction, TableDefinition, WriteTransaction};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const IDENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("identities");
pub(crate) const IDENTITY_EMAILS: TableDefinition<&str, &str> =
    TableDefinition::new("identity_emails");

pub(crate) const ROLES: TableDefinition<&str, &[u8]> = TableDefinition::new("roles");
pub(crate) const ROLE_NAMES: TableDefinition<&str, &str> = TableDefinition::new("role_names");

pub(crate) const PERMISSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("permissions");
pub(crate) const PERMISSION_NAMES: TableDefinition<&str, &str> =
    TableDefinition::new("permission_names");

pub(crate) const IDENTITY_ROLES: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("identity_roles");
pub(crate) const ROLE_IDENTITIES: TableDefinition<&[u8], ()> =
    TableDefinition::new("role_identities");

/// Value is the link creation time (unix seconds).
pub(crate) const ROLE_PERMISSIONS: TableDefinition<&[u8], i64> =
    TableDefinition::new("role_permissions");
pub(crate) const PERMISSION_ROLES: TableDefinition<&[u8], ()> =
    TableDefinition::new("permission_roles");

pub(crate) const AUDIT_EVENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("audit_events");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Link Key Helpers
// =============================================================================

/// Length of a two-UUID link key.
pub(crate) const LINK_KEY_LEN: usize = 32;

/// Build a composite link key: `left_uuid_bytes | right_uuid_bytes`.
pub(crate) fn link_key(left: &Uuid, right: &Uuid) -> [u8; LINK_KEY_LEN] {
    let mut key = [0u8; LINK_KEY_LEN];
    key[..16].copy_from_slice(left.as_bytes());
    key[16..].copy_from_slice(right.as_bytes());
    key
}

/// Inclusive bounds covering every link key whose left half is `left`.
pub(crate) fn link_prefix_bounds(left: &Uuid) -> ([u8; LINK_KEY_LEN], [u8; LINK_KEY_LEN]) {
    let start = link_key(left, &Uuid::nil());
    let end = link_key(left, &Uuid::from_bytes([0xFF; 16]));
    (start, end)
}

/// Split a link key back into its two UUIDs.
pub(crate) fn split_link_key(key: &[u8]) -> StoreResult<(Uuid, Uuid)> {
    if key.len() != LINK_KEY_LEN {
        return Err(StoreError::Corrupt(format!(
            "link key has {} bytes, expected {LINK_KEY_LEN}",
            key.len()
        )));
    }
    let left = Uuid::from_slice(&key[..16]).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let right = Uuid::from_slice(&key[16..]).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Ok((left, right))
}

pub(crate) fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

// =============================================================================
// AuthStore
// =============================================================================

/// Embedded ACID database holding identities, the RBAC registry and the
/// audit trail.
pub struct AuthStore {
    db: Database,
}

impl AuthStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(IDENTITIES)?;
            let _ = write_txn.open_table(IDENTITY_EMAILS)?;
            let _ = write_txn.open_table(ROLES)?;
            let _ = write_txn.open_table(ROLE_NAMES)?;
            let _ = write_txn.open_table(PERMISSIONS)?;
            let _ = write_txn.open_table(PERMISSION_NAMES)?;
            let _ = write_txn.open_table(IDENTITY_ROLES)?;
            let _ = write_txn.open_table(ROLE_IDENTITIES)?;
            let _ = write_txn.open_table(ROLE_PERMISSIONS)?;
            let _ = write_txn.open_table(PERMISSION_ROLES)?;
            let _ = write_txn.open_table(AUDIT_EVENTS)?;
        }
        write_txn.commit()?;

        tracing::info!(path = %path.display(), "Auth database opened");
        Ok(Self { db })
    }

    /// Run `f` inside a single write transaction.
    ///
    /// The transaction commits only when `f` returns `Ok`; on `Err` it is
    /// aborted and nothing `f` wrote becomes visible.
    pub fn write<T, E>(&self, f: impl FnOnce(&WriteTransaction) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let txn = self.db.begin_write().map_err(StoreError::from)?;
        match f(&txn) {
            Ok(value) => {
                txn.commit().map_err(StoreError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = txn.abort() {
                    tracing::warn!(error = %abort_err, "Failed to abort write transaction");
                }
                Err(err)
            }
        }
    }

    /// Run `f` against a consistent read snapshot.
    pub fn read<T, E>(&self, f: impl FnOnce(&ReadTransaction) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        use redb::ReadableDatabase;

        let txn = self.db.begin_read().map_err(StoreError::from)?;
        f(&txn)
    }
}

#[cfg(test)]
pub(crate) fn temp_store() -> (AuthStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = AuthStore::open(&dir.path().join("auth.redb")).unwrap();
    (store, dir)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_key_roundtrips_both_halves() {
        let left = Uuid::new_v4();
        let right = Uuid::new_v4();
        let key = link_key(&left, &right);
        assert_eq!(split_link_key(&key).unwrap(), (left, right));
    }

    #[test]
    fn link_prefix_bounds_contain_every_right_half() {
        let left = Uuid::new_v4();
        let (start, end) = link_prefix_bounds(&left);
        let key = link_key(&left, &Uuid::new_v4());
        assert!(start <= key && key <= end);

        let other = link_key(&Uuid::new_v4(), &Uuid::new_v4());
        assert!(other < start || other > end);
    }

    #[test]
    fn split_link_key_rejects_wrong_length() {
        assert!(matches!(
            split_link_key(&[0u8; 7]),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn aborted_write_leaves_no_trace() {
        let (store, _dir) = temp_store();

        let result: StoreResult<()> = store.write(|txn| {
            let mut names = txn.open_table(ROLE_NAMES)?;
            names.insert("ghost", "id")?;
            Err(StoreError::NotFound("forced".to_string()))
        });
        assert!(result.is_err());

        let found = store
            .read(|txn| -> StoreResult<bool> {
                let names = txn.open_table(ROLE_NAMES)?;
                Ok(names.get("ghost")?.is_some())
            })
            .unwrap();
        assert!(!found);
    }

    #[test]
    fn reopen_keeps_committed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("auth.redb");
        {
            let store = AuthStore::open(&path).unwrap();
            store
                .write(|txn| -> StoreResult<()> {
                    let mut names = txn.open_table(ROLE_NAMES)?;
                    names.insert("admin", "role-1")?;
                    Ok(())
                })
                .unwrap();
        }

        let store = AuthStore::open(&path).unwrap();
        let value = store
            .read(|txn| -> StoreResult<Option<String>> {
                let names = txn.open_table(ROLE_NAMES)?;
                Ok(names.get("admin")?.map(|v| v.value().to_string()))
            })
            .unwrap();
        assert_eq!(value.as_deref(), Some("role-1"));
    }
}
