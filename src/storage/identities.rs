// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! Identity records (the credential store).
//!
//! Emails are unique through the `identity_emails` index; the index row and
//! the identity row are always written in the same transaction.

use chrono::{DateTime, Utc};
use redb::{ReadTransaction, ReadableTable, WriteTransaction};
use uuid::Uuid;

use super::database::{decode, encode, IDENTITIES, IDENTITY_EMAILS};
use super::{AuthStore, StoreError, StoreResult};
use crate::models::{normalize_email, Identity};

/// Insert a new identity, enforcing email uniqueness.
pub(crate) fn insert_identity(txn: &WriteTransaction, identity: &Identity) -> StoreResult<()> {
    let mut emails = txn.open_table(IDENTITY_EMAILS)?;
    if emails.get(identity.email.as_str())?.is_some() {
        return Err(StoreError::AlreadyExists(format!(
            "Identity with email {}",
            identity.email
        )));
    }

    let mut identities = txn.open_table(IDENTITIES)?;
    let id = identity.id.to_string();
    if identities.get(id.as_str())?.is_some() {
        return Err(StoreError::AlreadyExists(format!("Identity {id}")));
    }

    let json = encode(identity)?;
    identities.insert(id.as_str(), json.as_slice())?;
    emails.insert(identity.email.as_str(), id.as_str())?;
    Ok(())
}

/// Whether an identity row exists, inside a write transaction.
pub(crate) fn identity_exists(txn: &WriteTransaction, id: &Uuid) -> StoreResult<bool> {
    let identities = txn.open_table(IDENTITIES)?;
    let key = id.to_string();
    let exists = identities.get(key.as_str())?.is_some();
    Ok(exists)
}

pub(crate) fn read_identity(txn: &ReadTransaction, id: &Uuid) -> StoreResult<Option<Identity>> {
    let identities = txn.open_table(IDENTITIES)?;
    let key = id.to_string();
    match identities.get(key.as_str())? {
        Some(value) => Ok(Some(decode(value.value())?)),
        None => Ok(None),
    }
}

/// Read-modify-write of one identity row.
fn update_identity(
    txn: &WriteTransaction,
    id: &Uuid,
    mutate: impl FnOnce(&mut Identity),
) -> StoreResult<Identity> {
    let mut identities = txn.open_table(IDENTITIES)?;
    let key = id.to_string();

    let existing_bytes = {
        let existing = identities
            .get(key.as_str())?
            .ok_or_else(|| StoreError::NotFound(format!("Identity {id}")))?;
        existing.value().to_vec()
    };

    let mut identity: Identity = decode(&existing_bytes)?;
    mutate(&mut identity);
    identity.updated_at = Utc::now();

    let json = encode(&identity)?;
    identities.insert(key.as_str(), json.as_slice())?;
    Ok(identity)
}

impl AuthStore {
    /// Create a new identity. Fails with `AlreadyExists` on a taken email.
    pub fn create_identity(&self, identity: &Identity) -> StoreResult<()> {
        self.write(|txn| insert_identity(txn, identity))
    }

    /// Look up an identity by id.
    pub fn get_identity(&self, id: &Uuid) -> StoreResult<Option<Identity>> {
        self.read(|txn| read_identity(txn, id))
    }

    /// Look up an identity by email (normalised before lookup).
    pub fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let email = normalize_email(email);
        self.read(|txn| -> StoreResult<Option<Identity>> {
            let emails = txn.open_table(IDENTITY_EMAILS)?;
            let id = match emails.get(email.as_str())? {
                Some(value) => value.value().to_string(),
                None => return Ok(None),
            };
            let id = Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt(e.to_string()))?;
            read_identity(txn, &id)
        })
    }

    /// Stamp a successful login.
    pub fn record_login(&self, id: &Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        self.write(|txn| update_identity(txn, id, |identity| identity.last_login_at = Some(at)))
            .map(|_| ())
    }

    /// Replace the stored secret hash.
    pub fn update_secret_hash(&self, id: &Uuid, secret_hash: &str) -> StoreResult<()> {
        self.write(|txn| {
            update_identity(txn, id, |identity| {
                identity.secret_hash = secret_hash.to_string()
            })
        })
        .map(|_| ())
    }

    /// Activate or deactivate an identity.
    pub fn set_identity_active(&self, id: &Uuid, active: bool) -> StoreResult<Identity> {
        self.write(|txn| update_identity(txn, id, |identity| identity.active = active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_store;

    #[test]
    fn create_and_find_by_email() {
        let (store, _dir) = temp_store();
        let identity = Identity::new("Alice@Example.org", "hash", "Alice");
        store.create_identity(&identity).unwrap();

        let found = store
            .find_identity_by_email("  alice@EXAMPLE.org")
            .unwrap()
            .unwrap();
        assert_eq!(found, identity);
        assert_eq!(store.get_identity(&identity.id).unwrap(), Some(identity));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let (store, _dir) = temp_store();
        store
            .create_identity(&Identity::new("bob@example.org", "h1", "Bob"))
            .unwrap();

        let result = store.create_identity(&Identity::new("BOB@example.org", "h2", "Bobby"));
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
    }

    #[test]
    fn unknown_email_is_none() {
        let (store, _dir) = temp_store();
        assert!(store.find_identity_by_email("nobody@example.org").unwrap().is_none());
    }

    #[test]
    fn record_login_and_secret_update() {
        let (store, _dir) = temp_store();
        let identity = Identity::new("carol@example.org", "old", "Carol");
        store.create_identity(&identity).unwrap();

        let at = Utc::now();
        store.record_login(&identity.id, at).unwrap();
        store.update_secret_hash(&identity.id, "new").unwrap();

        let stored = store.get_identity(&identity.id).unwrap().unwrap();
        assert_eq!(stored.last_login_at, Some(at));
        assert_eq!(stored.secret_hash, "new");
    }

    #[test]
    fn updates_on_missing_identity_fail() {
        let (store, _dir) = temp_store();
        let result = store.record_login(&Uuid::new_v4(), Utc::now());
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn identity_exists_inside_write_transaction() {
        let (store, _dir) = temp_store();
        let identity = Identity::new("erin@example.org", "h", "Erin");
        store.create_identity(&identity).unwrap();

        let (known, unknown) = store
            .write(|txn| -> StoreResult<(bool, bool)> {
                Ok((
                    identity_exists(txn, &identity.id)?,
                    identity_exists(txn, &Uuid::new_v4())?,
                ))
            })
            .unwrap();
        assert!(known);
        assert!(!unknown);
    }

    #[test]
    fn deactivate_identity() {
        let (store, _dir) = temp_store();
        let identity = Identity::new("dave@example.org", "h", "Dave");
        store.create_identity(&identity).unwrap();

        let updated = store.set_identity_active(&identity.id, false).unwrap();
        assert!(!updated.active);
        assert!(!store.get_identity(&identity.id).unwrap().unwrap().active);
    }
}
