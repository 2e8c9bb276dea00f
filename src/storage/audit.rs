// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! Audit logging for security-sensitive operations.
//!
//! Logins and every mutation of the role/permission registry are appended
//! to the `audit_events` table. Keys are `timestamp_millis_be | event_id`,
//! so a reverse scan yields the newest events first.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::database::{decode, encode, AUDIT_EVENTS};
use super::{AuthStore, StoreResult};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Auth events
    LoginSucceeded,
    LoginFailed,
    IdentityRegistered,
    PasswordChanged,

    // Registry events
    RoleCreated,
    RoleDeleted,
    PermissionCreated,
    PermissionDeleted,
    PermissionGranted,
    PermissionRevoked,
    RoleAssigned,
    RoleUnassigned,
    DefaultsSeeded,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Identity that triggered the event (if known).
    pub actor: Option<String>,
    /// Resource affected (role id, identity id, ...).
    pub resource_id: Option<String>,
    /// Resource type (role, permission, identity).
    pub resource_type: Option<String>,
    /// Additional details as JSON.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            actor: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
        }
    }

    /// Set the actor.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Set the resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl ToString,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.to_string());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed.
    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }

    fn key(&self) -> [u8; 24] {
        let mut key = [0u8; 24];
        let millis = self.timestamp.timestamp_millis().max(0) as u64;
        key[..8].copy_from_slice(&millis.to_be_bytes());
        key[8..].copy_from_slice(self.event_id.as_bytes());
        key
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    store: &'a AuthStore,
}

impl<'a> AuditRepository<'a> {
    /// Create a new audit repository.
    pub fn new(store: &'a AuthStore) -> Self {
        Self { store }
    }

    /// Append an audit event.
    pub fn log(&self, event: &AuditEvent) -> StoreResult<()> {
        let json = encode(event)?;
        let key = event.key();
        self.store.write(|txn| -> StoreResult<()> {
            let mut table = txn.open_table(AUDIT_EVENTS)?;
            table.insert(key.as_slice(), json.as_slice())?;
            Ok(())
        })
    }

    /// Append an event, logging instead of failing when the write fails.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.log(&event) {
            tracing::warn!(
                event_type = ?event.event_type,
                error = %e,
                "Failed to write audit event"
            );
        }
    }

    /// Most recent events, newest first.
    pub fn recent(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        self.store.read(|txn| -> StoreResult<Vec<AuditEvent>> {
            let table = txn.open_table(AUDIT_EVENTS)?;
            let mut events = Vec::with_capacity(limit.min(256));
            for entry in table.iter()?.rev() {
                if events.len() >= limit {
                    break;
                }
                let (_, value) = entry?;
                events.push(decode(value.value())?);
            }
            Ok(events)
        })
    }

    /// Most recent events for one actor, newest first.
    pub fn recent_by_actor(&self, actor: &str, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        self.store.read(|txn| -> StoreResult<Vec<AuditEvent>> {
            let table = txn.open_table(AUDIT_EVENTS)?;
            let mut events = Vec::new();
            for entry in table.iter()?.rev() {
                if events.len() >= limit {
                    break;
                }
                let (_, value) = entry?;
                let event: AuditEvent = decode(value.value())?;
                if event.actor.as_deref() == Some(actor) {
                    events.push(event);
                }
            }
            Ok(events)
        })
    }
}
