// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! # Storage Module
//!
//! Persistent state for the auth core lives in a single embedded redb file
//! (`$DATA_DIR/auth.redb`). Every mutation runs inside one write
//! transaction; redb serialises writers, so uniqueness checks made inside a
//! write transaction are authoritative.
//!
//! ## Storage Layout
//!
//! ```text
//! auth.redb
//!   identities / identity_emails          # credential store
//!   roles / role_names                    # RBAC registry
//!   permissions / permission_names
//!   identity_roles / role_identities      # assignments (both directions)
//!   role_permissions / permission_roles   # grants (both directions)
//!   audit_events                          # append-only audit trail
//! ```

pub mod audit;
pub mod database;
pub mod identities;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use database::{AuthStore, StoreError, StoreResult};
