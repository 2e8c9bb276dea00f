// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! HealthHub Auth - Authentication and RBAC core
//!
//! This crate issues and validates signed bearer tokens, hashes user
//! credentials, and keeps a durable role/permission registry that gates
//! access to the HealthHub clinical API.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token codec, authorization gate, middleware and auth flows
//! - `credentials` - Argon2id credential hashing
//! - `registry` - Roles, permissions and assignments
//! - `storage` - Embedded redb database, identities and audit log

pub mod api;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod registry;
pub mod state;
pub mod storage;
