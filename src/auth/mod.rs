// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! # Authentication Module
//!
//! Bearer-token authentication and role/permission authorization for the
//! HealthHub API.
//!
//! ## Auth Flow
//!
//! 1. Client posts email and password to `/v1/auth/login`
//! 2. [`AuthService`](service::AuthService) verifies the Argon2 hash and
//!    mints an HS256 token carrying the identity's current role names
//! 3. Client sends `Authorization: Bearer <token>` on every later call
//! 4. [`AuthorizationGate`] validates the token and checks roles or
//!    permissions before the handler runs
//!
//! ## Security
//!
//! - Tokens are checked with zero clock leeway
//! - Only HS256 is accepted; any other `alg` header is a bad signature
//! - Every invalid-token response body is identical; the reason is logged
//! - Role claims are a snapshot taken at issue time; use
//!   [`PermissionSource::Live`] where changes must apply immediately

pub mod claims;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod middleware;
pub mod roles;
pub mod service;
pub mod token;

pub use claims::{AuthenticatedUser, TokenClaims};
pub use error::AuthError;
pub use extractor::{Auth, OptionalAuth};
pub use gate::{AuthorizationGate, PermissionSource};
pub use roles::BuiltinRole;
pub use service::{AuthService, LoginOutcome, Registration, ServiceError};
pub use token::{IssuedToken, TokenCodec, TokenError};
