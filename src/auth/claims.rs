// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! Token claims and authenticated user representation.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Claims carried by a session token.
///
/// `roles` is a snapshot taken at issuance; it does not follow later
/// registry changes until a new token is issued by login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Identity id (same value as `sub`).
    pub user_id: Uuid,
    pub email: String,
    pub roles: BTreeSet<String>,
    pub iss: String,
    pub sub: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Not before (unix seconds).
    pub nbf: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

impl TokenClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Authenticated user information extracted from a validated token.
///
/// This is the primary type used throughout the application to represent
/// the caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    /// Role snapshot from the token.
    pub roles: BTreeSet<String>,
    pub expires_at: DateTime<Utc>,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: TokenClaims) -> Self {
        let expires_at = claims.expires_at();
        Self {
            user_id: claims.user_id,
            email: claims.email,
            roles: claims.roles,
            expires_at,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Any-of match against the token's role snapshot.
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|role| self.has_role(role.as_ref()))
    }
}
