// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! Built-in role names.
//!
//! Roles themselves live in the registry and may be created at runtime;
//! this enum only names the ones the service knows about up front.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Well-known roles.
///
/// ## Roles
///
/// - `Admin` - Full access, including registry administration
/// - `Practitioner` - Clinician who creates and edits clinical records
/// - `Nurse` - Reads patients and observations
/// - `LabTech` - Records observations
/// - `Patient` - Reserved for patient self-service (not seeded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum BuiltinRole {
    Admin,
    Practitioner,
    Nurse,
    LabTech,
    Patient,
}

impl BuiltinRole {
    pub const ALL: [BuiltinRole; 5] = [
        BuiltinRole::Admin,
        BuiltinRole::Practitioner,
        BuiltinRole::Nurse,
        BuiltinRole::LabTech,
        BuiltinRole::Patient,
    ];

    /// Name as stored in the registry and embedded in tokens.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinRole::Admin => "admin",
            BuiltinRole::Practitioner => "practitioner",
            BuiltinRole::Nurse => "nurse",
            BuiltinRole::LabTech => "lab-tech",
            BuiltinRole::Patient => "patient",
        }
    }

    /// Parse a role name (case-insensitive).
    pub fn parse(s: &str) -> Option<BuiltinRole> {
        let lower = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|role| role.as_str() == lower)
    }
}

/// Role given to self-registered identities that request none.
impl Default for BuiltinRole {
    fn default() -> Self {
        BuiltinRole::Nurse
    }
}

impl std::fmt::Display for BuiltinRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
