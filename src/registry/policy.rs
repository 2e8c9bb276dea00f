// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! In-memory view of the role/permission matrix.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::Role;

/// Role name to the `(resource, action)` pairs it grants.
///
/// Built from the registry and used to authorize against the role snapshot
/// embedded in a token without a database round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySnapshot {
    grants: BTreeMap<String, BTreeSet<(String, String)>>,
}

impl PolicySnapshot {
    pub fn from_roles(roles: &[Role]) -> Self {
        let grants = roles
            .iter()
            .map(|role| {
                let pairs = role
                    .permissions
                    .iter()
                    .map(|p| (p.resource.clone(), p.action.clone()))
                    .collect();
                (role.name.clone(), pairs)
            })
            .collect();
        Self { grants }
    }

    /// Whether any of `roles` grants `action` on `resource`.
    ///
    /// Role names unknown to the registry grant nothing.
    pub fn allows<'a>(
        &self,
        roles: impl IntoIterator<Item = &'a str>,
        resource: &str,
        action: &str,
    ) -> bool {
        roles.into_iter().any(|role| {
            self.grants.get(role).is_some_and(|pairs| {
                pairs.contains(&(resource.to_string(), action.to_string()))
            })
        })
    }

    pub fn role_count(&self) -> usize {
        self.grants.len()
    }
}
