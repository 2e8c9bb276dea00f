// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! Authentication and authorization middleware for Axum.
//!
//! Apply with `axum::middleware::from_fn_with_state`:
//!
//! ```rust,ignore
//! let admin = Router::new()
//!     .route("/admin/roles", get(list_roles))
//!     .route_layer(from_fn_with_state(
//!         RoleGuard::new(state.gate.clone(), &[BuiltinRole::Admin]),
//!         require_roles,
//!     ))
//!     .route_layer(from_fn_with_state(state.clone(), auth_middleware));
//! ```
//!
//! `auth_middleware` places the [`AuthenticatedUser`] in the request
//! extensions; the guards and the [`Auth`](super::Auth) extractor reuse it
//! and only fall back to reading the header when it is absent.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use super::gate::{AuthorizationGate, PermissionSource};
use super::roles::BuiltinRole;
use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Raw `Authorization` header value, if present.
pub(crate) fn authorization_header(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    headers
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| AuthError::MalformedCredential))
        .transpose()
}

/// User already authenticated for this request, or authenticate now.
pub(crate) fn resolve_user(
    gate: &AuthorizationGate,
    request: &mut Request,
) -> Result<AuthenticatedUser, AuthError> {
    if let Some(user) = request.extensions().get::<AuthenticatedUser>() {
        return Ok(user.clone());
    }
    let user = {
        let header = authorization_header(request.headers())?;
        gate.authenticate(header, Utc::now())?
    };
    request.extensions_mut().insert(user.clone());
    Ok(user)
}

/// Require a valid bearer token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_user(&state.gate, &mut request) {
        Ok(_) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

/// Attach the user when a valid token is present; never rejects.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match authorization_header(request.headers()) {
        Ok(header) => state.gate.optional_authenticate(header, Utc::now()),
        Err(_) => None,
    };
    if let Some(user) = user {
        request.extensions_mut().insert(user);
    }
    next.run(request).await
}

/// State for [`require_roles`]: any-of role names.
#[derive(Clone)]
pub struct RoleGuard {
    gate: Arc<AuthorizationGate>,
    roles: Arc<[String]>,
}

impl RoleGuard {
    pub fn new(gate: Arc<AuthorizationGate>, roles: &[BuiltinRole]) -> Self {
        Self {
            gate,
            roles: roles.iter().map(|r| r.as_str().to_string()).collect(),
        }
    }
}

/// Require any of the guard's roles in the token snapshot.
pub async fn require_roles(
    State(guard): State<RoleGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match resolve_user(&guard.gate, &mut request) {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };
    match guard.gate.authorize_roles(&user, &guard.roles[..]) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

/// State for [`require_permission`].
#[derive(Clone)]
pub struct PermissionGuard {
    gate: Arc<AuthorizationGate>,
    resource: Arc<str>,
    action: Arc<str>,
    source: PermissionSource,
}

impl PermissionGuard {
    pub fn new(
        gate: Arc<AuthorizationGate>,
        resource: &str,
        action: &str,
        source: PermissionSource,
    ) -> Self {
        Self {
            gate,
            resource: resource.into(),
            action: action.into(),
            source,
        }
    }

    /// Run the permission check on the blocking pool.
    pub async fn check(&self, user: AuthenticatedUser) -> Result<(), AuthError> {
        let guard = self.clone();
        tokio::task::spawn_blocking(move || {
            guard
                .gate
                .authorize_permission(&user, &guard.resource, &guard.action, guard.source)
        })
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
    }
}

/// Require `(resource, action)` for the authenticated user.
pub async fn require_permission(
    State(guard): State<PermissionGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match resolve_user(&guard.gate, &mut request) {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };
    match guard.check(user).await {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
