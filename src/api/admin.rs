// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! Admin-only API endpoints for role and permission management.
//!
//! Every route except the audit query requires the `admin` role in the
//! caller's token. The audit query requires `users:read`, checked against
//! the live registry.
//!
//! Each mutation is written to the audit log with the caller as actor.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::blocking;
use crate::{
    auth::Auth,
    error::ApiError,
    models::{CreatePermissionRequest, CreateRoleRequest, Permission, Role, RoleAssignment},
    registry::{RegistryError, SeedReport},
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;
const DEFAULT_AUDIT_LIMIT: usize = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Pagination for list endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageParams {
    /// 1-based page number (default 1).
    pub page: Option<usize>,
    /// Page size (default 50, max 200).
    pub limit: Option<usize>,
}

impl PageParams {
    fn resolve(&self) -> Result<(usize, usize), ApiError> {
        let page = self.page.unwrap_or(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if page == 0 {
            return Err(ApiError::bad_request("page must be at least 1"));
        }
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(ApiError::bad_request(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok((page, limit))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleListResponse {
    pub roles: Vec<Role>,
    /// Total number of roles across all pages.
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionListResponse {
    pub permissions: Vec<Permission>,
    /// Total number of permissions across all pages.
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

/// Query parameters for audit log queries.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Only events by this actor (identity id, `self` or `system`).
    pub actor: Option<String>,
    /// Maximum number of results (default 100).
    pub limit: Option<usize>,
}

/// Response for audit log queries.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    /// Audit events, newest first.
    pub events: Vec<AuditEvent>,
    pub total: usize,
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{field} must not be empty")));
    }
    Ok(())
}

// ============================================================================
// Roles
// ============================================================================

/// List roles with their permissions, ordered by name.
#[utoipa::path(
    get,
    path = "/v1/admin/roles",
    tag = "Admin",
    params(PageParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "One page of roles", body = RoleListResponse),
        (status = 400, description = "Invalid pagination"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn list_roles(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<RoleListResponse>, ApiError> {
    let (page, limit) = params.resolve()?;
    let registry = state.registry.clone();
    let (roles, total) = blocking(move || registry.list_roles(page, limit)).await?;
    Ok(Json(RoleListResponse {
        roles,
        total,
        page,
        limit,
    }))
}

/// Get one role.
#[utoipa::path(
    get,
    path = "/v1/admin/roles/{role_id}",
    tag = "Admin",
    params(("role_id" = Uuid, Path, description = "Role id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Role", body = Role),
        (status = 404, description = "Role not found")
    )
)]
pub async fn get_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> Result<Json<Role>, ApiError> {
    let registry = state.registry.clone();
    let role = blocking(move || registry.get_role(&role_id)).await?;
    Ok(Json(role))
}

/// Create a role, optionally linked to existing permissions.
#[utoipa::path(
    post,
    path = "/v1/admin/roles",
    tag = "Admin",
    request_body = CreateRoleRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 400, description = "Empty name"),
        (status = 404, description = "Unknown permission id"),
        (status = 409, description = "Role name already exists")
    )
)]
pub async fn create_role(
    Auth(admin): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    require_non_empty("name", &request.name)?;

    let role = blocking(move || {
        let role = state.registry.create_role(
            request.name.trim(),
            &request.description,
            &request.permission_ids,
        )?;
        state.audit().record(
            AuditEvent::new(AuditEventType::RoleCreated)
                .with_actor(admin.user_id.to_string())
                .with_resource("role", role.id)
                .with_details(serde_json::json!({ "name": role.name })),
        );
        Ok::<_, RegistryError>(role)
    })
    .await?;

    tracing::info!(role_id = %role.id, name = %role.name, "Role created");
    Ok((StatusCode::CREATED, Json(role)))
}

/// Delete a role and every assignment and grant that references it.
#[utoipa::path(
    delete,
    path = "/v1/admin/roles/{role_id}",
    tag = "Admin",
    params(("role_id" = Uuid, Path, description = "Role id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 404, description = "Role not found")
    )
)]
pub async fn delete_role(
    Auth(admin): Auth,
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    blocking(move || {
        state.registry.delete_role(&role_id)?;
        state.audit().record(
            AuditEvent::new(AuditEventType::RoleDeleted)
                .with_actor(admin.user_id.to_string())
                .with_resource("role", role_id),
        );
        Ok::<_, RegistryError>(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Link a permission to a role.
#[utoipa::path(
    post,
    path = "/v1/admin/roles/{role_id}/permissions/{permission_id}",
    tag = "Admin",
    params(
        ("role_id" = Uuid, Path, description = "Role id"),
        ("permission_id" = Uuid, Path, description = "Permission id")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Permission granted"),
        (status = 404, description = "Role or permission not found"),
        (status = 409, description = "Already granted")
    )
)]
pub async fn grant_permission(
    Auth(admin): Auth,
    State(state): State<AppState>,
    Path((role_id, permission_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    blocking(move || {
        state.registry.grant_permission(&role_id, &permission_id)?;
        state.audit().record(
            AuditEvent::new(AuditEventType::PermissionGranted)
                .with_actor(admin.user_id.to_string())
                .with_resource("role", role_id)
                .with_details(serde_json::json!({ "permission_id": permission_id })),
        );
        Ok::<_, RegistryError>(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Unlink a permission from a role.
#[utoipa::path(
    delete,
    path = "/v1/admin/roles/{role_id}/permissions/{permission_id}",
    tag = "Admin",
    params(
        ("role_id" = Uuid, Path, description = "Role id"),
        ("permission_id" = Uuid, Path, description = "Permission id")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Permission revoked"),
        (status = 404, description = "Grant not found")
    )
)]
pub async fn revoke_permission(
    Auth(admin): Auth,
    State(state): State<AppState>,
    Path((role_id, permission_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    blocking(move || {
        state.registry.revoke_permission(&role_id, &permission_id)?;
        state.audit().record(
            AuditEvent::new(AuditEventType::PermissionRevoked)
                .with_actor(admin.user_id.to_string())
                .with_resource("role", role_id)
                .with_details(serde_json::json!({ "permission_id": permission_id })),
        );
        Ok::<_, RegistryError>(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Permissions
// ============================================================================

/// List permissions, ordered by name.
#[utoipa::path(
    get,
    path = "/v1/admin/permissions",
    tag = "Admin",
    params(PageParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "One page of permissions", body = PermissionListResponse),
        (status = 400, description = "Invalid pagination")
    )
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<PermissionListResponse>, ApiError> {
    let (page, limit) = params.resolve()?;
    let registry = state.registry.clone();
    let (permissions, total) = blocking(move || registry.list_permissions(page, limit)).await?;
    Ok(Json(PermissionListResponse {
        permissions,
        total,
        page,
        limit,
    }))
}

/// Create a permission.
#[utoipa::path(
    post,
    path = "/v1/admin/permissions",
    tag = "Admin",
    request_body = CreatePermissionRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Permission created", body = Permission),
        (status = 400, description = "Empty name, resource or action"),
        (status = 409, description = "Permission name already exists")
    )
)]
pub async fn create_permission(
    Auth(admin): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreatePermissionRequest>,
) -> Result<(StatusCode, Json<Permission>), ApiError> {
    require_non_empty("name", &request.name)?;
    require_non_empty("resource", &request.resource)?;
    require_non_empty("action", &request.action)?;

    let permission = blocking(move || {
        let permission = state.registry.create_permission(
            request.name.trim(),
            &request.description,
            request.resource.trim(),
            request.action.trim(),
        )?;
        state.audit().record(
            AuditEvent::new(AuditEventType::PermissionCreated)
                .with_actor(admin.user_id.to_string())
                .with_resource("permission", permission.id)
                .with_details(serde_json::json!({ "name": permission.name })),
        );
        Ok::<_, RegistryError>(permission)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(permission)))
}

/// Delete a permission and unlink it from every role.
#[utoipa::path(
    delete,
    path = "/v1/admin/permissions/{permission_id}",
    tag = "Admin",
    params(("permission_id" = Uuid, Path, description = "Permission id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Permission deleted"),
        (status = 404, description = "Permission not found")
    )
)]
pub async fn delete_permission(
    Auth(admin): Auth,
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    blocking(move || {
        state.registry.delete_permission(&permission_id)?;
        state.audit().record(
            AuditEvent::new(AuditEventType::PermissionDeleted)
                .with_actor(admin.user_id.to_string())
                .with_resource("permission", permission_id),
        );
        Ok::<_, RegistryError>(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Assignments
// ============================================================================

/// Current roles of an identity.
#[utoipa::path(
    get,
    path = "/v1/admin/identities/{identity_id}/roles",
    tag = "Admin",
    params(("identity_id" = Uuid, Path, description = "Identity id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Assigned roles", body = Vec<Role>),
        (status = 404, description = "Identity not found")
    )
)]
pub async fn identity_roles(
    State(state): State<AppState>,
    Path(identity_id): Path<Uuid>,
) -> Result<Json<Vec<Role>>, ApiError> {
    let registry = state.registry.clone();
    let roles = blocking(move || registry.effective_roles(&identity_id)).await?;
    Ok(Json(roles))
}

/// Assign a role to an identity.
///
/// Tokens already issued to the identity keep their old role snapshot.
#[utoipa::path(
    post,
    path = "/v1/admin/identities/{identity_id}/roles/{role_id}",
    tag = "Admin",
    params(
        ("identity_id" = Uuid, Path, description = "Identity id"),
        ("role_id" = Uuid, Path, description = "Role id")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Role assigned", body = RoleAssignment),
        (status = 404, description = "Identity or role not found"),
        (status = 409, description = "Already assigned")
    )
)]
pub async fn assign_role(
    Auth(admin): Auth,
    State(state): State<AppState>,
    Path((identity_id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<(StatusCode, Json<RoleAssignment>), ApiError> {
    let assignment = blocking(move || {
        let actor = admin.user_id.to_string();
        let assignment = state.registry.assign_role(&identity_id, &role_id, &actor)?;
        state.audit().record(
            AuditEvent::new(AuditEventType::RoleAssigned)
                .with_actor(actor)
                .with_resource("identity", identity_id)
                .with_details(serde_json::json!({ "role_id": role_id })),
        );
        Ok::<_, RegistryError>(assignment)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// Remove a role from an identity.
#[utoipa::path(
    delete,
    path = "/v1/admin/identities/{identity_id}/roles/{role_id}",
    tag = "Admin",
    params(
        ("identity_id" = Uuid, Path, description = "Identity id"),
        ("role_id" = Uuid, Path, description = "Role id")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Role unassigned"),
        (status = 404, description = "Assignment not found")
    )
)]
pub async fn unassign_role(
    Auth(admin): Auth,
    State(state): State<AppState>,
    Path((identity_id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    blocking(move || {
        state.registry.unassign_role(&identity_id, &role_id)?;
        state.audit().record(
            AuditEvent::new(AuditEventType::RoleUnassigned)
                .with_actor(admin.user_id.to_string())
                .with_resource("identity", identity_id)
                .with_details(serde_json::json!({ "role_id": role_id })),
        );
        Ok::<_, RegistryError>(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Maintenance
// ============================================================================

/// Restore the canonical permissions, default roles and their grants.
#[utoipa::path(
    post,
    path = "/v1/admin/seed",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "What was created", body = SeedReport)
    )
)]
pub async fn seed_defaults(
    Auth(admin): Auth,
    State(state): State<AppState>,
) -> Result<Json<SeedReport>, ApiError> {
    let report = blocking(move || {
        let report = state.registry.seed_defaults()?;
        if !report.is_empty() {
            state.audit().record(
                AuditEvent::new(AuditEventType::DefaultsSeeded)
                    .with_actor(admin.user_id.to_string())
                    .with_details(serde_json::json!(report)),
            );
        }
        Ok::<_, RegistryError>(report)
    })
    .await?;
    Ok(Json(report))
}

/// Query the audit log, newest first.
#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    tag = "Admin",
    params(AuditQueryParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "users:read required")
    )
)]
pub async fn audit_events(
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_PAGE_SIZE * 5);

    let events = blocking(move || match params.actor.as_deref() {
        Some(actor) => state.audit().recent_by_actor(actor, limit),
        None => state.audit().recent(limit),
    })
    .await?;

    Ok(Json(AuditLogResponse {
        total: events.len(),
        events,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::models::Identity;
    use crate::state::tests::test_state;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        state: AppState,
        token: String,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let (state, dir) = test_state();
        let identity = Identity::new("admin@example.org", "hash", "Admin");
        state
            .registry
            .enroll(&identity, &["admin".to_string()], "system")
            .unwrap();
        let token = state
            .codec
            .issue(identity.id, &identity.email, vec!["admin".into()], chrono::Utc::now())
            .unwrap()
            .token;
        Harness {
            app: router(state.clone()),
            state,
            token,
            _dir: dir,
        }
    }

    impl Harness {
        async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let mut request = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", self.token));
            let body = match body {
                Some(value) => {
                    request = request.header(header::CONTENT_TYPE, "application/json");
                    Body::from(value.to_string())
                }
                None => Body::empty(),
            };
            let response = self
                .app
                .clone()
                .oneshot(request.body(body).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }
    }

    #[tokio::test]
    async fn list_roles_is_paginated() {
        let h = harness();
        let (status, body) = h.send(Method::GET, "/v1/admin/roles?page=1&limit=2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 4);
        assert_eq!(body["roles"].as_array().unwrap().len(), 2);
        assert_eq!(body["roles"][0]["name"], "admin");

        let (status, body) = h.send(Method::GET, "/v1/admin/roles?page=3&limit=2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["roles"].as_array().unwrap().is_empty());

        let (status, _) = h.send(Method::GET, "/v1/admin/roles?limit=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn role_lifecycle_is_audited() {
        let h = harness();
        let read = h
            .state
            .registry
            .find_permission_by_name("patients:read")
            .unwrap()
            .unwrap();

        let (status, role) = h
            .send(
                Method::POST,
                "/v1/admin/roles",
                Some(json!({ "name": "auditor", "permission_ids": [read.id] })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(role["permissions"][0]["name"], "patients:read");

        let (status, body) = h
            .send(Method::POST, "/v1/admin/roles", Some(json!({ "name": "auditor" })))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error_code"], "conflict");

        let role_id = role["id"].as_str().unwrap();
        let (status, _) = h
            .send(Method::DELETE, &format!("/v1/admin/roles/{role_id}"), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = h
            .send(Method::GET, &format!("/v1/admin/roles/{role_id}"), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let events = h.state.audit().recent(10).unwrap();
        assert!(events.iter().any(|e| e.event_type == AuditEventType::RoleCreated));
        assert!(events.iter().any(|e| e.event_type == AuditEventType::RoleDeleted));
    }

    #[tokio::test]
    async fn unknown_permission_id_creates_nothing() {
        let h = harness();
        let (status, _) = h
            .send(
                Method::POST,
                "/v1/admin/roles",
                Some(json!({ "name": "ghost", "permission_ids": [Uuid::new_v4()] })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(h.state.registry.find_role_by_name("ghost").unwrap().is_none());
    }

    #[tokio::test]
    async fn assignment_conflicts_and_missing_unassign() {
        let h = harness();
        let identity = Identity::new("tech@example.org", "hash", "Tech");
        h.state.store.create_identity(&identity).unwrap();
        let role = h.state.registry.find_role_by_name("lab-tech").unwrap().unwrap();
        let uri = format!("/v1/admin/identities/{}/roles/{}", identity.id, role.id);

        let (status, body) = h.send(Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["role_id"], role.id.to_string());

        let (status, _) = h.send(Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, roles) = h
            .send(
                Method::GET,
                &format!("/v1/admin/identities/{}/roles", identity.id),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(roles[0]["name"], "lab-tech");

        let (status, _) = h.send(Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = h.send(Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn permission_crud_and_grants() {
        let h = harness();
        let (status, permission) = h
            .send(
                Method::POST,
                "/v1/admin/permissions",
                Some(json!({ "name": "reports:read", "resource": "reports", "action": "read" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let permission_id = permission["id"].as_str().unwrap().to_string();

        let (status, _) = h
            .send(
                Method::POST,
                "/v1/admin/permissions",
                Some(json!({ "name": "x", "resource": " ", "action": "read" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let nurse = h.state.registry.find_role_by_name("nurse").unwrap().unwrap();
        let grant = format!("/v1/admin/roles/{}/permissions/{permission_id}", nurse.id);
        let (status, _) = h.send(Method::POST, &grant, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = h.send(Method::POST, &grant, None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = h
            .send(Method::DELETE, &format!("/v1/admin/permissions/{permission_id}"), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let nurse = h.state.registry.get_role(&nurse.id).unwrap();
        assert!(nurse.permissions.iter().all(|p| p.name != "reports:read"));

        let (_, body) = h.send(Method::GET, "/v1/admin/permissions?limit=200", None).await;
        assert_eq!(body["total"], 12);
    }

    #[tokio::test]
    async fn reseeding_restores_deleted_defaults() {
        let h = harness();
        let (_, body) = h.send(Method::POST, "/v1/admin/seed", None).await;
        assert_eq!(body["roles_created"], 0);

        let nurse = h.state.registry.find_role_by_name("nurse").unwrap().unwrap();
        h.state.registry.delete_role(&nurse.id).unwrap();

        let (status, body) = h.send(Method::POST, "/v1/admin/seed", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["roles_created"], 1);
        assert_eq!(body["grants_created"], 2);
    }
}
