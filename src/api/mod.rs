// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{
        middleware::{
            auth_middleware, optional_auth_middleware, require_permission, require_roles,
            PermissionGuard, RoleGuard,
        },
        AuthenticatedUser, BuiltinRole, PermissionSource,
    },
    error::ApiError,
    models::{
        ChangePasswordRequest, CreatePermissionRequest, CreateRoleRequest, IdentityProfile,
        LoginRequest, Permission, RefreshRequest, RegisterRequest, Role, RoleAssignment,
        TokenResponse,
    },
    registry::SeedReport,
    state::AppState,
    storage::{AuditEvent, AuditEventType},
};

pub mod admin;
pub mod auth;
pub mod health;

/// Run blocking registry, store or Argon2 work off the async runtime.
pub(crate) async fn blocking<T, E, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?.map_err(Into::into)
}

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh));

    // Registration is public, but an admin token unlocks privileged roles.
    let registration = Router::new()
        .route("/auth/register", post(auth::register))
        .route_layer(from_fn_with_state(state.clone(), optional_auth_middleware));

    let authenticated = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/change-password", post(auth::change_password))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let admin = Router::new()
        .route(
            "/admin/roles",
            get(admin::list_roles).post(admin::create_role),
        )
        .route(
            "/admin/roles/{role_id}",
            get(admin::get_role).delete(admin::delete_role),
        )
        .route(
            "/admin/roles/{role_id}/permissions/{permission_id}",
            post(admin::grant_permission).delete(admin::revoke_permission),
        )
        .route(
            "/admin/permissions",
            get(admin::list_permissions).post(admin::create_permission),
        )
        .route(
            "/admin/permissions/{permission_id}",
            axum::routing::delete(admin::delete_permission),
        )
        .route(
            "/admin/identities/{identity_id}/roles",
            get(admin::identity_roles),
        )
        .route(
            "/admin/identities/{identity_id}/roles/{role_id}",
            post(admin::assign_role).delete(admin::unassign_role),
        )
        .route("/admin/seed", post(admin::seed_defaults))
        .route_layer(from_fn_with_state(
            RoleGuard::new(state.gate.clone(), &[BuiltinRole::Admin]),
            require_roles,
        ))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    // Audit access follows the live registry so revoking users:read
    // takes effect before the caller's token expires.
    let audit = Router::new()
        .route("/admin/audit", get(admin::audit_events))
        .route_layer(from_fn_with_state(
            PermissionGuard::new(state.gate.clone(), "users", "read", PermissionSource::Live),
            require_permission,
        ))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let v1_routes = Router::new()
        .merge(public)
        .merge(registration)
        .merge(authenticated)
        .merge(admin)
        .merge(audit)
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        auth::login,
        auth::register,
        auth::refresh,
        auth::me,
        auth::change_password,
        admin::list_roles,
        admin::create_role,
        admin::get_role,
        admin::delete_role,
        admin::grant_permission,
        admin::revoke_permission,
        admin::list_permissions,
        admin::create_permission,
        admin::delete_permission,
        admin::identity_roles,
        admin::assign_role,
        admin::unassign_role,
        admin::seed_defaults,
        admin::audit_events
    ),
    components(
        schemas(
            LoginRequest,
            RegisterRequest,
            RefreshRequest,
            ChangePasswordRequest,
            TokenResponse,
            IdentityProfile,
            AuthenticatedUser,
            CreateRoleRequest,
            CreatePermissionRequest,
            Role,
            Permission,
            RoleAssignment,
            SeedReport,
            AuditEvent,
            AuditEventType,
            admin::RoleListResponse,
            admin::PermissionListResponse,
            admin::AuditLogResponse,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Auth", description = "Login, registration and tokens"),
        (name = "Admin", description = "Role and permission administration")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(
        app: &Router,
        email: &str,
        roles: &[&str],
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        call(
            app,
            Method::POST,
            "/v1/auth/register",
            token,
            Some(json!({
                "email": email,
                "password": "s3cure-passw0rd",
                "display_name": email,
                "roles": roles,
            })),
        )
        .await
    }

    /// Admin token for a freshly seeded state.
    fn admin_token(state: &AppState) -> String {
        let identity = crate::models::Identity::new("root@example.org", "hash", "Root");
        state
            .registry
            .enroll(&identity, &["admin".to_string()], "system")
            .unwrap();
        state
            .codec
            .issue(identity.id, &identity.email, vec!["admin".to_string()], chrono::Utc::now())
            .unwrap()
            .token
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _dir) = test_state();
        let app = router(state);
        let (status, body) = call(&app, Method::GET, "/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    /// Clinical route guarded on an any-of role set.
    fn role_guarded(state: &AppState, roles: &[BuiltinRole]) -> Router {
        Router::new()
            .route("/patients", get(|| async { axum::Json(json!({ "patients": [] })) }))
            .route_layer(from_fn_with_state(
                RoleGuard::new(state.gate.clone(), roles),
                require_roles,
            ))
    }

    async fn guard_statuses(state: &AppState, token: Option<&str>) -> (StatusCode, StatusCode) {
        let clinical = role_guarded(state, &[BuiltinRole::Practitioner, BuiltinRole::Admin]);
        let admin_only = role_guarded(state, &[BuiltinRole::Admin]);
        let (clinical, _) = call(&clinical, Method::GET, "/patients", token, None).await;
        let (admin_only, _) = call(&admin_only, Method::GET, "/patients", token, None).await;
        (clinical, admin_only)
    }

    #[tokio::test]
    async fn practitioner_end_to_end() {
        let (state, _dir) = test_state();
        let app = router(state.clone());

        let (status, registered) = register(&app, "dr@example.org", &["practitioner"], None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(registered["roles"], json!(["practitioner"]));

        let (status, login) = call(
            &app,
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "email": "dr@example.org", "password": "s3cure-passw0rd" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(login["token_type"], "Bearer");
        let token = login["token"].as_str().unwrap().to_string();
        let user_id = login["user"]["id"].as_str().unwrap().to_string();

        let (status, me) = call(&app, Method::GET, "/v1/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "dr@example.org");

        // The token snapshot grants patients:create; admin routes stay closed.
        let claims = state.codec.validate(&token, chrono::Utc::now()).unwrap();
        let user = AuthenticatedUser::from_claims(claims);
        assert!(state
            .gate
            .authorize_permission(&user, "patients", "create", PermissionSource::TokenSnapshot)
            .is_ok());
        let (status, _) = call(&app, Method::GET, "/v1/admin/roles", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            guard_statuses(&state, Some(&token)).await,
            (StatusCode::OK, StatusCode::FORBIDDEN)
        );
        assert_eq!(
            guard_statuses(&state, None).await,
            (StatusCode::UNAUTHORIZED, StatusCode::UNAUTHORIZED)
        );

        // An admin revokes the role; the live check sees it, the token does not.
        let admin = admin_token(&state);
        let role = state.registry.find_role_by_name("practitioner").unwrap().unwrap();
        let (status, _) = call(
            &app,
            Method::DELETE,
            &format!("/v1/admin/identities/{user_id}/roles/{}", role.id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        assert!(state
            .gate
            .authorize_permission(&user, "patients", "create", PermissionSource::TokenSnapshot)
            .is_ok());
        assert!(state
            .gate
            .authorize_permission(&user, "patients", "create", PermissionSource::Live)
            .is_err());

        // Role guards read the token snapshot, so their outcome is unchanged.
        assert_eq!(
            guard_statuses(&state, Some(&token)).await,
            (StatusCode::OK, StatusCode::FORBIDDEN)
        );
        assert_eq!(
            guard_statuses(&state, None).await,
            (StatusCode::UNAUTHORIZED, StatusCode::UNAUTHORIZED)
        );

        let (status, refreshed) = call(
            &app,
            Method::POST,
            "/v1/auth/refresh",
            None,
            Some(json!({ "token": token })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(refreshed["roles"], json!(["practitioner"]));
    }

    #[tokio::test]
    async fn bad_credentials_and_tokens_are_401() {
        let (state, _dir) = test_state();
        let app = router(state);
        register(&app, "n@example.org", &[], None).await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "email": "n@example.org", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "invalid_credentials");

        let (status, body) = call(&app, Method::GET, "/v1/auth/me", Some("a.b.c"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "invalid_token");

        let (status, _) = call(&app, Method::GET, "/v1/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/auth/refresh",
            None,
            Some(json!({ "token": "a.b.c" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "invalid_token");
    }

    #[tokio::test]
    async fn anonymous_registration_cannot_request_admin() {
        let (state, _dir) = test_state();
        let app = router(state.clone());

        let (status, _) = register(&app, "evil@example.org", &["admin"], None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = admin_token(&state);
        let (status, body) = register(&app, "ops@example.org", &["admin"], Some(&admin)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["roles"], json!(["admin"]));

        let (status, _) = register(&app, "dup@example.org", &[], None).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = register(&app, "dup@example.org", &[], None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error_code"], "conflict");

        let (status, _) = register(&app, "wiz@example.org", &["wizard"], None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn audit_requires_live_users_read() {
        let (state, _dir) = test_state();
        let app = router(state.clone());

        let (_, nurse) = register(&app, "nurse@example.org", &["nurse"], None).await;
        let nurse_token = nurse["token"].as_str().unwrap();
        let (status, _) =
            call(&app, Method::GET, "/v1/admin/audit", Some(nurse_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = admin_token(&state);
        let (status, body) =
            call(&app, Method::GET, "/v1/admin/audit?limit=10", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let events = body["events"].as_array().unwrap();
        assert!(events
            .iter()
            .any(|e| e["event_type"] == "identity_registered"));
    }

    #[tokio::test]
    async fn openapi_lists_auth_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v1/auth/login"));
        assert!(doc.paths.paths.contains_key("/v1/admin/roles"));
    }
}
