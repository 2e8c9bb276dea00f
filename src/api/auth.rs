// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! Login, registration, refresh and profile endpoints.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;

use super::blocking;
use crate::{
    auth::{Auth, BuiltinRole, OptionalAuth, Registration, ServiceError},
    error::ApiError,
    models::{
        ChangePasswordRequest, IdentityProfile, LoginRequest, RefreshRequest, RegisterRequest,
        TokenResponse,
    },
    state::AppState,
};

/// Exchange email and password for a bearer token.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let service = state.service.clone();
    let outcome =
        blocking(move || service.login(&request.email, &request.password, Utc::now())).await?;

    let user = outcome.profile();
    Ok(Json(TokenResponse::bearer(
        outcome.token.token,
        outcome.token.expires_at,
        outcome.roles,
        Some(user),
    )))
}

/// Create an identity and return its first token.
///
/// Anonymous callers may register with any role except `admin`; granting
/// `admin` requires an admin bearer token on the request.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Identity created", body = TokenResponse),
        (status = 400, description = "Invalid input or unknown role"),
        (status = 403, description = "Admin role requested without admin token"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    OptionalAuth(caller): OptionalAuth,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let wants_admin = request
        .roles
        .iter()
        .any(|r| BuiltinRole::parse(r) == Some(BuiltinRole::Admin));
    let caller_is_admin = caller
        .as_ref()
        .is_some_and(|u| u.has_role(BuiltinRole::Admin.as_str()));
    if wants_admin && !caller_is_admin {
        tracing::warn!(email = %request.email, "Self-registration requested admin role");
        return Err(ApiError::forbidden(
            "Only administrators may grant the admin role",
        ));
    }

    let granted_by = caller
        .map(|u| u.user_id.to_string())
        .unwrap_or_else(|| "self".to_string());

    let service = state.service.clone();
    let outcome = blocking(move || {
        service.register(
            Registration {
                email: &request.email,
                password: &request.password,
                display_name: &request.display_name,
                roles: request.roles,
                granted_by: &granted_by,
            },
            Utc::now(),
        )
    })
    .await?;

    let user = outcome.profile();
    Ok((
        StatusCode::CREATED,
        Json(TokenResponse::bearer(
            outcome.token.token,
            outcome.token.expires_at,
            outcome.roles,
            Some(user),
        )),
    ))
}

/// Re-issue a valid token with a fresh window.
///
/// The role snapshot is copied from the presented token; role changes made
/// since it was issued need a new login.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed", body = TokenResponse),
        (status = 401, description = "Invalid or expired token")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let now = Utc::now();
    let issued = state
        .service
        .refresh(&request.token, now)
        .inspect_err(|e| {
            if let ServiceError::Token(e) = e {
                tracing::warn!(reason = e.kind(), "Refresh rejected");
            }
        })?;
    let claims = state.codec.validate(&issued.token, now).map_err(|e| {
        ApiError::internal(format!("freshly issued token failed validation: {e}"))
    })?;

    Ok(Json(TokenResponse::bearer(
        issued.token,
        issued.expires_at,
        claims.roles.into_iter().collect(),
        None,
    )))
}

/// Profile of the authenticated caller with live role names.
#[utoipa::path(
    get,
    path = "/v1/auth/me",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current identity", body = IdentityProfile),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Identity no longer exists")
    )
)]
pub async fn me(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<IdentityProfile>, ApiError> {
    let service = state.service.clone();
    let profile = blocking(move || service.profile(&user.user_id)).await?;
    Ok(Json(profile))
}

/// Change the caller's password.
#[utoipa::path(
    post,
    path = "/v1/auth/change-password",
    tag = "Auth",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "New password too short"),
        (status = 401, description = "Not authenticated or wrong current password")
    )
)]
pub async fn change_password(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let service = state.service.clone();
    blocking(move || {
        service.change_password(
            &user.user_id,
            &request.current_password,
            &request.new_password,
        )
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
