// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! Authentication and authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::token::TokenError;

/// Gate rejection.
///
/// The token sub-kind inside `InvalidToken` is for logs only; the response
/// body is the same for every invalid token.
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present
    MissingCredential,
    /// Header present but not `Bearer <token>`
    MalformedCredential,
    /// Token failed validation
    InvalidToken(TokenError),
    /// Authenticated, but not allowed
    Forbidden,
    /// Registry lookup failed
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::MalformedCredential => "malformed_credential",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::Forbidden => "forbidden",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential
            | AuthError::MalformedCredential
            | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredential => write!(f, "Authorization header is required"),
            AuthError::MalformedCredential => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::InvalidToken(_) => write!(f, "Invalid or expired token"),
            AuthError::Forbidden => write!(f, "Insufficient permissions for this operation"),
            AuthError::Internal(_) => write!(f, "Internal authorization error"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(detail) = &self {
            tracing::error!(error = %detail, "Authorization check failed");
        }
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
