// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

//! Axum extractors for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Utc;

use super::middleware::authorization_header;
use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Extractor for authenticated users.
///
/// Reuses the user placed in the request extensions by
/// [`auth_middleware`](super::middleware::auth_middleware) when present,
/// otherwise validates the `Authorization` header itself.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // First check if middleware already set the user
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let header = authorization_header(&parts.headers)?;
        let user = state.gate.authenticate(header, Utc::now())?;
        parts.extensions.insert(user.clone());
        Ok(Auth(user))
    }
}

/// Optional authentication extractor.
///
/// Returns `None` if no valid authentication is present, instead of rejecting.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(user)) => Ok(OptionalAuth(Some(user))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use axum::http::Request;
    use uuid::Uuid;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = authorization {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let (state, _dir) = test_state();
        let result = Auth::from_request_parts(&mut parts(None), &state).await;
        assert!(matches!(result, Err(AuthError::MissingCredential)));
    }

    #[tokio::test]
    async fn auth_extractor_succeeds_with_token() {
        let (state, _dir) = test_state();
        let user_id = Uuid::new_v4();
        let issued = state
            .codec
            .issue(user_id, "dr@example.org", vec!["practitioner".into()], Utc::now())
            .unwrap();

        let header = format!("Bearer {}", issued.token);
        let Auth(user) = Auth::from_request_parts(&mut parts(Some(&header)), &state)
            .await
            .unwrap();
        assert_eq!(user.user_id, user_id);
        assert!(user.has_role("practitioner"));
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let (state, _dir) = test_state();
        let mut parts = parts(Some("Bearer not-even-a-token"));
        let user = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            email: "mw@example.org".to_string(),
            roles: Default::default(),
            expires_at: Utc::now(),
        };
        parts.extensions.insert(user.clone());

        let Auth(found) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(found, user);
    }

    #[tokio::test]
    async fn optional_auth_swallows_bad_tokens() {
        let (state, _dir) = test_state();
        let OptionalAuth(user) = OptionalAuth::from_request_parts(
            &mut parts(Some("Bearer a.b.c")),
            &state,
        )
        .await
        .unwrap();
        assert!(user.is_none());
    }
}
