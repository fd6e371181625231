//! Authenticated self-service endpoint.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::auth::principal::require_auth;
use super::auth::storage::lookup_user_by_id;
use super::auth::types::{failure, ApiMessage, UserProfile};
use super::auth::AuthState;

/// Return the authenticated user's profile.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Authenticated user profile", body = UserProfile),
        (status = 401, description = "Invalid, expired, or deactivated credential", body = ApiMessage),
        (status = 403, description = "No bearer token provided", body = ApiMessage),
    ),
    tag = "auth"
)]
pub async fn get_me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool, auth_state.config()).await {
        Ok(principal) => principal,
        Err((status, message)) => return failure(status, message),
    };

    match lookup_user_by_id(&pool, principal.user_id).await {
        Ok(Some(user)) => (StatusCode::OK, Json(UserProfile::from(user))).into_response(),
        Ok(None) => failure(StatusCode::UNAUTHORIZED, "User not found or inactive"),
        Err(err) => {
            error!("Failed to fetch profile: {err}");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred while fetching the profile",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::auth::{AuthConfig, AuthState};
    use super::get_me;
    use anyhow::Result;
    use axum::extract::Extension;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(AuthConfig::new(SecretString::from(
            "unit-test-signing-secret",
        ))))
    }

    #[tokio::test]
    async fn get_me_without_token_is_forbidden() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = get_me(HeaderMap::new(), Extension(pool), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }
}
