//! Login endpoint issuing bearer tokens.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::jwt::{self, Claims};
use super::password::verify_password;
use super::state::AuthState;
use super::storage::lookup_user_by_email;
use super::types::{failure, ApiMessage, LoginRequest, LoginResponse, UserProfile};
use super::utils::{normalize_email, valid_email};

const LOGIN_FAILED: &str = "An error occurred during login";

/// Authenticate an account and return a signed bearer token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Not verified, inactive, or bad credentials", body = ApiMessage),
        (status = 404, description = "Unknown email", body = ApiMessage),
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return failure(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return failure(StatusCode::BAD_REQUEST, "Please provide a valid email");
    }
    if request.password.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "Password is required");
    }

    let user = match lookup_user_by_email(&pool, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => return failure(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!("Failed to lookup user for login: {err}");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, LOGIN_FAILED);
        }
    };

    if !user.is_verified {
        return failure(
            StatusCode::UNAUTHORIZED,
            "Email not verified. Please verify your email before logging in",
        );
    }
    if !user.is_active {
        return failure(
            StatusCode::UNAUTHORIZED,
            "Account is disabled. Please contact administrator",
        );
    }

    match verify_password(&request.password, &user.password_hash).await {
        Ok(true) => {}
        Ok(false) => return failure(StatusCode::UNAUTHORIZED, "Invalid password"),
        Err(err) => {
            error!("Failed to verify password: {err}");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, LOGIN_FAILED);
        }
    }

    let config = auth_state.config();
    let claims = Claims::new(
        user.id,
        user.email.clone(),
        user.is_superuser,
        config.token_ttl_seconds(),
    );
    let token = match jwt::issue(&claims, config.jwt_secret()) {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to issue bearer token: {err}");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, LOGIN_FAILED);
        }
    };

    (
        StatusCode::OK,
        Json(LoginResponse {
            success: true,
            token,
            user: UserProfile::from(user),
        }),
    )
        .into_response()
}
