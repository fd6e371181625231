//! Registration endpoint.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::password::{hash_password, validate_strength};
use super::state::AuthState;
use super::storage::{create_user_with_verification, SignupOutcome};
use super::types::{failure, ApiMessage, SignupRequest, SignupResponse};
use super::utils::{normalize_email, valid_email};

const SIGNUP_FAILED: &str = "An error occurred during registration";

/// Create an unverified account and queue the verification email.
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User registered, verification email queued", body = SignupResponse),
        (status = 400, description = "Invalid input or email already in use", body = ApiMessage),
    ),
    tag = "auth"
)]
pub async fn signup(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return failure(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return failure(StatusCode::BAD_REQUEST, "Please provide a valid email");
    }

    let name = request.name.trim();
    if name.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "Name is required");
    }

    if let Err(issue) = validate_strength(&request.password) {
        return failure(StatusCode::BAD_REQUEST, &issue.to_string());
    }

    let password_hash = match hash_password(&request.password).await {
        Ok(digest) => digest,
        Err(err) => {
            error!("Failed to hash signup password: {err}");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, SIGNUP_FAILED);
        }
    };

    match create_user_with_verification(&pool, &email, name, &password_hash, auth_state.config())
        .await
    {
        Ok(SignupOutcome::Created { user_id }) => (
            StatusCode::CREATED,
            Json(SignupResponse {
                success: true,
                message: "User registered successfully. Please verify your email".to_string(),
                user_id: user_id.to_string(),
            }),
        )
            .into_response(),
        Ok(SignupOutcome::Conflict) => failure(StatusCode::BAD_REQUEST, "Email is already in use"),
        Err(err) => {
            error!("Failed to create user: {err}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, SIGNUP_FAILED)
        }
    }
}
