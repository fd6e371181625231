//! Password reset endpoints: request a reset link, then complete the reset.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::password::{hash_password, validate_strength};
use super::state::AuthState;
use super::storage::{complete_password_reset, request_password_reset};
use super::types::{failure, success, ApiMessage, ForgotPasswordRequest, ResetPasswordRequest};
use super::utils::{hash_account_token, normalize_email, valid_email};

const RESET_REQUESTED: &str =
    "If your email is registered, you will receive password reset instructions";
const INVALID_TOKEN: &str = "Invalid or expired reset token";
const RESET_FAILED: &str = "An error occurred during password reset";

/// Request a password reset link.
///
/// The response is identical whether or not the email is registered, so the
/// endpoint cannot be used to enumerate accounts.
#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset requested (whether or not the account exists)", body = ApiMessage),
        (status = 400, description = "Missing payload", body = ApiMessage),
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return failure(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        // Invalid addresses get the same opaque success as unknown ones.
        return success(StatusCode::OK, RESET_REQUESTED);
    }

    match request_password_reset(&pool, &email, auth_state.config()).await {
        Ok(_) => success(StatusCode::OK, RESET_REQUESTED),
        Err(err) => {
            error!("Failed to enqueue password reset: {err}");
            // Keep the response opaque even on storage failures.
            success(StatusCode::OK, RESET_REQUESTED)
        }
    }
}

/// Complete a password reset with the emailed token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password/{token}",
    request_body = ResetPasswordRequest,
    params(("token" = String, Path, description = "One-time reset token from the email link")),
    responses(
        (status = 200, description = "Password reset", body = ApiMessage),
        (status = 400, description = "Weak password or invalid/expired token", body = ApiMessage),
    ),
    tag = "auth"
)]
pub async fn reset_password(
    Path(token): Path<String>,
    pool: Extension<PgPool>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return failure(StatusCode::BAD_REQUEST, "Missing payload");
    };

    let token = token.trim();
    if token.is_empty() {
        return failure(StatusCode::BAD_REQUEST, INVALID_TOKEN);
    }

    if let Err(issue) = validate_strength(&request.password) {
        return failure(StatusCode::BAD_REQUEST, &issue.to_string());
    }

    // Hash before consuming the token: a consumed token must not be lost to a
    // later hashing failure.
    let password_hash = match hash_password(&request.password).await {
        Ok(digest) => digest,
        Err(err) => {
            error!("Failed to hash reset password: {err}");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, RESET_FAILED);
        }
    };

    let token_hash = hash_account_token(token);
    match complete_password_reset(&pool, &token_hash, &password_hash).await {
        Ok(true) => success(
            StatusCode::OK,
            "Password reset successfully. You can now login with your new password",
        ),
        Ok(false) => failure(StatusCode::BAD_REQUEST, INVALID_TOKEN),
        Err(err) => {
            error!("Failed to reset password: {err}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, RESET_FAILED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::state::{AuthConfig, AuthState};
    use super::super::types::ResetPasswordRequest;
    use super::{forgot_password, reset_password};
    use anyhow::Result;
    use axum::extract::{Extension, Path};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::Json;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(AuthConfig::new(SecretString::from(
            "unit-test-signing-secret",
        ))))
    }

    #[tokio::test]
    async fn forgot_password_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = forgot_password(Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = reset_password(Path("token".to_string()), Extension(pool), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_weak_password() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = reset_password(
            Path("token".to_string()),
            Extension(pool),
            Some(Json(ResetPasswordRequest {
                password: "short".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_blank_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = reset_password(
            Path("  ".to_string()),
            Extension(pool),
            Some(Json(ResetPasswordRequest {
                password: "Abc12345!".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
