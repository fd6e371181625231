//! Email verification endpoint.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use tracing::error;

use super::storage::mark_email_verified;
use super::types::{failure, success, ApiMessage};
use super::utils::hash_account_token;

const INVALID_TOKEN: &str = "Invalid or expired verification token";

/// Consume the emailed token and mark the account verified.
#[utoipa::path(
    get,
    path = "/api/v1/auth/verify-email/{token}",
    params(("token" = String, Path, description = "One-time verification token from the email link")),
    responses(
        (status = 200, description = "Email verified", body = ApiMessage),
        (status = 400, description = "Invalid or expired token", body = ApiMessage),
    ),
    tag = "auth"
)]
pub async fn verify_email(
    Path(token): Path<String>,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    let token = token.trim();
    if token.is_empty() {
        return failure(StatusCode::BAD_REQUEST, INVALID_TOKEN);
    }

    // The raw token is hashed before lookup; it is never stored server-side.
    let token_hash = hash_account_token(token);

    match mark_email_verified(&pool, &token_hash).await {
        Ok(true) => success(
            StatusCode::OK,
            "Email verified successfully. You can now login",
        ),
        Ok(false) => failure(StatusCode::BAD_REQUEST, INVALID_TOKEN),
        Err(err) => {
            error!("Failed to verify email: {err}");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred during email verification",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::verify_email;
    use anyhow::Result;
    use axum::extract::{Extension, Path};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn verify_email_blank_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_email(Path("  ".to_string()), Extension(pool))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
