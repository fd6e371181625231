//! Authenticated principal extraction for bearer-gated endpoints.
//!
//! Flow Overview: read the `Authorization: Bearer` header, verify the token
//! signature and expiry, then re-fetch the account so deactivation takes
//! effect on outstanding tokens.

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use sqlx::PgPool;
use tracing::{debug, error};
use uuid::Uuid;

use super::jwt;
use super::state::AuthConfig;
use super::storage;

/// Authenticated user context derived from a bearer token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub is_superuser: bool,
}

/// Gate rejection: status plus the envelope message for it.
pub(crate) type AuthRejection = (StatusCode, &'static str);

const MISSING_TOKEN: AuthRejection = (StatusCode::FORBIDDEN, "No token provided");
const UNAUTHORIZED: AuthRejection = (StatusCode::UNAUTHORIZED, "Unauthorized access");
const USER_GONE: AuthRejection = (StatusCode::UNAUTHORIZED, "User not found or inactive");
const GATE_FAILED: AuthRejection = (
    StatusCode::INTERNAL_SERVER_ERROR,
    "An error occurred during authentication",
);

/// Resolve the bearer token into a principal.
///
/// # Errors
/// Missing credential maps to 403; an invalid, expired, or revoked-by-
/// deactivation token maps to 401.
pub(crate) async fn require_auth(
    headers: &HeaderMap,
    pool: &PgPool,
    config: &AuthConfig,
) -> Result<Principal, AuthRejection> {
    let Some(token) = bearer_token(headers) else {
        return Err(MISSING_TOKEN);
    };

    let claims = jwt::verify(token, config.jwt_secret()).map_err(|err| {
        debug!("Rejected bearer token: {err}");
        UNAUTHORIZED
    })?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| UNAUTHORIZED)?;

    match storage::lookup_user_by_id(pool, user_id).await {
        Ok(Some(user)) if user.is_active => Ok(Principal {
            user_id,
            email: user.email,
            is_superuser: user.is_superuser,
        }),
        Ok(_) => Err(USER_GONE),
        Err(err) => {
            error!("Failed to resolve principal: {err}");
            Err(GATE_FAILED)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::http::HeaderValue;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn config() -> AuthConfig {
        AuthConfig::new(SecretString::from("unit-test-signing-secret"))
    }

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[test]
    fn bearer_token_extracts_value() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn bearer_token_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn bearer_token_rejects_empty_value() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn missing_header_is_forbidden() -> Result<()> {
        let result = require_auth(&HeaderMap::new(), &lazy_pool()?, &config()).await;
        assert_eq!(result.err().map(|(status, _)| status), Some(StatusCode::FORBIDDEN));
        Ok(())
    }

    #[tokio::test]
    async fn garbage_token_is_unauthorized() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer garbage"));
        let result = require_auth(&headers, &lazy_pool()?, &config()).await;
        assert_eq!(
            result.err().map(|(status, _)| status),
            Some(StatusCode::UNAUTHORIZED)
        );
        Ok(())
    }
}
