//! Request/response types for the auth endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::storage::UserRecord;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub success: bool,
    pub message: String,
    pub user_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub username: String,
    pub is_superuser: bool,
}

impl From<UserRecord> for UserProfile {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            name: user.name,
            username: user.username,
            is_superuser: user.is_superuser,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: UserProfile,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// Uniform `{success, message}` envelope for outcomes without a payload.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

/// Build a failure envelope response.
pub(crate) fn failure(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ApiMessage {
            success: false,
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Build a success envelope response.
pub(crate) fn success(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ApiMessage {
            success: true,
            message: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use uuid::Uuid;

    #[test]
    fn signup_response_uses_camel_case_user_id() -> Result<()> {
        let response = SignupResponse {
            success: true,
            message: "ok".to_string(),
            user_id: "abc".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        assert!(value.get("userId").is_some());
        assert!(value.get("user_id").is_none());
        Ok(())
    }

    #[test]
    fn user_profile_from_record_keeps_identity_fields() {
        let id = Uuid::new_v4();
        let profile = UserProfile::from(UserRecord {
            id,
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            username: "alice_a1b2c3".to_string(),
            password_hash: "digest".to_string(),
            is_verified: true,
            is_active: true,
            is_superuser: false,
        });
        assert_eq!(profile.id, id.to_string());
        assert_eq!(profile.email, "alice@example.com");
        assert_eq!(profile.username, "alice_a1b2c3");
        assert!(!profile.is_superuser);
    }

    #[test]
    fn user_profile_serializes_superuser_in_camel_case() -> Result<()> {
        let profile = UserProfile {
            id: "id".to_string(),
            email: "a@example.com".to_string(),
            name: "A".to_string(),
            username: "a_123456".to_string(),
            is_superuser: true,
        };
        let value = serde_json::to_value(&profile)?;
        let flag = value
            .get("isSuperuser")
            .and_then(serde_json::Value::as_bool)
            .context("missing isSuperuser")?;
        assert!(flag);
        Ok(())
    }

    #[test]
    fn login_request_round_trips() -> Result<()> {
        let request: LoginRequest = serde_json::from_value(serde_json::json!({
            "email": "alice@example.com",
            "password": "Abc12345!",
        }))?;
        assert_eq!(request.email, "alice@example.com");
        assert_eq!(request.password, "Abc12345!");
        Ok(())
    }
}
