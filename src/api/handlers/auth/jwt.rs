//! Bearer token issuance and verification (HS256).
//!
//! Tokens are stateless: there is no revocation list. Deactivating a user
//! takes effect because every authenticated request re-checks `is_active`
//! against the credential store (see `principal`).

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, get_current_timestamp, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims embedded in every issued token.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub is_superuser: bool,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    #[must_use]
    pub fn new(user_id: Uuid, email: String, is_superuser: bool, ttl_seconds: u64) -> Self {
        let iat = get_current_timestamp();
        Self {
            sub: user_id.to_string(),
            email,
            is_superuser,
            iat,
            exp: iat + ttl_seconds,
        }
    }
}

/// Why a presented token was rejected.
#[derive(Debug, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    InvalidSignature,
    Malformed,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::Expired => "token expired",
            Self::InvalidSignature => "token signature does not verify",
            Self::Malformed => "token malformed",
        };
        f.write_str(reason)
    }
}

impl std::error::Error for TokenError {}

/// Sign a token for the given claims.
///
/// # Errors
/// Returns an error if the claims cannot be serialized and signed.
pub fn issue(claims: &Claims, secret: &SecretString) -> anyhow::Result<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|err| anyhow::anyhow!("failed to sign token: {err}"))
}

/// Validate a presented token and return its claims.
///
/// A token whose signature does not verify is never partially trusted; expiry
/// is enforced with zero leeway.
///
/// # Errors
/// Returns why the token was rejected.
pub fn verify(token: &str, secret: &SecretString) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn secret() -> SecretString {
        SecretString::from("unit-test-signing-secret")
    }

    #[test]
    fn issue_verify_round_trip() -> Result<()> {
        let claims = Claims::new(
            Uuid::new_v4(),
            "alice@example.com".to_string(),
            true,
            24 * 60 * 60,
        );
        let token = issue(&claims, &secret())?;
        let verified = verify(&token, &secret()).map_err(anyhow::Error::from)?;
        assert_eq!(verified, claims);
        Ok(())
    }

    #[test]
    fn verify_rejects_tampered_signature() -> Result<()> {
        let claims = Claims::new(Uuid::new_v4(), "alice@example.com".to_string(), false, 3600);
        let token = issue(&claims, &secret())?;

        // Flip the first signature character; the decoded signature byte changes
        // while the token stays well-formed.
        let (head, signature) = token.rsplit_once('.').expect("token has three segments");
        let mut chars = signature.chars();
        let first = chars.next().expect("signature is not empty");
        let replacement = if first == 'A' { 'B' } else { 'A' };
        let tampered = format!("{head}.{replacement}{}", chars.as_str());

        assert_eq!(
            verify(&tampered, &secret()),
            Err(TokenError::InvalidSignature)
        );
        Ok(())
    }

    #[test]
    fn verify_rejects_wrong_secret() -> Result<()> {
        let claims = Claims::new(Uuid::new_v4(), "alice@example.com".to_string(), false, 3600);
        let token = issue(&claims, &secret())?;
        assert_eq!(
            verify(&token, &SecretString::from("another-secret")),
            Err(TokenError::InvalidSignature)
        );
        Ok(())
    }

    #[test]
    fn verify_rejects_expired_token() -> Result<()> {
        let now = get_current_timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "alice@example.com".to_string(),
            is_superuser: false,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = issue(&claims, &secret())?;
        assert_eq!(verify(&token, &secret()), Err(TokenError::Expired));
        Ok(())
    }

    #[test]
    fn verify_rejects_garbage() {
        assert_eq!(
            verify("not-a-token", &secret()),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn claims_serialize_superuser_flag_in_camel_case() -> Result<()> {
        let claims = Claims::new(Uuid::new_v4(), "alice@example.com".to_string(), true, 60);
        let value = serde_json::to_value(&claims)?;
        assert_eq!(value.get("isSuperuser"), Some(&serde_json::json!(true)));
        Ok(())
    }
}
