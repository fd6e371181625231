//! Small helpers for input validation, one-time tokens, and email links.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, Rng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};

const USERNAME_SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const USERNAME_SUFFIX_LENGTH: usize = 6;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Derive a username candidate from the email local part plus a random suffix.
///
/// Uniqueness is enforced by the store; callers retry on collision.
pub(crate) fn generate_username(email_normalized: &str) -> String {
    let local = email_normalized
        .split('@')
        .next()
        .unwrap_or(email_normalized);
    let suffix: String = (0..USERNAME_SUFFIX_LENGTH)
        .map(|_| {
            let index = OsRng.gen_range(0..USERNAME_SUFFIX_ALPHABET.len());
            char::from(USERNAME_SUFFIX_ALPHABET[index])
        })
        .collect();
    format!("{local}_{suffix}")
}

/// Create a new one-time token for verification/reset links.
///
/// The raw token is only sent to the user; the store keeps a hash.
pub(crate) fn generate_account_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate account token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a one-time token so the raw value never touches the database.
pub(crate) fn hash_account_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Build the verification link included in outbound emails.
pub(crate) fn build_verify_url(app_base_url: &str, token: &str) -> String {
    let base = app_base_url.trim_end_matches('/');
    format!("{base}/api/v1/auth/verify-email/{token}")
}

/// Build the password-reset link included in outbound emails.
pub(crate) fn build_reset_url(app_base_url: &str, token: &str) -> String {
    let base = app_base_url.trim_end_matches('/');
    format!("{base}/reset-password/{token}")
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Name of the violated unique constraint, when the driver reports one.
pub(crate) fn unique_constraint(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint().map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn generate_username_uses_local_part_and_suffix() {
        let username = generate_username("alice@example.com");
        let (local, suffix) = username.split_once('_').expect("suffix separator");
        assert_eq!(local, "alice");
        assert_eq!(suffix.len(), USERNAME_SUFFIX_LENGTH);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn generate_account_token_round_trip() {
        let decoded_len = generate_account_token()
            .ok()
            .and_then(|token| Base64UrlUnpadded::decode_vec(&token).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn hash_account_token_stable() {
        let first = hash_account_token("token");
        let second = hash_account_token("token");
        let different = hash_account_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
    }

    #[test]
    fn build_verify_url_trims_trailing_slash() {
        let url = build_verify_url("http://localhost:3000/", "token");
        assert_eq!(url, "http://localhost:3000/api/v1/auth/verify-email/token");
    }

    #[test]
    fn build_reset_url_trims_trailing_slash() {
        let url = build_reset_url("http://localhost:3000/", "token");
        assert_eq!(url, "http://localhost:3000/reset-password/token");
    }

    #[test]
    fn is_unique_violation_ignores_row_not_found() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert_eq!(unique_constraint(&sqlx::Error::RowNotFound), None);
    }
}
