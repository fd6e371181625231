//! Password policy: strength rules, random generation, and bcrypt hashing.

use anyhow::{Context, Result};
use rand::{rngs::OsRng, Rng};
use tokio::task;

/// Generation alphabet; visually ambiguous characters (`0/O`, `1/l/I`) are excluded.
const GENERATE_ALPHABET: &[u8] =
    b"23456789abcdefghijkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ!@#$%^&*";

const SPECIAL_CHARACTERS: &str = "!@#$%^&*";

/// bcrypt cost factor, deliberately slow.
const HASH_COST: u32 = 12;

pub const GENERATED_LENGTH: usize = 12;

const MAX_GENERATE_ATTEMPTS: usize = 64;

/// First strength rule a candidate violates.
#[derive(Debug, PartialEq, Eq)]
pub enum StrengthIssue {
    TooShort,
    MissingDigit,
    MissingUppercase,
    MissingLowercase,
    MissingSpecial,
}

impl std::fmt::Display for StrengthIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::TooShort => "Password must be at least 8 characters long",
            Self::MissingDigit => "Password must contain at least one number",
            Self::MissingUppercase => "Password must contain at least one uppercase letter",
            Self::MissingLowercase => "Password must contain at least one lowercase letter",
            Self::MissingSpecial => {
                "Password must contain at least one special character (!@#$%^&*)"
            }
        };
        f.write_str(reason)
    }
}

impl std::error::Error for StrengthIssue {}

/// Check a candidate against the strength rules, stopping at the first violation.
///
/// # Errors
/// Returns the first violated rule.
pub fn validate_strength(candidate: &str) -> Result<(), StrengthIssue> {
    if candidate.chars().count() < 8 {
        return Err(StrengthIssue::TooShort);
    }
    if !candidate.chars().any(|c| c.is_ascii_digit()) {
        return Err(StrengthIssue::MissingDigit);
    }
    if !candidate.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(StrengthIssue::MissingUppercase);
    }
    if !candidate.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(StrengthIssue::MissingLowercase);
    }
    if !candidate.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return Err(StrengthIssue::MissingSpecial);
    }
    Ok(())
}

/// Generate a random password that satisfies the strength rules.
///
/// A uniform draw can miss a required character class, so draw again until the
/// policy check passes. At the default length the attempt bound is unreachable
/// in practice.
///
/// # Errors
/// Returns an error if no compliant password is produced within the attempt
/// bound (possible only for lengths the policy cannot accept).
pub fn generate(length: usize) -> Result<String> {
    for _ in 0..MAX_GENERATE_ATTEMPTS {
        let candidate: String = (0..length)
            .map(|_| {
                let index = OsRng.gen_range(0..GENERATE_ALPHABET.len());
                char::from(GENERATE_ALPHABET[index])
            })
            .collect();
        if validate_strength(&candidate).is_ok() {
            return Ok(candidate);
        }
    }
    anyhow::bail!("failed to generate a policy-compliant password of length {length}")
}

/// Hash a password with bcrypt.
///
/// Runs on the blocking pool: the cost factor makes hashing CPU-bound and it
/// must not stall unrelated requests on the async runtime.
///
/// # Errors
/// Returns an error if the hashing task fails.
pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    task::spawn_blocking(move || bcrypt::hash(password, HASH_COST))
        .await
        .context("password hashing task panicked")?
        .context("failed to hash password")
}

/// Compare a plaintext password against a stored bcrypt digest.
///
/// The comparison is delegated to bcrypt; plaintext values are never compared
/// directly.
///
/// # Errors
/// Returns an error if the digest is not a valid bcrypt hash.
pub async fn verify_password(password: &str, digest: &str) -> Result<bool> {
    let password = password.to_string();
    let digest = digest.to_string();
    task::spawn_blocking(move || bcrypt::verify(password, &digest))
        .await
        .context("password verification task panicked")?
        .context("failed to verify password")
}
