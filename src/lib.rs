//! # Sesamo (User Authentication Service)
//!
//! `sesamo` is a conventional user-authentication backend: registration with
//! email verification, password login issuing signed bearer tokens, password
//! reset, and administrative account maintenance from the command line.
//!
//! ## Accounts
//!
//! Emails are case-normalized and unique. Usernames are derived once from the
//! email local part plus a random suffix. Passwords are bcrypt-hashed
//! (cost 12) on the blocking pool; plaintext never reaches the database or
//! the logs.
//!
//! ## One-time tokens
//!
//! Each account has at most one outstanding single-use token, tagged with the
//! purpose it was issued for (email verification or password reset). Raw
//! token values only leave the service inside email links; the database
//! stores SHA-256 hashes.
//!
//! ## Bearer tokens
//!
//! Login issues a stateless `HS256` token carrying `{sub, email, isSuperuser}`.
//! There is no revocation list: every authenticated request re-checks
//! `is_active` in the database, so deactivating a user invalidates its
//! outstanding tokens.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
