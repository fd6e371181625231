//! Account workflow: signup, email verification, login, password reset.
//!
//! ## One-time tokens
//!
//! Each account has at most one outstanding one-time token, tagged with the
//! purpose it was issued for (`verify_email` or `reset_password`). Issuing a
//! new token replaces the outstanding one; consumption checks the tag, is
//! single-use, and enforces expiry. Raw tokens only leave the service inside
//! email links; the database stores SHA-256 hashes.
//!
//! ## Bearer tokens
//!
//! Login issues a stateless HS256 token. Revocation is implicit: every
//! authenticated request re-fetches the account and rejects inactive users.

pub mod jwt;
pub mod login;
pub mod password;
pub(crate) mod principal;
pub mod reset;
pub mod signup;
pub(crate) mod state;
pub(crate) mod storage;
pub mod types;
pub(crate) mod utils;
pub mod verification;

pub use principal::Principal;
pub use state::{AuthConfig, AuthState};
