//! Database helpers for accounts, one-time tokens, and outbound email rows.

use anyhow::{anyhow, Context, Result};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::state::AuthConfig;
use super::utils::{
    build_reset_url, build_verify_url, generate_account_token, generate_username,
    hash_account_token, is_unique_violation, unique_constraint,
};

const USERNAME_ATTEMPTS: usize = 3;

/// What a one-time token authorizes. Consumption checks the tag, so a
/// verification token can never complete a password reset (or vice versa).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TokenPurpose {
    VerifyEmail,
    ResetPassword,
}

impl TokenPurpose {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::VerifyEmail => "verify_email",
            Self::ResetPassword => "reset_password",
        }
    }
}

/// Outcome when attempting to create a new user + verification token.
#[derive(Debug)]
pub(crate) enum SignupOutcome {
    Created { user_id: Uuid },
    Conflict,
}

/// Outcome for a reset request (callers always report success to avoid
/// account probing).
#[derive(Debug)]
pub(crate) enum ResetRequestOutcome {
    Queued,
    Noop,
}

/// Full credential record, as stored.
#[derive(Debug)]
pub(crate) struct UserRecord {
    pub(crate) id: Uuid,
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) username: String,
    pub(crate) password_hash: String,
    pub(crate) is_verified: bool,
    pub(crate) is_active: bool,
    pub(crate) is_superuser: bool,
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        is_verified: row.get("is_verified"),
        is_active: row.get("is_active"),
        is_superuser: row.get("is_superuser"),
    }
}

const USER_COLUMNS: &str =
    "id, email, name, username, password_hash, is_verified, is_active, is_superuser";

pub(crate) async fn lookup_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserRecord>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 LIMIT 1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;
    Ok(row.as_ref().map(user_from_row))
}

pub(crate) async fn lookup_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRecord>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 LIMIT 1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;
    Ok(row.as_ref().map(user_from_row))
}

/// Create an unverified user plus its verification token and outbox row.
///
/// The whole signup is one transaction per attempt: a username collision
/// aborts the transaction, so the attempt is retried from scratch with a
/// fresh suffix. The email unique index is the duplicate-signup authority;
/// a violation on it maps to [`SignupOutcome::Conflict`].
pub(crate) async fn create_user_with_verification(
    pool: &PgPool,
    email: &str,
    name: &str,
    password_hash: &str,
    config: &AuthConfig,
) -> Result<SignupOutcome> {
    for _ in 0..USERNAME_ATTEMPTS {
        let mut tx = pool.begin().await.context("begin signup transaction")?;

        let username = generate_username(email);
        let query = r"
            INSERT INTO users (email, name, username, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .bind(name)
            .bind(&username)
            .bind(password_hash)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await;

        let user_id: Uuid = match row {
            Ok(row) => row.get("id"),
            Err(err) if is_unique_violation(&err) => {
                let retry_username =
                    unique_constraint(&err).is_some_and(|name| name.contains("username"));
                let _ = tx.rollback().await;
                if retry_username {
                    continue;
                }
                return Ok(SignupOutcome::Conflict);
            }
            Err(err) => {
                let _ = tx.rollback().await;
                return Err(err).context("failed to insert user");
            }
        };

        let token = issue_account_token(
            &mut tx,
            user_id,
            TokenPurpose::VerifyEmail,
            config.verify_token_ttl_seconds(),
        )
        .await?;
        let verify_url = build_verify_url(config.app_base_url(), &token);
        enqueue_email(
            &mut tx,
            email,
            "verify_email",
            &json!({ "email": email, "verify_url": verify_url }),
        )
        .await?;

        tx.commit().await.context("commit signup transaction")?;
        return Ok(SignupOutcome::Created { user_id });
    }

    Err(anyhow!("failed to generate a unique username"))
}

/// Issue the account's outstanding one-time token, replacing any previous one.
///
/// Returns the raw token for the email link; only its hash is stored.
pub(crate) async fn issue_account_token(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    purpose: TokenPurpose,
    ttl_seconds: i64,
) -> Result<String> {
    let token = generate_account_token()?;
    let token_hash = hash_account_token(&token);

    let query = r"
        INSERT INTO account_tokens (user_id, purpose, token_hash, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
        ON CONFLICT (user_id) DO UPDATE
        SET purpose = EXCLUDED.purpose,
            token_hash = EXCLUDED.token_hash,
            expires_at = EXCLUDED.expires_at,
            created_at = NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(purpose.as_str())
        .bind(token_hash)
        .bind(ttl_seconds)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to issue account token")?;

    Ok(token)
}

/// Consume the outstanding token if it matches the purpose and is unexpired.
///
/// The `DELETE ... RETURNING` makes exactly one caller win a concurrent race
/// for the same token.
async fn consume_account_token(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    token_hash: &[u8],
    purpose: TokenPurpose,
) -> Result<Option<Uuid>> {
    let query = r"
        DELETE FROM account_tokens
        WHERE token_hash = $1
          AND purpose = $2
          AND expires_at > NOW()
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .bind(purpose.as_str())
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to consume account token")?;
    Ok(row.map(|row| row.get("user_id")))
}

/// Consume a verification token and mark its account verified.
pub(crate) async fn mark_email_verified(pool: &PgPool, token_hash: &[u8]) -> Result<bool> {
    let mut tx = pool.begin().await.context("begin verify transaction")?;

    let Some(user_id) = consume_account_token(&mut tx, token_hash, TokenPurpose::VerifyEmail).await?
    else {
        let _ = tx.rollback().await;
        return Ok(false);
    };

    let query = r"
        UPDATE users
        SET is_verified = TRUE,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to mark user verified")?;

    tx.commit().await.context("commit verify transaction")?;
    Ok(true)
}

/// Issue a reset token and queue the reset email, when the account exists.
pub(crate) async fn request_password_reset(
    pool: &PgPool,
    email: &str,
    config: &AuthConfig,
) -> Result<ResetRequestOutcome> {
    let mut tx = pool.begin().await.context("begin reset-request transaction")?;

    let query = "SELECT id FROM users WHERE email = $1 LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lookup user for reset")?;

    let Some(row) = row else {
        tx.commit().await.context("commit reset-request noop")?;
        return Ok(ResetRequestOutcome::Noop);
    };

    let user_id: Uuid = row.get("id");
    let token = issue_account_token(
        &mut tx,
        user_id,
        TokenPurpose::ResetPassword,
        config.reset_token_ttl_seconds(),
    )
    .await?;
    let reset_url = build_reset_url(config.app_base_url(), &token);
    enqueue_email(
        &mut tx,
        email,
        "reset_password",
        &json!({ "email": email, "reset_url": reset_url }),
    )
    .await?;

    tx.commit().await.context("commit reset-request transaction")?;
    Ok(ResetRequestOutcome::Queued)
}

/// Consume a reset token and store the new password hash.
pub(crate) async fn complete_password_reset(
    pool: &PgPool,
    token_hash: &[u8],
    password_hash: &str,
) -> Result<bool> {
    let mut tx = pool.begin().await.context("begin reset transaction")?;

    let Some(user_id) =
        consume_account_token(&mut tx, token_hash, TokenPurpose::ResetPassword).await?
    else {
        let _ = tx.rollback().await;
        return Ok(false);
    };

    let query = r"
        UPDATE users
        SET password_hash = $2,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to update password hash")?;

    tx.commit().await.context("commit reset transaction")?;
    Ok(true)
}

/// Store a new password hash for an existing account (admin path).
pub(crate) async fn update_password(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET password_hash = $2,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;
    Ok(())
}

/// Set the superuser flag. Callers check verified/active first.
pub(crate) async fn set_superuser(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = r"
        UPDATE users
        SET is_superuser = TRUE,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to set superuser flag")?;
    Ok(())
}

/// A superuser account created by the administrative path.
#[derive(Debug)]
pub(crate) struct CreatedSuperuser {
    pub(crate) username: String,
}

/// Insert a pre-verified, active superuser. Returns `None` when the email is
/// already taken.
pub(crate) async fn insert_superuser(
    pool: &PgPool,
    email: &str,
    name: &str,
    password_hash: &str,
) -> Result<Option<CreatedSuperuser>> {
    let query = r"
        INSERT INTO users (email, name, username, password_hash, is_verified, is_active, is_superuser)
        VALUES ($1, $2, $3, $4, TRUE, TRUE, TRUE)
        RETURNING id
    ";

    for _ in 0..USERNAME_ATTEMPTS {
        let username = generate_username(email);
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(email)
            .bind(name)
            .bind(&username)
            .bind(password_hash)
            .fetch_one(pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => return Ok(Some(CreatedSuperuser { username })),
            Err(err) if is_unique_violation(&err) => {
                if unique_constraint(&err).is_some_and(|name| name.contains("username")) {
                    continue;
                }
                return Ok(None);
            }
            Err(err) => return Err(err).context("failed to insert superuser"),
        }
    }

    Err(anyhow!("failed to generate a unique username"))
}

async fn enqueue_email(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    to_email: &str,
    template: &str,
    payload: &serde_json::Value,
) -> Result<()> {
    let payload_text = serde_json::to_string(payload).context("failed to serialize email payload")?;

    let query = r"
        INSERT INTO email_outbox (to_email, template, payload_json)
        VALUES ($1, $2, $3::jsonb)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(to_email)
        .bind(template)
        .bind(payload_text)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert email outbox row")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ResetRequestOutcome, SignupOutcome, TokenPurpose};
    use uuid::Uuid;

    #[test]
    fn token_purpose_tags() {
        assert_eq!(TokenPurpose::VerifyEmail.as_str(), "verify_email");
        assert_eq!(TokenPurpose::ResetPassword.as_str(), "reset_password");
    }

    #[test]
    fn signup_outcome_debug_names() {
        let created = SignupOutcome::Created {
            user_id: Uuid::nil(),
        };
        assert!(format!("{created:?}").starts_with("Created"));
        assert_eq!(format!("{:?}", SignupOutcome::Conflict), "Conflict");
    }

    #[test]
    fn reset_request_outcome_debug_names() {
        assert_eq!(format!("{:?}", ResetRequestOutcome::Queued), "Queued");
        assert_eq!(format!("{:?}", ResetRequestOutcome::Noop), "Noop");
    }
}
