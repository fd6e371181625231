//! Administrative account maintenance run from the command line.
//!
//! Each command acquires its own scoped database handle: connect, operate,
//! and close the pool on every exit path so a failing command never leaks
//! the connection.

use anyhow::{anyhow, bail, Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::api::handlers::auth::password::{
    generate, hash_password, validate_strength, GENERATED_LENGTH,
};
use crate::api::handlers::auth::storage::{
    insert_superuser, lookup_user_by_email, set_superuser, update_password,
};
use crate::api::handlers::auth::utils::{normalize_email, valid_email};

async fn connect(dsn: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(1)
        .connect(dsn)
        .await
        .context("Failed to connect to database")
}

/// Create a pre-verified, active superuser account.
///
/// # Errors
/// Returns an error if the email is invalid or already taken, the provided
/// password is too weak, or the database is unreachable.
pub async fn create_superuser(
    dsn: &str,
    email: &str,
    password: Option<&str>,
    name: &str,
) -> Result<()> {
    let pool = connect(dsn).await?;
    let result = create_superuser_scoped(&pool, email, password, name).await;
    pool.close().await;
    result
}

async fn create_superuser_scoped(
    pool: &PgPool,
    email: &str,
    password: Option<&str>,
    name: &str,
) -> Result<()> {
    let email = normalize_email(email);
    if !valid_email(&email) {
        bail!("invalid email: {email}");
    }

    let (password, generated) = resolve_password(password)?;
    let password_hash = hash_password(&password).await?;

    let Some(created) = insert_superuser(pool, &email, name, &password_hash).await? else {
        bail!("user with email {email} already exists");
    };

    println!("Superuser created successfully:");
    println!("- Email: {email}");
    println!("- Username: {}", created.username);
    print_password_line(&password, generated);

    Ok(())
}

/// Set a user's password, generating one when none is provided.
///
/// # Errors
/// Returns an error if the user does not exist, the provided password is too
/// weak, or the database is unreachable.
pub async fn change_password(dsn: &str, email: &str, password: Option<&str>) -> Result<()> {
    let pool = connect(dsn).await?;
    let result = change_password_scoped(&pool, email, password).await;
    pool.close().await;
    result
}

async fn change_password_scoped(pool: &PgPool, email: &str, password: Option<&str>) -> Result<()> {
    let email = normalize_email(email);

    let Some(user) = lookup_user_by_email(pool, &email).await? else {
        bail!("user with email {email} not found");
    };

    let (password, generated) = resolve_password(password)?;
    let password_hash = hash_password(&password).await?;
    update_password(pool, user.id, &password_hash).await?;

    println!("Password changed successfully for user: {email}");
    print_password_line(&password, generated);

    Ok(())
}

/// Elevate a verified, active user to superuser.
///
/// Elevating an existing superuser is a no-op success.
///
/// # Errors
/// Returns an error if the user does not exist, is unverified, or inactive.
pub async fn upgrade_superuser(dsn: &str, email: &str) -> Result<()> {
    let pool = connect(dsn).await?;
    let result = upgrade_superuser_scoped(&pool, email).await;
    pool.close().await;
    result
}

async fn upgrade_superuser_scoped(pool: &PgPool, email: &str) -> Result<()> {
    let email = normalize_email(email);

    let Some(user) = lookup_user_by_email(pool, &email).await? else {
        bail!("user with email {email} not found");
    };

    if !user.is_verified {
        bail!("user with email {email} is not verified");
    }
    if !user.is_active {
        bail!("user with email {email} is not active");
    }
    if user.is_superuser {
        println!("User with email {email} is already a superuser");
        return Ok(());
    }

    set_superuser(pool, user.id).await?;

    println!("User {email} has been upgraded to superuser status successfully");

    Ok(())
}

fn resolve_password(password: Option<&str>) -> Result<(String, bool)> {
    match password {
        Some(provided) => {
            validate_strength(provided).map_err(|issue| anyhow!("{issue}"))?;
            Ok((provided.to_string(), false))
        }
        None => Ok((generate(GENERATED_LENGTH)?, true)),
    }
}

fn print_password_line(password: &str, generated: bool) {
    if generated {
        println!("- Password: {password} (auto-generated)");
        println!("Please save this password in a secure location.");
    } else {
        println!("- Password: (as specified)");
    }
}

#[cfg(test)]
mod tests {
    use super::resolve_password;

    #[test]
    fn resolve_password_validates_provided() {
        assert!(resolve_password(Some("short")).is_err());
        let (password, generated) =
            resolve_password(Some("Abc12345!")).expect("compliant password");
        assert_eq!(password, "Abc12345!");
        assert!(!generated);
    }

    #[test]
    fn resolve_password_generates_when_missing() {
        let (password, generated) = resolve_password(None).expect("generated password");
        assert!(generated);
        assert!(crate::api::handlers::auth::password::validate_strength(&password).is_ok());
    }
}
