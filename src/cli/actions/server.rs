use crate::api::{self, handlers::auth::AuthConfig, EmailWorkerConfig};
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub token_ttl_seconds: u64,
    pub app_base_url: String,
    pub verify_token_ttl_seconds: i64,
    pub reset_token_ttl_seconds: i64,
    pub email_outbox_poll_seconds: u64,
    pub email_outbox_batch_size: usize,
    pub email_outbox_max_attempts: u32,
    pub email_outbox_backoff_base_seconds: u64,
    pub email_outbox_backoff_max_seconds: u64,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if the database is unreachable or the server fails to
/// start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = AuthConfig::new(args.jwt_secret)
        .with_token_ttl_seconds(args.token_ttl_seconds)
        .with_app_base_url(args.app_base_url)
        .with_verify_token_ttl_seconds(args.verify_token_ttl_seconds)
        .with_reset_token_ttl_seconds(args.reset_token_ttl_seconds);

    let email_config = EmailWorkerConfig::new()
        .with_poll_interval_seconds(args.email_outbox_poll_seconds)
        .with_batch_size(args.email_outbox_batch_size)
        .with_max_attempts(args.email_outbox_max_attempts)
        .with_backoff_base_seconds(args.email_outbox_backoff_base_seconds)
        .with_backoff_max_seconds(args.email_outbox_backoff_max_seconds);

    api::new(args.port, args.dsn, auth_config, email_config).await
}
