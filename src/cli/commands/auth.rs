use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_APP_BASE_URL: &str = "app-base-url";
pub const ARG_VERIFY_TOKEN_TTL_SECONDS: &str = "verify-token-ttl-seconds";
pub const ARG_RESET_TOKEN_TTL_SECONDS: &str = "reset-token-ttl-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_outbox_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Secret used to sign bearer tokens")
                .env("SESAMO_JWT_SECRET"),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Bearer token lifetime in seconds")
                .env("SESAMO_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_APP_BASE_URL)
                .long(ARG_APP_BASE_URL)
                .help("Base URL used to build links in outbound emails")
                .env("SESAMO_APP_BASE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_VERIFY_TOKEN_TTL_SECONDS)
                .long(ARG_VERIFY_TOKEN_TTL_SECONDS)
                .help("Email verification token TTL in seconds")
                .env("SESAMO_VERIFY_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_RESET_TOKEN_TTL_SECONDS)
                .long(ARG_RESET_TOKEN_TTL_SECONDS)
                .help("Password reset token TTL in seconds")
                .env("SESAMO_RESET_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_outbox_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("email-outbox-poll-seconds")
                .long("email-outbox-poll-seconds")
                .help("Email outbox poll interval in seconds")
                .env("SESAMO_EMAIL_OUTBOX_POLL_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("email-outbox-batch-size")
                .long("email-outbox-batch-size")
                .help("Email outbox batch size per poll")
                .env("SESAMO_EMAIL_OUTBOX_BATCH_SIZE")
                .default_value("10")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("email-outbox-max-attempts")
                .long("email-outbox-max-attempts")
                .help("Max attempts before marking an email as failed")
                .env("SESAMO_EMAIL_OUTBOX_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("email-outbox-backoff-base-seconds")
                .long("email-outbox-backoff-base-seconds")
                .help("Base delay for email outbox retry backoff")
                .env("SESAMO_EMAIL_OUTBOX_BACKOFF_BASE_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("email-outbox-backoff-max-seconds")
                .long("email-outbox-backoff-max-seconds")
                .help("Max delay for email outbox retry backoff")
                .env("SESAMO_EMAIL_OUTBOX_BACKOFF_MAX_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug)]
pub struct OutboxOptions {
    pub poll_seconds: u64,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff_base_seconds: u64,
    pub backoff_max_seconds: u64,
}

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub token_ttl_seconds: u64,
    pub app_base_url: String,
    pub verify_token_ttl_seconds: i64,
    pub reset_token_ttl_seconds: i64,
    pub outbox: OutboxOptions,
}

impl Options {
    /// Extract the auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .cloned()
            .context("missing required argument: --jwt-secret")?;

        Ok(Self {
            jwt_secret: SecretString::from(jwt_secret),
            token_ttl_seconds: matches
                .get_one::<u64>(ARG_TOKEN_TTL_SECONDS)
                .copied()
                .unwrap_or(86_400),
            app_base_url: matches
                .get_one::<String>(ARG_APP_BASE_URL)
                .cloned()
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            verify_token_ttl_seconds: matches
                .get_one::<i64>(ARG_VERIFY_TOKEN_TTL_SECONDS)
                .copied()
                .unwrap_or(86_400),
            reset_token_ttl_seconds: matches
                .get_one::<i64>(ARG_RESET_TOKEN_TTL_SECONDS)
                .copied()
                .unwrap_or(3600),
            outbox: OutboxOptions {
                poll_seconds: matches
                    .get_one::<u64>("email-outbox-poll-seconds")
                    .copied()
                    .unwrap_or(5),
                batch_size: matches
                    .get_one::<usize>("email-outbox-batch-size")
                    .copied()
                    .unwrap_or(10),
                max_attempts: matches
                    .get_one::<u32>("email-outbox-max-attempts")
                    .copied()
                    .unwrap_or(5),
                backoff_base_seconds: matches
                    .get_one::<u64>("email-outbox-backoff-base-seconds")
                    .copied()
                    .unwrap_or(5),
                backoff_max_seconds: matches
                    .get_one::<u64>("email-outbox-backoff-max-seconds")
                    .copied()
                    .unwrap_or(300),
            },
        })
    }
}
