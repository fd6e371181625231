//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to execute: the API server by
//! default, or one of the administrative maintenance commands.

use crate::cli::actions::{server, Action};
use crate::cli::commands::{
    auth, ARG_DSN, ARG_EMAIL, ARG_NAME, ARG_OUTPUT, ARG_PASSWORD, ARG_PORT, CMD_CHANGE_PASSWORD,
    CMD_CREATE_SUPERUSER, CMD_REPORT, CMD_UPGRADE_SUPERUSER,
};
use anyhow::{Context, Result};
use clap::ArgMatches;
use std::path::PathBuf;

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((CMD_CREATE_SUPERUSER, sub)) => Ok(Action::CreateSuperuser {
            dsn: require_dsn(sub)?,
            email: require_email(sub)?,
            password: sub.get_one::<String>(ARG_PASSWORD).cloned(),
            name: sub
                .get_one::<String>(ARG_NAME)
                .cloned()
                .unwrap_or_else(|| "Admin".to_string()),
        }),
        Some((CMD_CHANGE_PASSWORD, sub)) => Ok(Action::ChangePassword {
            dsn: require_dsn(sub)?,
            email: require_email(sub)?,
            password: sub.get_one::<String>(ARG_PASSWORD).cloned(),
        }),
        Some((CMD_UPGRADE_SUPERUSER, sub)) => Ok(Action::UpgradeSuperuser {
            dsn: require_dsn(sub)?,
            email: require_email(sub)?,
        }),
        Some((CMD_REPORT, sub)) => Ok(Action::Report {
            dsn: require_dsn(sub)?,
            output: sub
                .get_one::<String>(ARG_OUTPUT)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("project_report.json")),
        }),
        _ => {
            let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(3000);
            let dsn = require_dsn(matches)?;
            let auth_opts = auth::Options::parse(matches)?;

            Ok(Action::Server(server::Args {
                port,
                dsn,
                jwt_secret: auth_opts.jwt_secret,
                token_ttl_seconds: auth_opts.token_ttl_seconds,
                app_base_url: auth_opts.app_base_url,
                verify_token_ttl_seconds: auth_opts.verify_token_ttl_seconds,
                reset_token_ttl_seconds: auth_opts.reset_token_ttl_seconds,
                email_outbox_poll_seconds: auth_opts.outbox.poll_seconds,
                email_outbox_batch_size: auth_opts.outbox.batch_size,
                email_outbox_max_attempts: auth_opts.outbox.max_attempts,
                email_outbox_backoff_base_seconds: auth_opts.outbox.backoff_base_seconds,
                email_outbox_backoff_max_seconds: auth_opts.outbox.backoff_max_seconds,
            }))
        }
    }
}

fn require_dsn(matches: &ArgMatches) -> Result<String> {
    matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")
}

fn require_email(matches: &ArgMatches) -> Result<String> {
    matches
        .get_one::<String>(ARG_EMAIL)
        .cloned()
        .context("missing required argument: --email")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::Action;

    #[test]
    fn jwt_secret_required_for_server() {
        temp_env::with_vars(
            [
                ("SESAMO_JWT_SECRET", None::<&str>),
                ("SESAMO_DSN", Some("postgres://user@localhost:5432/sesamo")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["sesamo"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err
                        .to_string()
                        .contains("missing required argument: --jwt-secret"));
                }
            },
        );
    }

    #[test]
    fn dsn_required_for_server() {
        temp_env::with_vars(
            [
                ("SESAMO_DSN", None::<&str>),
                ("SESAMO_JWT_SECRET", Some("signing-secret")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["sesamo"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("missing required argument: --dsn"));
                }
            },
        );
    }

    #[test]
    fn server_action_collects_auth_options() {
        temp_env::with_vars(
            [
                ("SESAMO_DSN", Some("postgres://user@localhost:5432/sesamo")),
                ("SESAMO_JWT_SECRET", Some("signing-secret")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["sesamo", "--port", "8080"]);
                let action = handler(&matches).expect("server action");
                match action {
                    Action::Server(args) => {
                        assert_eq!(args.port, 8080);
                        assert_eq!(args.token_ttl_seconds, 86_400);
                        assert_eq!(args.reset_token_ttl_seconds, 3600);
                        assert_eq!(args.email_outbox_batch_size, 10);
                    }
                    other => panic!("expected server action, got {other:?}"),
                }
            },
        );
    }

    #[test]
    fn change_password_action_keeps_optional_password() {
        temp_env::with_vars(
            [("SESAMO_DSN", Some("postgres://user@localhost:5432/sesamo"))],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec![
                    "sesamo",
                    "change-password",
                    "--email",
                    "alice@example.com",
                ]);
                let action = handler(&matches).expect("change-password action");
                match action {
                    Action::ChangePassword {
                        email, password, ..
                    } => {
                        assert_eq!(email, "alice@example.com");
                        assert_eq!(password, None);
                    }
                    other => panic!("expected change-password action, got {other:?}"),
                }
            },
        );
    }

    #[test]
    fn report_action_uses_default_output() {
        temp_env::with_vars(
            [("SESAMO_DSN", Some("postgres://user@localhost:5432/sesamo"))],
            || {
                let command = crate::cli::commands::new();
                let matches =
                    command.get_matches_from(vec!["sesamo", "generate-project-report"]);
                let action = handler(&matches).expect("report action");
                match action {
                    Action::Report { output, .. } => {
                        assert_eq!(output, PathBuf::from("project_report.json"));
                    }
                    other => panic!("expected report action, got {other:?}"),
                }
            },
        );
    }
}
