//! DB-backed email outbox and its delivery worker.
//!
//! Request handlers never talk to a mail transport. They insert a row into
//! `email_outbox` inside their own transaction; this worker polls for pending
//! rows, hands them to an [`EmailSender`], and retries failures with
//! exponential backoff until `max_attempts` is reached.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

/// Delivery seam. Deployments plug an SMTP (or API) transport in here.
pub trait EmailSender: Send + Sync {
    /// Deliver one message.
    ///
    /// # Errors
    /// Returns an error when delivery fails; the worker reschedules the row.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Logs outbound messages instead of delivering them.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            payload = %message.payload_json,
            "email outbox send"
        );
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EmailWorkerConfig {
    poll_interval_seconds: u64,
    batch_size: usize,
    max_attempts: u32,
    backoff_base_seconds: u64,
    backoff_max_seconds: u64,
}

impl EmailWorkerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval_seconds: 5,
            batch_size: 10,
            max_attempts: 5,
            backoff_base_seconds: 5,
            backoff_max_seconds: 300,
        }
    }

    #[must_use]
    pub fn with_poll_interval_seconds(mut self, seconds: u64) -> Self {
        self.poll_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_base_seconds(mut self, seconds: u64) -> Self {
        self.backoff_base_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_backoff_max_seconds(mut self, seconds: u64) -> Self {
        self.backoff_max_seconds = seconds;
        self
    }
}

impl Default for EmailWorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Delay before retrying a row that has already failed `attempts` times.
fn backoff_seconds(attempts: u32, config: &EmailWorkerConfig) -> u64 {
    let shift = attempts.min(16);
    config
        .backoff_base_seconds
        .saturating_mul(1_u64 << shift)
        .min(config.backoff_max_seconds)
}

pub fn spawn_outbox_worker(
    pool: PgPool,
    sender: Arc<dyn EmailSender>,
    config: EmailWorkerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let poll_interval = Duration::from_secs(config.poll_interval_seconds.max(1));

        loop {
            let batch_result = process_outbox_batch(&pool, sender.as_ref(), &config).await;
            if let Err(err) = batch_result {
                error!("email outbox batch failed: {err}");
            }

            sleep(poll_interval).await;
        }
    })
}

async fn process_outbox_batch(
    pool: &PgPool,
    sender: &dyn EmailSender,
    config: &EmailWorkerConfig,
) -> Result<usize> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to start email outbox transaction")?;

    let query = r"
        SELECT id, to_email, template, payload_json::text AS payload_json, attempts
        FROM email_outbox
        WHERE status = 'pending'
          AND next_attempt_at <= NOW()
        ORDER BY created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(i64::try_from(config.batch_size).unwrap_or(0))
        .fetch_all(&mut *tx)
        .instrument(span)
        .await
        .context("failed to load email outbox batch")?;

    if rows.is_empty() {
        tx.commit()
            .await
            .context("failed to commit empty outbox batch")?;
        return Ok(0);
    }

    let row_count = rows.len();
    for row in rows {
        let id: Uuid = row.get("id");
        let attempts: i32 = row.get("attempts");
        let message = EmailMessage {
            to_email: row.get("to_email"),
            template: row.get("template"),
            payload_json: row.get("payload_json"),
        };

        let send_result = sender.send(&message);
        let attempts = u32::try_from(attempts).unwrap_or(0);
        finish_outbox_row(&mut tx, id, attempts, send_result, config).await?;
    }

    tx.commit()
        .await
        .context("failed to commit email outbox batch")?;

    Ok(row_count)
}

async fn finish_outbox_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    attempts: u32,
    send_result: Result<()>,
    config: &EmailWorkerConfig,
) -> Result<()> {
    match send_result {
        Ok(()) => {
            let query = r"
                UPDATE email_outbox
                SET status = 'sent',
                    attempts = attempts + 1,
                    last_error = NULL,
                    sent_at = NOW()
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to update outbox status to sent")?;
        }
        Err(err) => {
            if attempts + 1 >= config.max_attempts {
                let query = r"
                    UPDATE email_outbox
                    SET status = 'failed',
                        attempts = attempts + 1,
                        last_error = $2
                    WHERE id = $1
                ";
                let span = info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(id)
                    .bind(err.to_string())
                    .execute(&mut **tx)
                    .instrument(span)
                    .await
                    .context("failed to update outbox status to failed")?;
            } else {
                let query = r"
                    UPDATE email_outbox
                    SET attempts = attempts + 1,
                        last_error = $2,
                        next_attempt_at = NOW() + ($3 * INTERVAL '1 second')
                    WHERE id = $1
                ";
                let span = info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(id)
                    .bind(err.to_string())
                    .bind(i64::try_from(backoff_seconds(attempts, config)).unwrap_or(i64::MAX))
                    .execute(&mut **tx)
                    .instrument(span)
                    .await
                    .context("failed to reschedule outbox row")?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sender_accepts_messages() {
        let message = EmailMessage {
            to_email: "alice@example.com".to_string(),
            template: "verify_email".to_string(),
            payload_json: "{}".to_string(),
        };
        assert!(LogEmailSender.send(&message).is_ok());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = EmailWorkerConfig::new()
            .with_backoff_base_seconds(5)
            .with_backoff_max_seconds(300);
        assert_eq!(backoff_seconds(0, &config), 5);
        assert_eq!(backoff_seconds(1, &config), 10);
        assert_eq!(backoff_seconds(2, &config), 20);
        assert_eq!(backoff_seconds(10, &config), 300);
        assert_eq!(backoff_seconds(u32::MAX, &config), 300);
    }

    #[test]
    fn worker_config_defaults() {
        let config = EmailWorkerConfig::default();
        assert_eq!(config.poll_interval_seconds, 5);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_attempts, 5);
    }
}
