//! Project metadata report: data model and route inventory as JSON.

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::{fs, path::Path};
use utoipa::OpenApi;

use crate::api::ApiDoc;

const REPORTED_TABLES: [&str; 3] = ["users", "account_tokens", "email_outbox"];

/// Write the metadata report, closing the pool on every exit path.
///
/// # Errors
/// Returns an error if the database is unreachable or the file cannot be
/// written.
pub async fn execute(dsn: &str, output: &Path) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;
    let result = generate(&pool, output).await;
    pool.close().await;
    result
}

async fn generate(pool: &PgPool, output: &Path) -> Result<()> {
    let report = json!({
        "models": collect_models(pool).await?,
        "routes": collect_routes(),
        "generatedAt": database_timestamp(pool).await?,
    });

    let rendered =
        serde_json::to_string_pretty(&report).context("failed to serialize project report")?;
    fs::write(output, rendered)
        .with_context(|| format!("failed to write report to {}", output.display()))?;

    println!(
        "Project report generated successfully: {}",
        output.display()
    );

    Ok(())
}

/// Column inventory per table, read from `information_schema`.
async fn collect_models(pool: &PgPool) -> Result<Value> {
    let query = r"
        SELECT table_name, column_name, data_type, is_nullable, column_default
        FROM information_schema.columns
        WHERE table_schema = 'public'
          AND table_name = ANY($1)
        ORDER BY table_name, ordinal_position
    ";
    let rows = sqlx::query(query)
        .bind(&REPORTED_TABLES[..])
        .fetch_all(pool)
        .await
        .context("failed to read column inventory")?;

    let mut models = Map::new();
    for row in rows {
        let table: String = row.get("table_name");
        let column: String = row.get("column_name");
        let data_type: String = row.get("data_type");
        let is_nullable: String = row.get("is_nullable");
        let column_default: Option<String> = row.get("column_default");

        let columns = models
            .entry(table)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(columns) = columns {
            columns.insert(
                column,
                json!({
                    "type": data_type,
                    "nullable": is_nullable == "YES",
                    "default": column_default,
                }),
            );
        }
    }

    Ok(Value::Object(models))
}

/// Route inventory, derived from the OpenAPI document.
fn collect_routes() -> Vec<String> {
    let openapi = ApiDoc::openapi();
    let mut routes = Vec::new();

    for (path, item) in &openapi.paths.paths {
        let methods = [
            ("GET", item.get.is_some()),
            ("POST", item.post.is_some()),
            ("PUT", item.put.is_some()),
            ("PATCH", item.patch.is_some()),
            ("DELETE", item.delete.is_some()),
        ];
        for (method, registered) in methods {
            if registered {
                routes.push(format!("{method} {path}"));
            }
        }
    }

    routes.sort();
    routes
}

/// Report timestamp, clocked by the database.
async fn database_timestamp(pool: &PgPool) -> Result<String> {
    let query = r#"
        SELECT to_char(NOW() AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS generated_at
    "#;
    let row = sqlx::query(query)
        .fetch_one(pool)
        .await
        .context("failed to read database timestamp")?;
    Ok(row.get("generated_at"))
}
