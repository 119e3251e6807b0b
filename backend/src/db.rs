use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions};

use crate::{error::AppError, models::events::ResultRow, search::time_range};

pub fn init_pool(database_url: &str) -> Result<PgPool, AppError> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect_lazy(database_url)
        .map_err(AppError::Database)
}

pub async fn prepare_schema(pool: &PgPool, reset: bool) -> Result<(), AppError> {
    if reset {
        reset_schema(pool).await?;
    }
    create_schema(pool).await
}

async fn reset_schema(pool: &PgPool) -> Result<(), AppError> {
    sqlx::query("DROP TABLE IF EXISTS wazuh_logs")
        .execute(pool)
        .await
        .map_err(AppError::Database)?;
    Ok(())
}

async fn create_schema(pool: &PgPool) -> Result<(), AppError> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS wazuh_logs (
            id TEXT PRIMARY KEY,
            timestamp TIMESTAMPTZ,
            agent_name TEXT,
            username TEXT,
            syscheck_path TEXT,
            syscheck_event TEXT,
            rule_description TEXT,
            rule_level INTEGER,
            rule_id TEXT,
            file_diff TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_wazuh_logs_timestamp ON wazuh_logs (timestamp DESC)",
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StoredEvent {
    pub id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub agent_name: Option<String>,
    pub username: Option<String>,
    pub syscheck_path: Option<String>,
    pub syscheck_event: Option<String>,
    pub rule_description: Option<String>,
    pub rule_level: Option<i32>,
    pub rule_id: Option<String>,
    pub file_diff: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Inserts a FIM row unless one with the same document id exists. Returns
/// whether a row was written.
pub async fn save_fim_row(pool: &PgPool, row: &ResultRow) -> Result<bool, AppError> {
    let (Some(id), Some(fim)) = (row.id.as_deref(), row.fim()) else {
        return Ok(false);
    };
    let timestamp = row.timestamp.as_deref().and_then(time_range::normalize);
    let rule_level = row.level().and_then(|level| i32::try_from(level).ok());

    let result = sqlx::query(
        r#"
        INSERT INTO wazuh_logs (
            id, timestamp, agent_name, username, syscheck_path, syscheck_event,
            rule_description, rule_level, rule_id, file_diff
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(id)
    .bind(timestamp)
    .bind(&row.agent_name)
    .bind(&fim.username)
    .bind(&fim.syscheck_path)
    .bind(&fim.syscheck_event)
    .bind(&row.rule_description)
    .bind(rule_level)
    .bind(row.rule_id_text())
    .bind(&fim.file_diff)
    .execute(pool)
    .await
    .map_err(AppError::Database)?;

    Ok(result.rows_affected() > 0)
}

pub async fn history(pool: &PgPool, limit: i64) -> Result<Vec<StoredEvent>, AppError> {
    sqlx::query_as::<_, StoredEvent>(
        r#"
        SELECT id, timestamp, agent_name, username, syscheck_path, syscheck_event,
               rule_description, rule_level, rule_id, file_diff, created_at
        FROM wazuh_logs
        ORDER BY timestamp DESC NULLS LAST
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(AppError::Database)
}
