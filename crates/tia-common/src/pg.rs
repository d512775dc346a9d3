//! PostgreSQL-backed queue and status store.
//!
//! Every operation is a single statement, so concurrent workers never need
//! more than row-level atomicity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::error::{Result, TiaError};
use crate::queue::EventQueue;
use crate::settings::StoreSettings;
use crate::status::{DocumentStatus, StatusStore, PROCESSING_STATUS_PREFIX};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS event_queue (
        id       BIGSERIAL PRIMARY KEY,
        queue    TEXT NOT NULL,
        payload  TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_event_queue_queue ON event_queue(queue)",
    r#"
    CREATE TABLE IF NOT EXISTS document_status (
        id                  TEXT PRIMARY KEY,
        download_timestamp  TIMESTAMPTZ,
        completed           BOOLEAN NOT NULL DEFAULT FALSE,
        retry_count         INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS document_processing_status (
        id     TEXT PRIMARY KEY,
        value  TEXT NOT NULL
    )
    "#,
];

/// Open a pool and make sure the tables exist.
pub async fn connect(settings: &StoreSettings) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await
        .map_err(|e| TiaError::Store(format!("cannot connect to status store: {e}")))?;
    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("store schema ready");
    Ok(())
}

// ── Queue ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgQueue {
    pool: PgPool,
    name: String,
}

impl PgQueue {
    pub fn new(pool: PgPool, name: impl Into<String>) -> Self {
        Self { pool, name: name.into() }
    }
}

fn queue_err(name: &str, e: sqlx::Error) -> TiaError {
    TiaError::Queue(format!("queue \"{name}\": {e}"))
}

#[async_trait]
impl EventQueue for PgQueue {
    fn name(&self) -> &str { &self.name }

    async fn push(&self, payload: &str) -> Result<()> {
        sqlx::query("INSERT INTO event_queue (queue, payload) VALUES ($1, $2)")
            .bind(&self.name)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(|e| queue_err(&self.name, e))?;
        Ok(())
    }

    async fn pop(&self) -> Result<Option<String>> {
        sqlx::query_scalar(
            r#"
            DELETE FROM event_queue
            WHERE id = (
                SELECT id FROM event_queue
                WHERE queue = $1
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING payload
            "#,
        )
        .bind(&self.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| queue_err(&self.name, e))
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_queue WHERE queue = $1")
            .bind(&self.name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| queue_err(&self.name, e))?;
        Ok(count as usize)
    }
}

// ── Status store ─────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgStatusStore {
    pool: PgPool,
}

type StatusRow = (String, Option<DateTime<Utc>>, bool, i32);

fn from_row((id, download_timestamp, completed, retry_count): StatusRow) -> DocumentStatus {
    DocumentStatus { id, download_timestamp, completed, retry_count }
}

impl PgStatusStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn get(&self, id: &str) -> Result<Option<DocumentStatus>> {
        let row: Option<StatusRow> = sqlx::query_as(
            "SELECT id, download_timestamp, completed, retry_count FROM document_status WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    async fn put(&self, status: &DocumentStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO document_status (id, download_timestamp, completed, retry_count)
            VALUES ($1, $2, $3, GREATEST($4, 0))
            ON CONFLICT (id) DO UPDATE SET
                download_timestamp = COALESCE(EXCLUDED.download_timestamp, document_status.download_timestamp),
                completed          = document_status.completed OR EXCLUDED.completed,
                retry_count        = LEAST(document_status.retry_count, EXCLUDED.retry_count)
            "#,
        )
        .bind(&status.id)
        .bind(status.download_timestamp)
        .bind(status.completed)
        .bind(status.retry_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DocumentStatus>> {
        let rows: Vec<StatusRow> = sqlx::query_as(
            "SELECT id, download_timestamp, completed, retry_count FROM document_status ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn reset_retries(&self, max_retry: i32) -> Result<usize> {
        let done = sqlx::query(
            "UPDATE document_status SET retry_count = $1 WHERE NOT completed AND retry_count <= 0",
        )
        .bind(max_retry)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() as usize)
    }

    async fn set_processing_status(&self, event_id: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO document_processing_status (id, value) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(format!("{PROCESSING_STATUS_PREFIX}{event_id}"))
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn processing_status(&self, event_id: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM document_processing_status WHERE id = $1")
            .bind(format!("{PROCESSING_STATUS_PREFIX}{event_id}"))
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }
}
