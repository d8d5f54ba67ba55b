//! SQLite-backed Dedupe Store.
//!
//! Split into focused submodules:
//! - `sends`: recording sends and the candidate queries built on them
//! - `replies`: reply lookup and recording

mod replies;
mod sends;

pub use sends::{RecordOutcome, StoreStats};

use chrono::NaiveDateTime;
use confirma_core::{
    appointment::{parse_timestamp, DedupeRecord, ReminderKind, ReplyCode},
    config::StoreConfig,
    error::ConfirmaError,
    shellexpand,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Columns selected for every `DedupeRecord` read.
const RECORD_COLUMNS: &str = "id, sequence_number, schedule_key, kind, sent_at, scheduled_at, \
     phone, country_code, patient_name, physician_name, reply_code, replied_at";

/// Durable record of reminders sent and replies received.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the store file, running migrations on first use.
    pub async fn new(config: &StoreConfig) -> Result<Self, ConfirmaError> {
        let db_path = shellexpand(&config.db_path);

        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfirmaError::Store(format!("failed to create data dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| ConfirmaError::Store(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| ConfirmaError::Store(format!("failed to connect to sqlite: {e}")))?;

        let store = Self::from_pool(pool).await?;
        info!("Dedupe store initialized at {db_path}");
        Ok(store)
    }

    /// Wrap an existing pool, applying pending migrations.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, ConfirmaError> {
        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Single-connection in-memory store.
    pub async fn in_memory() -> Result<Self, ConfirmaError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| ConfirmaError::Store(format!("invalid db path: {e}")))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(|e| ConfirmaError::Store(format!("failed to connect to sqlite: {e}")))?;
        Self::from_pool(pool).await
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), ConfirmaError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| ConfirmaError::Store(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] = &[
            ("001_init", include_str!("../../migrations/001_init.sql")),
            (
                "002_unique_send",
                include_str!("../../migrations/002_unique_send.sql"),
            ),
            (
                "003_reply_audit",
                include_str!("../../migrations/003_reply_audit.sql"),
            ),
        ];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        ConfirmaError::Store(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| ConfirmaError::Store(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| {
                    ConfirmaError::Store(format!("failed to record migration {name}: {e}"))
                })?;
            info!("applied migration {name}");
        }
        Ok(())
    }
}

/// Raw `reminder_sends` row, before domain parsing.
#[derive(sqlx::FromRow)]
struct SendRow {
    id: i64,
    sequence_number: i64,
    schedule_key: Option<i64>,
    kind: String,
    sent_at: String,
    scheduled_at: Option<String>,
    phone: String,
    country_code: Option<String>,
    patient_name: Option<String>,
    physician_name: Option<String>,
    reply_code: Option<String>,
    replied_at: Option<String>,
}

impl TryFrom<SendRow> for DedupeRecord {
    type Error = ConfirmaError;

    fn try_from(row: SendRow) -> Result<Self, Self::Error> {
        let kind = ReminderKind::from_str(&row.kind)
            .map_err(|e| ConfirmaError::Store(format!("row {}: {e}", row.id)))?;
        let sent_at = parse_stored(row.id, "sent_at", &row.sent_at)?;
        let scheduled_at = row
            .scheduled_at
            .as_deref()
            .map(|raw| parse_stored(row.id, "scheduled_at", raw))
            .transpose()?;
        let replied_at = row
            .replied_at
            .as_deref()
            .map(|raw| parse_stored(row.id, "replied_at", raw))
            .transpose()?;
        let reply_code = row
            .reply_code
            .as_deref()
            .map(ReplyCode::from_str)
            .transpose()
            .map_err(|e| ConfirmaError::Store(format!("row {}: {e}", row.id)))?;

        Ok(DedupeRecord {
            id: row.id,
            sequence_number: row.sequence_number,
            schedule_key: row.schedule_key,
            kind,
            sent_at,
            scheduled_at,
            phone: row.phone,
            country_code: row.country_code,
            patient_name: row.patient_name,
            physician_name: row.physician_name,
            reply_code,
            replied_at,
        })
    }
}

fn parse_stored(id: i64, column: &str, raw: &str) -> Result<NaiveDateTime, ConfirmaError> {
    parse_timestamp(raw)
        .ok_or_else(|| ConfirmaError::Store(format!("row {id}: bad {column} '{raw}'")))
}

fn into_records(rows: Vec<SendRow>) -> Result<Vec<DedupeRecord>, ConfirmaError> {
    rows.into_iter().map(DedupeRecord::try_from).collect()
}

#[cfg(test)]
mod tests;
