//! Reply audit log: one row per reconcile attempt.

use confirma_core::error::ConfirmaError;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// An entry to write to the reply audit log.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub phone: String,
    pub reply_code: String,
    pub sequence_number: Option<i64>,
    pub schedule_key: Option<i64>,
    pub status: AuditStatus,
    pub detail: Option<String>,
}

/// Status of an audited reconcile attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Ok,
    Partial,
    Error,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Partial => "partial",
            Self::Error => "error",
        }
    }
}

/// Audit row counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditCounts {
    pub ok: i64,
    pub partial: i64,
    pub error: i64,
}

/// Reply audit logger backed by SQLite.
#[derive(Clone)]
pub struct ReplyAudit {
    pool: SqlitePool,
}

impl ReplyAudit {
    /// Create a new audit logger sharing the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write an entry to the audit log.
    pub async fn log(&self, entry: &AuditEntry) -> Result<(), ConfirmaError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO reply_audit \
             (id, phone, reply_code, sequence_number, schedule_key, status, detail) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&entry.phone)
        .bind(&entry.reply_code)
        .bind(entry.sequence_number)
        .bind(entry.schedule_key)
        .bind(entry.status.as_str())
        .bind(&entry.detail)
        .execute(&self.pool)
        .await
        .map_err(|e| ConfirmaError::Store(format!("audit log write failed: {e}")))?;

        debug!(
            "reply audit: phone={} code={} seq={:?} [{}]",
            entry.phone,
            truncate(&entry.reply_code, 16),
            entry.sequence_number,
            entry.status.as_str()
        );

        Ok(())
    }

    /// Number of audit rows with the given status.
    pub async fn count(&self, status: AuditStatus) -> Result<i64, ConfirmaError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reply_audit WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ConfirmaError::Store(format!("audit count failed: {e}")))?;
        Ok(count)
    }

    pub async fn counts(&self) -> Result<AuditCounts, ConfirmaError> {
        Ok(AuditCounts {
            ok: self.count(AuditStatus::Ok).await?,
            partial: self.count(AuditStatus::Partial).await?,
            error: self.count(AuditStatus::Error).await?,
        })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
