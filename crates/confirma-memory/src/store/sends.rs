//! Reminder send records and the candidate queries derived from them.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};
use confirma_core::{
    appointment::{format_timestamp, DedupeRecord, NewDedupeRecord, ReminderKind},
    error::ConfirmaError,
    phone,
};
use serde::Serialize;

use super::{into_records, SendRow, Store, RECORD_COLUMNS};

/// Result of `record_send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// New record written with this id.
    Inserted(i64),
    /// A concurrent run already recorded this (sequence, kind).
    AlreadySent,
}

/// Counts for the status surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: i64,
    pub by_kind: BTreeMap<String, i64>,
    pub replied: i64,
}

impl Store {
    /// Whether a reminder of `kind` was already sent for `sequence_number`.
    pub async fn already_sent(
        &self,
        sequence_number: i64,
        kind: ReminderKind,
    ) -> Result<bool, ConfirmaError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM reminder_sends \
             WHERE sequence_number = ? AND kind = ? AND sent_at IS NOT NULL \
             LIMIT 1",
        )
        .bind(sequence_number)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ConfirmaError::Store(format!("already_sent check failed: {e}")))?;

        Ok(row.is_some())
    }

    /// Append a send record. The unique index on (sequence_number, kind)
    /// turns a lost race into `AlreadySent` instead of a second row.
    pub async fn record_send(
        &self,
        record: &NewDedupeRecord,
    ) -> Result<RecordOutcome, ConfirmaError> {
        let result = sqlx::query(
            "INSERT INTO reminder_sends \
             (sequence_number, schedule_key, kind, sent_at, scheduled_at, phone, \
              country_code, patient_name, physician_name) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.sequence_number)
        .bind(record.schedule_key)
        .bind(record.kind.as_str())
        .bind(format_timestamp(&record.sent_at))
        .bind(record.scheduled_at.as_ref().map(format_timestamp))
        .bind(phone::normalize(&record.phone))
        .bind(&record.country_code)
        .bind(&record.patient_name)
        .bind(&record.physician_name)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(RecordOutcome::Inserted(done.last_insert_rowid())),
            Err(e)
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation()) =>
            {
                tracing::info!(
                    "send already recorded: seq={} kind={}",
                    record.sequence_number,
                    record.kind
                );
                Ok(RecordOutcome::AlreadySent)
            }
            Err(e) => Err(ConfirmaError::DedupeWriteFailed(format!(
                "seq={} kind={}: {e}",
                record.sequence_number, record.kind
            ))),
        }
    }

    /// 48h records whose appointment now falls inside the 12h window and
    /// that have no 12h record yet, soonest first.
    pub async fn due_for_12h(
        &self,
        now: NaiveDateTime,
        window_hours: u32,
    ) -> Result<Vec<DedupeRecord>, ConfirmaError> {
        let until = now + Duration::hours(i64::from(window_hours));
        let rows: Vec<SendRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM reminder_sends r \
             WHERE r.kind = ? AND r.scheduled_at IS NOT NULL \
             AND r.scheduled_at >= ? AND r.scheduled_at <= ? \
             AND NOT EXISTS (SELECT 1 FROM reminder_sends t \
                             WHERE t.sequence_number = r.sequence_number AND t.kind = ?) \
             ORDER BY r.scheduled_at ASC, r.id ASC"
        ))
        .bind(ReminderKind::Reminder48h.as_str())
        .bind(format_timestamp(&now))
        .bind(format_timestamp(&until))
        .bind(ReminderKind::Reminder12h.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ConfirmaError::Store(format!("due_for_12h query failed: {e}")))?;

        into_records(rows)
    }

    /// Appointments that passed with no reply on any record and no
    /// no-response marker yet. One record (the latest) per sequence number.
    pub async fn due_for_expiry(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<DedupeRecord>, ConfirmaError> {
        let rows: Vec<SendRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM reminder_sends r \
             WHERE r.id = (SELECT x.id FROM reminder_sends x \
                           WHERE x.sequence_number = r.sequence_number \
                           ORDER BY x.sent_at DESC, x.id DESC LIMIT 1) \
             AND r.scheduled_at IS NOT NULL AND r.scheduled_at <= ? \
             AND NOT EXISTS (SELECT 1 FROM reminder_sends p \
                             WHERE p.sequence_number = r.sequence_number \
                             AND (p.reply_code IS NOT NULL OR p.kind = ?)) \
             ORDER BY r.scheduled_at ASC, r.id ASC"
        ))
        .bind(format_timestamp(&now))
        .bind(ReminderKind::NoResponse.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ConfirmaError::Store(format!("due_for_expiry query failed: {e}")))?;

        into_records(rows)
    }

    /// Per-kind record counts and number of replied records.
    pub async fn stats(&self) -> Result<StoreStats, ConfirmaError> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT kind, COUNT(*), COALESCE(SUM(reply_code IS NOT NULL), 0) \
             FROM reminder_sends GROUP BY kind ORDER BY kind",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ConfirmaError::Store(format!("stats query failed: {e}")))?;

        let mut stats = StoreStats::default();
        for (kind, count, replied) in rows {
            stats.total += count;
            stats.replied += replied;
            stats.by_kind.insert(kind, count);
        }
        Ok(stats)
    }
}
