//! Reply lookup and recording.

use chrono::NaiveDateTime;
use confirma_core::{
    appointment::{format_timestamp, DedupeRecord, ReplyCode},
    error::ConfirmaError,
    phone,
};

use super::{SendRow, Store, RECORD_COLUMNS};

/// A sequence number counts as unreplied while none of its records carries
/// a reply.
const UNREPLIED_SEQUENCE: &str = "NOT EXISTS (SELECT 1 FROM reminder_sends p \
     WHERE p.sequence_number = r.sequence_number AND p.reply_code IS NOT NULL)";

impl Store {
    /// Most recently sent unreplied record for `phone`, across all kinds.
    pub async fn find_latest_unreplied_by_phone(
        &self,
        phone: &str,
    ) -> Result<Option<DedupeRecord>, ConfirmaError> {
        let digits = phone::normalize(phone);
        if digits.is_empty() {
            return Ok(None);
        }

        let row: Option<SendRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM reminder_sends r \
             WHERE r.phone = ? AND r.replied_at IS NULL AND {UNREPLIED_SEQUENCE} \
             ORDER BY r.sent_at DESC, r.id DESC LIMIT 1"
        ))
        .bind(&digits)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ConfirmaError::Store(format!("phone lookup failed: {e}")))?;

        row.map(DedupeRecord::try_from).transpose()
    }

    /// Distinct sequence numbers with unreplied records for `phone`.
    pub async fn unreplied_sequences_by_phone(
        &self,
        phone: &str,
    ) -> Result<Vec<i64>, ConfirmaError> {
        let digits = phone::normalize(phone);
        if digits.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(i64,)> = sqlx::query_as(&format!(
            "SELECT DISTINCT r.sequence_number FROM reminder_sends r \
             WHERE r.phone = ? AND r.replied_at IS NULL AND {UNREPLIED_SEQUENCE} \
             ORDER BY r.sequence_number"
        ))
        .bind(&digits)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ConfirmaError::Store(format!("phone lookup failed: {e}")))?;

        Ok(rows.into_iter().map(|(seq,)| seq).collect())
    }

    /// Most recent record for a sequence number, replied or not.
    pub async fn latest_for_sequence(
        &self,
        sequence_number: i64,
    ) -> Result<Option<DedupeRecord>, ConfirmaError> {
        let row: Option<SendRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM reminder_sends \
             WHERE sequence_number = ? \
             ORDER BY sent_at DESC, id DESC LIMIT 1"
        ))
        .bind(sequence_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ConfirmaError::Store(format!("sequence lookup failed: {e}")))?;

        row.map(DedupeRecord::try_from).transpose()
    }

    /// Most recent record carrying a legacy schedule key.
    pub async fn latest_for_schedule_key(
        &self,
        schedule_key: i64,
    ) -> Result<Option<DedupeRecord>, ConfirmaError> {
        let row: Option<SendRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM reminder_sends \
             WHERE schedule_key = ? \
             ORDER BY sent_at DESC, id DESC LIMIT 1"
        ))
        .bind(schedule_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ConfirmaError::Store(format!("schedule key lookup failed: {e}")))?;

        row.map(DedupeRecord::try_from).transpose()
    }

    /// Set reply code and time on the most recent record for
    /// `sequence_number`. Returns false when the sequence has no records.
    pub async fn record_reply(
        &self,
        sequence_number: i64,
        code: ReplyCode,
        at: NaiveDateTime,
    ) -> Result<bool, ConfirmaError> {
        let result = sqlx::query(
            "UPDATE reminder_sends SET reply_code = ?, replied_at = ? \
             WHERE id = (SELECT id FROM reminder_sends WHERE sequence_number = ? \
                         ORDER BY sent_at DESC, id DESC LIMIT 1)",
        )
        .bind(code.as_str())
        .bind(format_timestamp(&at))
        .bind(sequence_number)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            ConfirmaError::DedupeWriteFailed(format!("record reply seq={sequence_number}: {e}"))
        })?;

        Ok(result.rows_affected() > 0)
    }
}
