//! Source Feed Reader over the clinic's confirmation view.
//!
//! Rows are first projected into a [`FeedRow`] with every column optional,
//! then validated into an [`AppointmentSnapshot`]. A row that fails
//! validation is dropped with a warning; only query or connectivity
//! failures fail the whole read.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use confirma_core::{
    appointment::{parse_timestamp, AppointmentSnapshot},
    config::{LegacyColumns, LegacyConfig},
    error::ConfirmaError,
    traits::AppointmentFeed,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use crate::pool::bounded;

/// Text copies of the key columns. `NUMERIC` keys have no integer decoding in
/// sqlx, so the query also returns them cast to text.
const SEQUENCE_TEXT: &str = "confirma_sequence_text";
const SCHEDULE_KEY_TEXT: &str = "confirma_schedule_key_text";

/// One raw feed row, tolerant of missing columns and type variations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedRow {
    pub sequence_number: Option<i64>,
    pub schedule_key: Option<i64>,
    pub scheduled_at: Option<NaiveDateTime>,
    pub scheduled_at_fallback: Option<NaiveDateTime>,
    pub patient_name: Option<String>,
    pub phone: Option<String>,
    pub country_code: Option<String>,
    pub physician_name: Option<String>,
}

impl FeedRow {
    /// Project a database row using the configured column names.
    pub fn from_pg_row(row: &PgRow, columns: &LegacyColumns) -> Self {
        Self {
            sequence_number: int_column(row, &columns.sequence_number)
                .or_else(|| int_column(row, SEQUENCE_TEXT)),
            schedule_key: int_column(row, &columns.schedule_key)
                .or_else(|| int_column(row, SCHEDULE_KEY_TEXT)),
            scheduled_at: timestamp_column(row, &columns.scheduled_at),
            scheduled_at_fallback: timestamp_column(row, &columns.scheduled_at_fallback),
            patient_name: text_column(row, &columns.patient_name),
            phone: text_column(row, &columns.phone),
            country_code: text_column(row, &columns.country_code),
            physician_name: text_column(row, &columns.physician_name),
        }
    }

    /// Validate required fields. Only the sequence number is required.
    pub fn into_snapshot(self) -> Result<AppointmentSnapshot, ConfirmaError> {
        let sequence_number = self
            .sequence_number
            .ok_or_else(|| ConfirmaError::Validation("row without sequence number".into()))?;
        if sequence_number <= 0 {
            return Err(ConfirmaError::Validation(format!(
                "non-positive sequence number {sequence_number}"
            )));
        }

        Ok(AppointmentSnapshot {
            sequence_number,
            schedule_key: self.schedule_key,
            scheduled_at: self.scheduled_at.or(self.scheduled_at_fallback),
            patient_name: non_blank(self.patient_name),
            raw_phone: self.phone.unwrap_or_default().trim().to_string(),
            country_code: non_blank(self.country_code),
            physician_name: non_blank(self.physician_name),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn int_column(row: &PgRow, column: &str) -> Option<i64> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(column) {
        return v;
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(column) {
        return v.map(i64::from);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(column) {
        return v.map(i64::from);
    }
    row.try_get::<Option<String>, _>(column)
        .ok()
        .flatten()
        .and_then(|s| parse_int_text(&s))
}

/// Integer from text, accepting a zero fraction as `NUMERIC(p, s)` renders it.
fn parse_int_text(s: &str) -> Option<i64> {
    let s = s.trim();
    let whole = match s.split_once('.') {
        Some((whole, fraction)) if fraction.chars().all(|c| c == '0') => whole,
        Some(_) => return None,
        None => s,
    };
    whole.parse().ok()
}

fn text_column(row: &PgRow, column: &str) -> Option<String> {
    if let Ok(v) = row.try_get::<Option<String>, _>(column) {
        return v;
    }
    int_column(row, column).map(|n| n.to_string())
}

fn timestamp_column(row: &PgRow, column: &str) -> Option<NaiveDateTime> {
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(column) {
        return v;
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(column) {
        return v.map(|ts| ts.with_timezone(&Local).naive_local());
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(column) {
        return v.and_then(|d| d.and_hms_opt(0, 0, 0));
    }
    row.try_get::<Option<String>, _>(column)
        .ok()
        .flatten()
        .and_then(|s| parse_timestamp(&s))
}

/// Every view column plus text copies of the key columns. Identifiers are
/// validated by `Config::validate` before this is built.
pub(crate) fn feed_query(view: &str, columns: &LegacyColumns) -> String {
    format!(
        "SELECT v.*, v.{seq}::text AS {SEQUENCE_TEXT}, v.{key}::text AS {SCHEDULE_KEY_TEXT} \
         FROM {view} v",
        seq = columns.sequence_number,
        key = columns.schedule_key,
    )
}

/// Appointment feed reading the clinic's confirmation view.
pub struct SqlFeed {
    pool: PgPool,
    query: String,
    columns: LegacyColumns,
    timeout: Duration,
}

impl SqlFeed {
    pub fn new(pool: PgPool, config: &LegacyConfig) -> Self {
        Self {
            pool,
            query: feed_query(&config.feed_view, &config.columns),
            columns: config.columns.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl AppointmentFeed for SqlFeed {
    fn name(&self) -> &str {
        "clinic-view"
    }

    async fn fetch_candidates(&self) -> Result<Vec<AppointmentSnapshot>, ConfirmaError> {
        let rows = bounded(
            self.timeout,
            "feed query",
            sqlx::query(&self.query).fetch_all(&self.pool),
            ConfirmaError::FeedUnavailable,
        )
        .await?;

        let total = rows.len();
        let snapshots = collect_valid(rows.iter().map(|r| FeedRow::from_pg_row(r, &self.columns)));
        debug!("feed: {} of {total} rows valid", snapshots.len());
        Ok(snapshots)
    }
}

/// Keep valid rows, dropping the rest with a warning.
pub(crate) fn collect_valid<I>(rows: I) -> Vec<AppointmentSnapshot>
where
    I: IntoIterator<Item = FeedRow>,
{
    rows.into_iter()
        .filter_map(|row| match row.into_snapshot() {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("feed: dropping row: {e}");
                None
            }
        })
        .collect()
}
