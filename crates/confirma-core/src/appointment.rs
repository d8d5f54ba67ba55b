//! Appointment, reminder, and reply domain types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfirmaError;

/// Text layout used for every persisted timestamp. Lexicographic order
/// equals chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp for storage.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored or feed timestamp. Accepts `T` or space separators,
/// optional fractional seconds, and a bare date (midnight).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim().trim_end_matches('Z');
    if s.is_empty() {
        return None;
    }
    let s = s.replacen('T', " ", 1);
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Some(ts);
        }
    }
    chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// One row of the source feed, projected for a single poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentSnapshot {
    pub sequence_number: i64,
    /// Key of the legacy schedule row. Absent means no legacy write is possible.
    pub schedule_key: Option<i64>,
    pub scheduled_at: Option<NaiveDateTime>,
    pub patient_name: Option<String>,
    pub raw_phone: String,
    pub country_code: Option<String>,
    pub physician_name: Option<String>,
}

/// Stage in the reminder escalation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderKind {
    FirstNotice,
    #[serde(rename = "REMINDER_48H")]
    Reminder48h,
    #[serde(rename = "REMINDER_12H")]
    Reminder12h,
    /// Marker written when an appointment passed without any reply.
    NoResponse,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 4] = [
        Self::FirstNotice,
        Self::Reminder48h,
        Self::Reminder12h,
        Self::NoResponse,
    ];

    /// Code persisted in the Dedupe Store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstNotice => "FIRST_NOTICE",
            Self::Reminder48h => "REMINDER_48H",
            Self::Reminder12h => "REMINDER_12H",
            Self::NoResponse => "NO_RESPONSE",
        }
    }

    /// Whether a message goes out for this kind.
    pub fn sends_message(&self) -> bool {
        !matches!(self, Self::NoResponse)
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReminderKind {
    type Err = ConfirmaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfirmaError::Validation(format!("unknown reminder kind '{s}'")))
    }
}

/// Reminder window an appointment currently falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderWindow {
    None,
    FirstNotice,
    #[serde(rename = "REMINDER_48H")]
    Reminder48h,
    #[serde(rename = "REMINDER_12H")]
    Reminder12h,
    Expired,
}

impl ReminderWindow {
    /// The reminder kind sent in this window, if any.
    pub fn reminder_kind(&self) -> Option<ReminderKind> {
        match self {
            Self::FirstNotice => Some(ReminderKind::FirstNotice),
            Self::Reminder48h => Some(ReminderKind::Reminder48h),
            Self::Reminder12h => Some(ReminderKind::Reminder12h),
            Self::None | Self::Expired => None,
        }
    }
}

/// Patient reply: `"1"` confirms, `"0"` cancels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplyCode {
    #[serde(rename = "1")]
    Confirm,
    #[serde(rename = "0")]
    Cancel,
}

impl ReplyCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "1",
            Self::Cancel => "0",
        }
    }

    /// Business outcome this reply proposes.
    pub fn outcome(&self) -> ConfirmationOutcome {
        match self {
            Self::Confirm => ConfirmationOutcome::Confirmed,
            Self::Cancel => ConfirmationOutcome::Cancelled,
        }
    }
}

impl FromStr for ReplyCode {
    type Err = ConfirmaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Self::Confirm),
            "0" => Ok(Self::Cancel),
            other => Err(ConfirmaError::Validation(format!(
                "invalid reply code '{other}', expected '1' or '0'"
            ))),
        }
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business state of an appointment. Owned by the legacy table; the core
/// only proposes transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfirmationOutcome {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl ConfirmationOutcome {
    /// Text written to the legacy confirmation column.
    pub fn legacy_text(&self) -> &'static str {
        match self {
            Self::Pending => "Pendente",
            Self::Confirmed => "Confirmado",
            Self::Cancelled => "Cancelado",
            Self::Expired => "Sem resposta",
        }
    }

    /// Status code passed to the legacy sync procedure.
    pub fn sync_code(&self) -> &'static str {
        match self {
            Self::Pending => "PENDENTE",
            Self::Confirmed => "CONFIRMADO",
            Self::Cancelled => "CANCELADO",
            Self::Expired => "SEM_RESPOSTA",
        }
    }
}

/// A persisted reminder send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DedupeRecord {
    pub id: i64,
    pub sequence_number: i64,
    pub schedule_key: Option<i64>,
    pub kind: ReminderKind,
    pub sent_at: NaiveDateTime,
    pub scheduled_at: Option<NaiveDateTime>,
    /// Phone as sent, digits only with country code.
    pub phone: String,
    pub country_code: Option<String>,
    pub patient_name: Option<String>,
    pub physician_name: Option<String>,
    pub reply_code: Option<ReplyCode>,
    pub replied_at: Option<NaiveDateTime>,
}

/// A send about to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDedupeRecord {
    pub sequence_number: i64,
    pub schedule_key: Option<i64>,
    pub kind: ReminderKind,
    pub sent_at: NaiveDateTime,
    pub scheduled_at: Option<NaiveDateTime>,
    pub phone: String,
    pub country_code: Option<String>,
    pub patient_name: Option<String>,
    pub physician_name: Option<String>,
}

/// Inbound patient reply, already decoded from the webhook body.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyEvent {
    pub phone: String,
    /// Raw reply code as received; validated by the reconciler.
    pub reply_code: String,
    pub sequence_number: Option<i64>,
    pub schedule_key: Option<i64>,
}
