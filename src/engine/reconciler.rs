//! Reply Reconciler.
//!
//! Resolution order for the two identifiers:
//! - sequence number: the event's value; else the store record carrying the
//!   event's schedule key; else, only when the event has neither id, the
//!   latest unreplied record for the phone.
//! - schedule key: the event's value; else the key of the record the
//!   sequence number resolved to.
//!
//! A phone with unreplied records for more than one appointment is
//! ambiguous and is never guessed. The legacy update filters by schedule
//! key only.

use confirma_core::{
    appointment::{ConfirmationOutcome, DedupeRecord, ReplyCode, ReplyEvent},
    error::ConfirmaError,
    phone,
};
use confirma_memory::{AuditEntry, AuditStatus};
use serde::Serialize;
use tracing::{info, warn};

use super::Engine;

/// Where a resolved identifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdSource {
    /// Carried by the reply event.
    Explicit,
    /// Looked up in the Dedupe Store.
    Derived,
}

/// Result of resolving one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Resolution {
    Resolved { value: i64, source: IdSource },
    Unresolved,
}

impl Resolution {
    fn explicit(value: i64) -> Self {
        Self::Resolved {
            value,
            source: IdSource::Explicit,
        }
    }

    fn derived(value: Option<i64>) -> Self {
        match value {
            Some(value) => Self::Resolved {
                value,
                source: IdSource::Derived,
            },
            None => Self::Unresolved,
        }
    }

    pub fn value(&self) -> Option<i64> {
        match self {
            Self::Resolved { value, .. } => Some(*value),
            Self::Unresolved => None,
        }
    }
}

/// Legacy table write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum LegacyOutcome {
    Updated(u64),
    /// Row updated or removed externally; reported, not fatal.
    NoRowsAffected,
    Failed(String),
    /// No schedule key, or no clinic database configured.
    Skipped,
}

/// Dedupe Store reply write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum LocalOutcome {
    Recorded,
    /// No record exists for the sequence number.
    NotFound,
    Failed(String),
    /// No sequence number.
    Skipped,
}

/// Downstream status procedure call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SyncOutcome {
    Synced,
    Failed(String),
    Skipped,
}

/// What one reconcile call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileResult {
    pub phone: String,
    pub reply_code: ReplyCode,
    pub outcome: ConfirmationOutcome,
    pub sequence_number: Resolution,
    pub schedule_key: Resolution,
    pub legacy: LegacyOutcome,
    pub local: LocalOutcome,
    pub sync: SyncOutcome,
}

impl ReconcileResult {
    /// A write that should have happened failed. Sync failures do not count.
    pub fn is_partial_failure(&self) -> bool {
        matches!(self.legacy, LegacyOutcome::Failed(_))
            || matches!(self.local, LocalOutcome::Failed(_))
    }
}

impl Engine {
    /// Fold one patient reply into the legacy table and the Dedupe Store.
    pub async fn reconcile(&self, event: &ReplyEvent) -> Result<ReconcileResult, ConfirmaError> {
        let result = self.reconcile_inner(event).await;

        let entry = match &result {
            Ok(r) => AuditEntry {
                phone: r.phone.clone(),
                reply_code: r.reply_code.to_string(),
                sequence_number: r.sequence_number.value(),
                schedule_key: r.schedule_key.value(),
                status: if r.is_partial_failure() {
                    AuditStatus::Partial
                } else {
                    AuditStatus::Ok
                },
                detail: None,
            },
            Err(e) => AuditEntry {
                phone: phone::normalize(&event.phone),
                reply_code: event.reply_code.clone(),
                sequence_number: event.sequence_number,
                schedule_key: event.schedule_key,
                status: AuditStatus::Error,
                detail: Some(e.to_string()),
            },
        };
        if let Err(e) = self.audit.log(&entry).await {
            warn!("reconcile: audit log failed: {e}");
        }

        result
    }

    async fn reconcile_inner(&self, event: &ReplyEvent) -> Result<ReconcileResult, ConfirmaError> {
        let code: ReplyCode = event.reply_code.parse()?;
        let outcome = code.outcome();
        let phone = self.lookup_phone(event).await?;

        let (sequence_number, schedule_key) = self.resolve(event, &phone).await?;
        if sequence_number == Resolution::Unresolved && schedule_key == Resolution::Unresolved {
            return Err(ConfirmaError::Unresolved(format!(
                "no appointment found for phone {phone}"
            )));
        }

        let now = self.clock.now();

        let legacy = match (schedule_key.value(), &self.agenda) {
            (Some(key), Some(agenda)) => {
                match agenda.update_confirmation(key, outcome, now).await {
                    Ok(0) => {
                        warn!("reconcile: key={key} matched no agenda row");
                        LegacyOutcome::NoRowsAffected
                    }
                    Ok(rows) => LegacyOutcome::Updated(rows),
                    Err(e) => {
                        warn!("reconcile: key={key} legacy update failed: {e}");
                        LegacyOutcome::Failed(e.to_string())
                    }
                }
            }
            (Some(key), None) => {
                warn!("reconcile: key={key} not written, no clinic database configured");
                LegacyOutcome::Skipped
            }
            (None, _) => {
                warn!("reconcile: no schedule key, legacy table not updated");
                LegacyOutcome::Skipped
            }
        };

        let local = match sequence_number.value() {
            Some(seq) => match self.store.record_reply(seq, code, now).await {
                Ok(true) => LocalOutcome::Recorded,
                Ok(false) => LocalOutcome::NotFound,
                Err(e) => {
                    warn!("reconcile: seq={seq} reply not recorded: {e}");
                    LocalOutcome::Failed(e.to_string())
                }
            },
            None => LocalOutcome::Skipped,
        };

        if schedule_key.value().is_none()
            && matches!(local, LocalOutcome::NotFound | LocalOutcome::Skipped)
        {
            return Err(ConfirmaError::Unresolved(format!(
                "no schedule key and no local record for seq={:?}",
                sequence_number.value()
            )));
        }

        let sync = match (&legacy, schedule_key.value(), &self.agenda) {
            (LegacyOutcome::Updated(_), Some(key), Some(agenda)) => {
                match agenda.sync_status(key, outcome).await {
                    Ok(()) => SyncOutcome::Synced,
                    Err(e) => {
                        warn!("reconcile: key={key} status sync failed: {e}");
                        SyncOutcome::Failed(e.to_string())
                    }
                }
            }
            _ => SyncOutcome::Skipped,
        };

        info!(
            "reconcile: phone={phone} code={code} seq={:?} key={:?} legacy={legacy:?} local={local:?}",
            sequence_number.value(),
            schedule_key.value()
        );

        Ok(ReconcileResult {
            phone,
            reply_code: code,
            outcome,
            sequence_number,
            schedule_key,
            legacy,
            local,
            sync,
        })
    }

    /// Phone form used for lookups. Digits as received match numbers recorded
    /// with their own country code; the default-country form covers replies
    /// that arrive without one. The extra query runs only for phone-only replies.
    async fn lookup_phone(&self, event: &ReplyEvent) -> Result<String, ConfirmaError> {
        let with_default = phone::canonical(
            &event.phone,
            None,
            &self.config.gateway.default_country_code,
        );
        if event.sequence_number.is_some() || event.schedule_key.is_some() {
            return Ok(with_default);
        }

        let digits = phone::normalize(&event.phone);
        if digits != with_default
            && !self.store.unreplied_sequences_by_phone(&digits).await?.is_empty()
        {
            return Ok(digits);
        }
        Ok(with_default)
    }

    /// Resolve (sequence number, schedule key) for an event.
    async fn resolve(
        &self,
        event: &ReplyEvent,
        phone: &str,
    ) -> Result<(Resolution, Resolution), ConfirmaError> {
        match (event.sequence_number, event.schedule_key) {
            (Some(seq), Some(key)) => Ok((Resolution::explicit(seq), Resolution::explicit(key))),
            (Some(seq), None) => {
                let record = self.store.latest_for_sequence(seq).await?;
                let key = record.and_then(|r| r.schedule_key);
                Ok((Resolution::explicit(seq), Resolution::derived(key)))
            }
            (None, Some(key)) => {
                let record = self.store.latest_for_schedule_key(key).await?;
                let seq = record.map(|r| r.sequence_number);
                Ok((Resolution::derived(seq), Resolution::explicit(key)))
            }
            (None, None) => {
                let sequences = self.store.unreplied_sequences_by_phone(phone).await?;
                if sequences.len() > 1 {
                    return Err(ConfirmaError::AmbiguousResolution(format!(
                        "phone {phone} has {} unreplied appointments ({}); \
                         reply must carry an identifier",
                        sequences.len(),
                        sequences
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", ")
                    )));
                }
                let record: Option<DedupeRecord> =
                    self.store.find_latest_unreplied_by_phone(phone).await?;
                Ok(match record {
                    Some(r) => (
                        Resolution::derived(Some(r.sequence_number)),
                        Resolution::derived(r.schedule_key),
                    ),
                    None => (Resolution::Unresolved, Resolution::Unresolved),
                })
            }
        }
    }
}
