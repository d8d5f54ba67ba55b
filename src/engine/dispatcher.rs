//! Reminder Dispatcher: sends one reminder kind to a batch of candidates.

use std::fmt;

use chrono::NaiveDateTime;
use confirma_core::{
    appointment::{AppointmentSnapshot, DedupeRecord, NewDedupeRecord, ReminderKind},
    error::ConfirmaError,
    phone,
    traits::ContactId,
};
use confirma_memory::RecordOutcome;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::templates;
use super::Engine;

/// Appointment fields needed to send and record one reminder. Built from a
/// feed snapshot or, for the 12h pass, from a stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub sequence_number: i64,
    pub schedule_key: Option<i64>,
    pub scheduled_at: Option<NaiveDateTime>,
    pub patient_name: Option<String>,
    pub phone: String,
    pub country_code: Option<String>,
    pub physician_name: Option<String>,
}

impl From<&AppointmentSnapshot> for Candidate {
    fn from(s: &AppointmentSnapshot) -> Self {
        Self {
            sequence_number: s.sequence_number,
            schedule_key: s.schedule_key,
            scheduled_at: s.scheduled_at,
            patient_name: s.patient_name.clone(),
            phone: s.raw_phone.clone(),
            country_code: s.country_code.clone(),
            physician_name: s.physician_name.clone(),
        }
    }
}

impl From<&DedupeRecord> for Candidate {
    fn from(r: &DedupeRecord) -> Self {
        Self {
            sequence_number: r.sequence_number,
            schedule_key: r.schedule_key,
            scheduled_at: r.scheduled_at,
            patient_name: r.patient_name.clone(),
            phone: r.phone.clone(),
            country_code: r.country_code.clone(),
            physician_name: r.physician_name.clone(),
        }
    }
}

/// Counts for one dispatch call. `attempted` counts every candidate
/// considered; each ends up in exactly one of `sent`, `skipped`, `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub kind: ReminderKind,
    pub attempted: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Sent but not recorded: may be re-sent next cycle.
    pub unrecorded: usize,
}

impl DispatchReport {
    fn new(kind: ReminderKind) -> Self {
        Self {
            kind,
            attempted: 0,
            sent: 0,
            skipped: 0,
            failed: 0,
            unrecorded: 0,
        }
    }
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempted={} sent={} skipped={} failed={}",
            self.kind, self.attempted, self.sent, self.skipped, self.failed
        )?;
        if self.unrecorded > 0 {
            write!(f, " unrecorded={}", self.unrecorded)?;
        }
        Ok(())
    }
}

/// Patient name split into gateway first/last name.
fn split_name(name: Option<&str>) -> (String, String) {
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    match name {
        Some(n) => match n.split_once(' ') {
            Some((first, last)) => (first.to_string(), last.trim().to_string()),
            None => (n.to_string(), String::new()),
        },
        None => (templates::DEFAULT_PATIENT.to_string(), String::new()),
    }
}

impl Engine {
    /// Send `kind` to each candidate not yet sent, soonest appointment first.
    ///
    /// Per-candidate failures are counted and never stop the batch. A store
    /// read failure aborts the batch, since sending blind could duplicate.
    pub async fn dispatch(
        &self,
        kind: ReminderKind,
        mut candidates: Vec<Candidate>,
    ) -> Result<DispatchReport, ConfirmaError> {
        let mut report = DispatchReport::new(kind);
        let Some(template) = self.config.templates.for_kind(kind) else {
            return Err(ConfirmaError::Validation(format!(
                "{kind} is a marker kind and cannot be dispatched"
            )));
        };

        // Missing times sort last.
        candidates.sort_by_key(|c| (c.scheduled_at.is_none(), c.scheduled_at));

        for candidate in &candidates {
            report.attempted += 1;
            let seq = candidate.sequence_number;

            if self.store.already_sent(seq, kind).await? {
                debug!("dispatch: seq={seq} kind={kind} already sent");
                report.skipped += 1;
                continue;
            }

            let phone = phone::canonical(
                &candidate.phone,
                candidate.country_code.as_deref(),
                &self.config.gateway.default_country_code,
            );
            if phone.is_empty() {
                warn!("dispatch: seq={seq} kind={kind} skipped: no phone");
                report.skipped += 1;
                continue;
            }

            let text = templates::render(template, candidate, &self.config.clinic);
            if let Err(e) = self.deliver(candidate, &phone, &text).await {
                warn!("dispatch: seq={seq} kind={kind} send failed: {e}");
                report.failed += 1;
                continue;
            }
            report.sent += 1;

            let record = NewDedupeRecord {
                sequence_number: seq,
                schedule_key: candidate.schedule_key,
                kind,
                sent_at: self.clock.now(),
                scheduled_at: candidate.scheduled_at,
                phone,
                country_code: candidate.country_code.clone(),
                patient_name: candidate.patient_name.clone(),
                physician_name: candidate.physician_name.clone(),
            };
            match self.store.record_send(&record).await {
                Ok(RecordOutcome::Inserted(_)) => {
                    info!("dispatch: seq={seq} kind={kind} sent");
                }
                Ok(RecordOutcome::AlreadySent) => {
                    warn!("dispatch: seq={seq} kind={kind} was also sent by a concurrent run");
                }
                Err(e) => {
                    warn!(
                        "dispatch: seq={seq} kind={kind} sent but not recorded, \
                         may be re-sent next cycle: {e}"
                    );
                    report.unrecorded += 1;
                }
            }
        }

        info!("dispatch: {report}");
        Ok(report)
    }

    /// Find or create the contact, tag it with the appointment ids, send the
    /// text, then start the follow-up flow. Only the lookup, creation and the
    /// text send can fail the delivery.
    async fn deliver(
        &self,
        candidate: &Candidate,
        phone: &str,
        text: &str,
    ) -> Result<ContactId, ConfirmaError> {
        let gateway = &self.config.gateway;
        let messenger = &self.messenger;

        let contact = match messenger.find_contact(phone).await? {
            Some(id) => id,
            None => {
                let (first, last) = split_name(candidate.patient_name.as_deref());
                let id = messenger.create_contact(phone, &first, &last).await?;
                debug!("dispatch: created contact {id} for seq={}", candidate.sequence_number);
                if let Some(tag) = gateway.contact_tag_id {
                    if let Err(e) = messenger.add_tag(id, tag).await {
                        warn!("dispatch: tag {tag} on contact {id} failed: {e}");
                    }
                }
                if let Some(field) = gateway.contact_id_field_id {
                    if let Err(e) = messenger.set_custom_field(id, field, &id.to_string()).await {
                        warn!("dispatch: contact-id field on {id} failed: {e}");
                    }
                }
                id
            }
        };

        let fields = [
            (gateway.sequence_field_id, Some(candidate.sequence_number)),
            (gateway.schedule_key_field_id, candidate.schedule_key),
        ];
        for (field, value) in fields {
            if let (Some(field), Some(value)) = (field, value) {
                if let Err(e) = messenger
                    .set_custom_field(contact, field, &value.to_string())
                    .await
                {
                    warn!("dispatch: field {field} on contact {contact} failed: {e}");
                }
            }
        }

        messenger.send_message(contact, text).await?;

        if let Some(flow) = gateway.flow_id {
            if let Err(e) = messenger.send_flow(contact, Some(flow)).await {
                warn!("dispatch: flow {flow} for contact {contact} failed: {e}");
            }
        }
        Ok(contact)
    }
}
