//! Reminder engine: the three scheduled passes and reply reconciliation.
//!
//! Split into focused submodules:
//! - `dispatcher`: one reminder kind over a batch of candidates
//! - `reconciler`: folding a patient reply into the legacy table and the store
//! - `templates`: message rendering

mod dispatcher;
mod reconciler;
mod templates;


pub use dispatcher::{Candidate, DispatchReport};
pub use reconciler::{
    IdSource, LegacyOutcome, LocalOutcome, ReconcileResult, Resolution, SyncOutcome,
};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDateTime;
use confirma_core::{
    appointment::{ConfirmationOutcome, NewDedupeRecord, ReminderKind, ReminderWindow},
    config::Config,
    error::ConfirmaError,
    traits::{AppointmentFeed, Clock, LegacyAgenda, Messenger, SystemClock},
    window,
};
use confirma_memory::{RecordOutcome, ReplyAudit, Store};
use serde::Serialize;
use tracing::{info, warn};

/// Scheduled job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// First notice and 48h reminders from the source feed.
    Feed,
    /// 12h reminders from the Dedupe Store.
    Followup,
    /// No-response marking for appointments that passed unanswered.
    Expiry,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [Self::Feed, Self::Followup, Self::Expiry];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::Followup => "followup",
            Self::Expiry => "expiry",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = ConfirmaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ConfirmaError::Validation(format!(
                    "unknown job '{s}', expected feed, followup or expiry"
                ))
            })
    }
}

/// Outcome of the expiry pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpiryReport {
    pub candidates: usize,
    pub marked: usize,
    pub already_marked: usize,
    pub legacy_updated: usize,
    pub failed: usize,
}

/// What one job run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "job", rename_all = "lowercase")]
pub enum PassReport {
    Feed { reports: Vec<DispatchReport> },
    Followup { report: DispatchReport },
    Expiry { report: ExpiryReport },
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feed { reports } => {
                let parts: Vec<String> = reports.iter().map(ToString::to_string).collect();
                if parts.is_empty() {
                    f.write_str("feed: nothing due")
                } else {
                    write!(f, "feed: {}", parts.join("; "))
                }
            }
            Self::Followup { report } => write!(f, "followup: {report}"),
            Self::Expiry { report } => write!(
                f,
                "expiry: candidates={} marked={} already={} legacy_updated={} failed={}",
                report.candidates,
                report.marked,
                report.already_marked,
                report.legacy_updated,
                report.failed
            ),
        }
    }
}

/// Reminder engine with injected collaborators.
///
/// The feed and the legacy agenda are optional: without a clinic database
/// the feed pass fails each cycle and replies are recorded locally only.
pub struct Engine {
    config: Config,
    store: Store,
    audit: ReplyAudit,
    messenger: Arc<dyn Messenger>,
    feed: Option<Arc<dyn AppointmentFeed>>,
    agenda: Option<Arc<dyn LegacyAgenda>>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new(config: Config, store: Store, messenger: Arc<dyn Messenger>) -> Self {
        let audit = ReplyAudit::new(store.pool().clone());
        Self {
            config,
            store,
            audit,
            messenger,
            feed: None,
            agenda: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_feed(mut self, feed: Arc<dyn AppointmentFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn with_agenda(mut self, agenda: Arc<dyn LegacyAgenda>) -> Self {
        self.agenda = Some(agenda);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn audit(&self) -> &ReplyAudit {
        &self.audit
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current time on the engine's clock.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Run one job to completion.
    pub async fn run_job(&self, job: JobKind) -> Result<PassReport, ConfirmaError> {
        match job {
            JobKind::Feed => Ok(PassReport::Feed {
                reports: self.run_feed_pass().await?,
            }),
            JobKind::Followup => Ok(PassReport::Followup {
                report: self.run_followup_pass().await?,
            }),
            JobKind::Expiry => Ok(PassReport::Expiry {
                report: self.run_expiry_pass().await?,
            }),
        }
    }

    /// Feed → classifier → dispatcher, for first notices and 48h reminders.
    pub async fn run_feed_pass(&self) -> Result<Vec<DispatchReport>, ConfirmaError> {
        let feed = self.feed.as_ref().ok_or_else(|| {
            ConfirmaError::FeedUnavailable("no clinic database configured".into())
        })?;
        let snapshots = feed.fetch_candidates().await?;
        let now = self.clock.now();

        let mut first_notice = Vec::new();
        let mut reminder_48h = Vec::new();
        for snapshot in &snapshots {
            match window::classify(snapshot.scheduled_at, now, &self.config.windows) {
                ReminderWindow::FirstNotice if self.config.scheduler.send_first_notice => {
                    first_notice.push(Candidate::from(snapshot));
                }
                ReminderWindow::Reminder48h => reminder_48h.push(Candidate::from(snapshot)),
                _ => {}
            }
        }
        info!(
            "feed {}: {} rows, {} first-notice, {} 48h candidates",
            feed.name(),
            snapshots.len(),
            first_notice.len(),
            reminder_48h.len()
        );

        let mut reports = Vec::new();
        if !first_notice.is_empty() {
            reports.push(self.dispatch(ReminderKind::FirstNotice, first_notice).await?);
        }
        if !reminder_48h.is_empty() {
            reports.push(self.dispatch(ReminderKind::Reminder48h, reminder_48h).await?);
        }
        Ok(reports)
    }

    /// 12h reminders derived from the store, without touching the feed.
    pub async fn run_followup_pass(&self) -> Result<DispatchReport, ConfirmaError> {
        let now = self.clock.now();
        let due = self
            .store
            .due_for_12h(now, self.config.windows.reminder_12h_hours)
            .await?;
        let candidates = due.iter().map(Candidate::from).collect();
        self.dispatch(ReminderKind::Reminder12h, candidates).await
    }

    /// Mark appointments that passed without any reply.
    pub async fn run_expiry_pass(&self) -> Result<ExpiryReport, ConfirmaError> {
        let now = self.clock.now();
        let due = self.store.due_for_expiry(now).await?;
        let mut report = ExpiryReport {
            candidates: due.len(),
            ..Default::default()
        };

        for record in due {
            let marker = NewDedupeRecord {
                sequence_number: record.sequence_number,
                schedule_key: record.schedule_key,
                kind: ReminderKind::NoResponse,
                sent_at: now,
                scheduled_at: record.scheduled_at,
                phone: record.phone.clone(),
                country_code: record.country_code.clone(),
                patient_name: record.patient_name.clone(),
                physician_name: record.physician_name.clone(),
            };
            match self.store.record_send(&marker).await {
                Ok(RecordOutcome::Inserted(_)) => report.marked += 1,
                Ok(RecordOutcome::AlreadySent) => {
                    report.already_marked += 1;
                    continue;
                }
                Err(e) => {
                    warn!("expiry: seq={} not marked: {e}", record.sequence_number);
                    report.failed += 1;
                    continue;
                }
            }

            if !self.config.scheduler.mark_no_response_in_legacy {
                continue;
            }
            let (Some(agenda), Some(key)) = (&self.agenda, record.schedule_key) else {
                continue;
            };
            match agenda
                .update_confirmation(key, ConfirmationOutcome::Expired, now)
                .await
            {
                Ok(rows) if rows > 0 => report.legacy_updated += 1,
                Ok(_) => warn!("expiry: key={key} matched no agenda row"),
                Err(e) => {
                    warn!("expiry: key={key} legacy update failed: {e}");
                    report.failed += 1;
                }
            }
        }

        info!(
            "expiry: candidates={} marked={} legacy_updated={} failed={}",
            report.candidates, report.marked, report.legacy_updated, report.failed
        );
        Ok(report)
    }
}
