//! In-process fakes for engine, scheduler and API tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use confirma_core::{
    appointment::{
        AppointmentSnapshot, ConfirmationOutcome, NewDedupeRecord, ReminderKind, ReplyEvent,
    },
    config::Config,
    error::ConfirmaError,
    traits::{AppointmentFeed, Clock, ContactId, LegacyAgenda, Messenger},
};
use confirma_legacy::FeedRow;
use confirma_memory::Store;

use crate::engine::Engine;

pub(crate) const PHONE: &str = "5531999999999";

pub(crate) fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 5, 4)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

pub(crate) struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub(crate) fn new(at: NaiveDateTime) -> Self {
        Self { now: Mutex::new(at) }
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}

/// Feed fed with raw rows, validated the same way as the database feed.
#[derive(Default)]
pub(crate) struct FakeFeed {
    pub(crate) rows: Mutex<Vec<FeedRow>>,
    pub(crate) unavailable: Mutex<bool>,
    /// Sleep before answering, to hold a run in flight.
    pub(crate) delay: Mutex<Option<std::time::Duration>>,
    pub(crate) panic: Mutex<bool>,
    pub(crate) calls: Mutex<usize>,
}

#[async_trait]
impl AppointmentFeed for FakeFeed {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch_candidates(&self) -> Result<Vec<AppointmentSnapshot>, ConfirmaError> {
        *self.calls.lock().unwrap() += 1;
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.panic.lock().unwrap() {
            panic!("feed exploded");
        }
        if *self.unavailable.lock().unwrap() {
            return Err(ConfirmaError::FeedUnavailable("connection refused".into()));
        }
        let rows = self.rows.lock().unwrap().clone();
        Ok(rows
            .into_iter()
            .filter_map(|r| r.into_snapshot().ok())
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakeAgenda {
    pub(crate) updates: Mutex<Vec<(i64, ConfirmationOutcome)>>,
    pub(crate) syncs: Mutex<Vec<(i64, ConfirmationOutcome)>>,
    /// Rows affected per key; unknown keys affect one row.
    pub(crate) rows: Mutex<HashMap<i64, u64>>,
    pub(crate) fail_update: Mutex<bool>,
    pub(crate) fail_sync: Mutex<bool>,
}

#[async_trait]
impl LegacyAgenda for FakeAgenda {
    async fn update_confirmation(
        &self,
        schedule_key: i64,
        outcome: ConfirmationOutcome,
        _at: NaiveDateTime,
    ) -> Result<u64, ConfirmaError> {
        if *self.fail_update.lock().unwrap() {
            return Err(ConfirmaError::LegacyUpdateFailed("deadlock detected".into()));
        }
        self.updates.lock().unwrap().push((schedule_key, outcome));
        Ok(*self.rows.lock().unwrap().get(&schedule_key).unwrap_or(&1))
    }

    async fn sync_status(
        &self,
        schedule_key: i64,
        outcome: ConfirmationOutcome,
    ) -> Result<(), ConfirmaError> {
        if *self.fail_sync.lock().unwrap() {
            return Err(ConfirmaError::LegacyUpdateFailed("procedure missing".into()));
        }
        self.syncs.lock().unwrap().push((schedule_key, outcome));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeMessenger {
    pub(crate) contacts: Mutex<HashMap<String, ContactId>>,
    pub(crate) created: Mutex<Vec<(String, String, String)>>,
    pub(crate) sent: Mutex<Vec<(ContactId, String)>>,
    pub(crate) flows: Mutex<Vec<(ContactId, Option<i64>)>>,
    pub(crate) tags: Mutex<Vec<(ContactId, i64)>>,
    pub(crate) fields: Mutex<Vec<(ContactId, i64, String)>>,
    /// Phones whose text send fails.
    pub(crate) failing: Mutex<HashSet<String>>,
    pub(crate) fail_flow: Mutex<bool>,
}

impl FakeMessenger {
    fn phone_of(&self, contact: ContactId) -> Option<String> {
        self.contacts
            .lock()
            .unwrap()
            .iter()
            .find(|(_, id)| **id == contact)
            .map(|(phone, _)| phone.clone())
    }

    pub(crate) fn sent_phones(&self) -> Vec<String> {
        let sent = self.sent.lock().unwrap().clone();
        sent.iter()
            .filter_map(|(contact, _)| self.phone_of(*contact))
            .collect()
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    fn name(&self) -> &str {
        "fake"
    }

    async fn find_contact(&self, phone: &str) -> Result<Option<ContactId>, ConfirmaError> {
        Ok(self.contacts.lock().unwrap().get(phone).copied())
    }

    async fn create_contact(
        &self,
        phone: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<ContactId, ConfirmaError> {
        let mut contacts = self.contacts.lock().unwrap();
        let id = contacts.len() as ContactId + 1;
        contacts.insert(phone.to_string(), id);
        self.created.lock().unwrap().push((
            phone.to_string(),
            first_name.to_string(),
            last_name.to_string(),
        ));
        Ok(id)
    }

    async fn send_message(&self, contact: ContactId, text: &str) -> Result<(), ConfirmaError> {
        if let Some(phone) = self.phone_of(contact) {
            if self.failing.lock().unwrap().contains(&phone) {
                return Err(ConfirmaError::GatewayCallFailed("503 Service Unavailable".into()));
            }
        }
        self.sent.lock().unwrap().push((contact, text.to_string()));
        Ok(())
    }

    async fn send_flow(
        &self,
        contact: ContactId,
        flow_id: Option<i64>,
    ) -> Result<(), ConfirmaError> {
        if *self.fail_flow.lock().unwrap() {
            return Err(ConfirmaError::GatewayCallFailed("flow not found".into()));
        }
        self.flows.lock().unwrap().push((contact, flow_id));
        Ok(())
    }

    async fn add_tag(&self, contact: ContactId, tag_id: i64) -> Result<(), ConfirmaError> {
        self.tags.lock().unwrap().push((contact, tag_id));
        Ok(())
    }

    async fn set_custom_field(
        &self,
        contact: ContactId,
        field_id: i64,
        value: &str,
    ) -> Result<(), ConfirmaError> {
        self.fields
            .lock()
            .unwrap()
            .push((contact, field_id, value.to_string()));
        Ok(())
    }
}

pub(crate) struct Harness {
    pub(crate) engine: Arc<Engine>,
    pub(crate) feed: Arc<FakeFeed>,
    pub(crate) agenda: Arc<FakeAgenda>,
    pub(crate) messenger: Arc<FakeMessenger>,
    pub(crate) clock: Arc<ManualClock>,
}

impl Harness {
    pub(crate) fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub(crate) fn set_rows(&self, rows: Vec<FeedRow>) {
        *self.feed.rows.lock().unwrap() = rows;
    }

    /// Seed a sent record directly in the store.
    pub(crate) async fn seed(
        &self,
        seq: i64,
        key: Option<i64>,
        kind: ReminderKind,
        ahead: Duration,
    ) {
        let record = NewDedupeRecord {
            sequence_number: seq,
            schedule_key: key,
            kind,
            sent_at: self.now(),
            scheduled_at: Some(self.now() + ahead),
            phone: PHONE.to_string(),
            country_code: Some("55".into()),
            patient_name: Some("Maria Silva".into()),
            physician_name: Some("Souza".into()),
        };
        self.engine.store().record_send(&record).await.unwrap();
    }

    pub(crate) async fn sent_count(&self, seq: i64, kind: ReminderKind) -> i64 {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM reminder_sends WHERE sequence_number = ? AND kind = ?",
        )
        .bind(seq)
        .bind(kind.as_str())
        .fetch_one(self.engine.store().pool())
        .await
        .unwrap();
        count
    }
}

pub(crate) async fn harness_with(config: Config) -> Harness {
    let store = Store::in_memory().await.unwrap();
    let feed = Arc::new(FakeFeed::default());
    let agenda = Arc::new(FakeAgenda::default());
    let messenger = Arc::new(FakeMessenger::default());
    let clock = Arc::new(ManualClock::new(start()));
    let engine = Engine::new(config, store, messenger.clone())
        .with_feed(feed.clone())
        .with_agenda(agenda.clone())
        .with_clock(clock.clone());
    Harness {
        engine: Arc::new(engine),
        feed,
        agenda,
        messenger,
        clock,
    }
}

pub(crate) async fn harness() -> Harness {
    let mut config = Config::default();
    config.gateway.flow_id = Some(5);
    config.gateway.contact_tag_id = Some(15);
    config.gateway.sequence_field_id = Some(1);
    config.gateway.schedule_key_field_id = Some(2);
    harness_with(config).await
}

pub(crate) fn feed_row(seq: i64, ahead: Duration, phone: &str) -> FeedRow {
    FeedRow {
        sequence_number: Some(seq),
        schedule_key: Some(seq + 9000),
        scheduled_at: Some(start() + ahead),
        scheduled_at_fallback: None,
        patient_name: Some("Maria da Silva".into()),
        phone: Some(phone.into()),
        country_code: None,
        physician_name: Some("Souza".into()),
    }
}

pub(crate) fn reply(phone: &str, code: &str, seq: Option<i64>, key: Option<i64>) -> ReplyEvent {
    ReplyEvent {
        phone: phone.to_string(),
        reply_code: code.to_string(),
        sequence_number: seq,
        schedule_key: key,
    }
}
