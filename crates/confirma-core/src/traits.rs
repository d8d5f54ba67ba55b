use crate::{
    appointment::{AppointmentSnapshot, ConfirmationOutcome},
    error::ConfirmaError,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Identifier of a contact inside the messaging gateway.
pub type ContactId = i64;

/// Source-of-truth appointment feed, read only.
///
/// Implementations return every currently visible row that passes
/// validation. Malformed rows are dropped with a warning; only connectivity
/// or query failures surface as `FeedUnavailable`.
#[async_trait]
pub trait AppointmentFeed: Send + Sync {
    /// Human-readable feed name for logs.
    fn name(&self) -> &str;

    /// Read all candidate appointments.
    async fn fetch_candidates(&self) -> Result<Vec<AppointmentSnapshot>, ConfirmaError>;
}

/// Legacy scheduling table: the authoritative confirmation state.
#[async_trait]
pub trait LegacyAgenda: Send + Sync {
    /// Set confirmation timestamp and text on the row with `schedule_key`.
    /// Returns the number of rows affected.
    async fn update_confirmation(
        &self,
        schedule_key: i64,
        outcome: ConfirmationOutcome,
        at: NaiveDateTime,
    ) -> Result<u64, ConfirmaError>;

    /// Best-effort downstream sync after the confirmation write.
    async fn sync_status(
        &self,
        schedule_key: i64,
        outcome: ConfirmationOutcome,
    ) -> Result<(), ConfirmaError>;
}

/// Patient-messaging gateway.
///
/// No gateway-side idempotency is assumed; callers guard sends themselves.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Human-readable gateway name.
    fn name(&self) -> &str;

    /// Look up an existing contact by canonical phone.
    async fn find_contact(&self, phone: &str) -> Result<Option<ContactId>, ConfirmaError>;

    /// Create a contact and return its id.
    async fn create_contact(
        &self,
        phone: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<ContactId, ConfirmaError>;

    /// Send a text message to a contact.
    async fn send_message(&self, contact: ContactId, text: &str) -> Result<(), ConfirmaError>;

    /// Start an interactive flow; `None` uses the gateway's default flow.
    async fn send_flow(&self, contact: ContactId, flow_id: Option<i64>)
        -> Result<(), ConfirmaError>;

    /// Attach a tag to a contact.
    async fn add_tag(&self, contact: ContactId, tag_id: i64) -> Result<(), ConfirmaError>;

    /// Set a custom field on a contact.
    async fn set_custom_field(
        &self,
        contact: ContactId,
        field_id: i64,
        value: &str,
    ) -> Result<(), ConfirmaError>;
}

/// Source of "now" in the clinic's local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The real local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}
