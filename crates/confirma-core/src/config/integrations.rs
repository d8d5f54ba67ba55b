use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Clinic database: the read-only feed view and the legacy scheduling table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyConfig {
    /// PostgreSQL connection URL. Empty = feed and legacy writes disabled.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_feed_view")]
    pub feed_view: String,
    #[serde(default = "default_agenda_table")]
    pub agenda_table: String,
    /// Procedure called after a confirmation write. Empty = no sync call.
    #[serde(default = "default_sync_procedure")]
    pub sync_procedure: String,
    /// Upper bound for connection acquisition and each query.
    #[serde(default = "default_legacy_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_legacy_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub columns: LegacyColumns,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            feed_view: default_feed_view(),
            agenda_table: default_agenda_table(),
            sync_procedure: default_sync_procedure(),
            timeout_secs: default_legacy_timeout(),
            max_connections: default_legacy_max_connections(),
            columns: LegacyColumns::default(),
        }
    }
}

/// Column names in the feed view and the agenda table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyColumns {
    #[serde(default = "default_col_sequence_number")]
    pub sequence_number: String,
    #[serde(default = "default_col_schedule_key")]
    pub schedule_key: String,
    #[serde(default = "default_col_scheduled_at")]
    pub scheduled_at: String,
    /// Read when `scheduled_at` is null.
    #[serde(default = "default_col_scheduled_at_fallback")]
    pub scheduled_at_fallback: String,
    #[serde(default = "default_col_patient_name")]
    pub patient_name: String,
    #[serde(default = "default_col_phone")]
    pub phone: String,
    #[serde(default = "default_col_country_code")]
    pub country_code: String,
    #[serde(default = "default_col_physician_name")]
    pub physician_name: String,
    #[serde(default = "default_col_confirmed_at")]
    pub confirmed_at: String,
    #[serde(default = "default_col_confirmation_text")]
    pub confirmation_text: String,
}

impl Default for LegacyColumns {
    fn default() -> Self {
        Self {
            sequence_number: default_col_sequence_number(),
            schedule_key: default_col_schedule_key(),
            scheduled_at: default_col_scheduled_at(),
            scheduled_at_fallback: default_col_scheduled_at_fallback(),
            patient_name: default_col_patient_name(),
            phone: default_col_phone(),
            country_code: default_col_country_code(),
            physician_name: default_col_physician_name(),
            confirmed_at: default_col_confirmed_at(),
            confirmation_text: default_col_confirmation_text(),
        }
    }
}

impl LegacyColumns {
    /// Every configured column name, for identifier validation.
    pub fn all(&self) -> [&str; 10] {
        [
            &self.sequence_number,
            &self.schedule_key,
            &self.scheduled_at,
            &self.scheduled_at_fallback,
            &self.patient_name,
            &self.phone,
            &self.country_code,
            &self.physician_name,
            &self.confirmed_at,
            &self.confirmation_text,
        ]
    }
}

/// Messaging gateway (contact/message/flow API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,
    /// Sent as the `API-KEY` header.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
    /// Used when an appointment row carries no country code.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
    /// Flow started after each reminder. `None` = no flow.
    #[serde(default)]
    pub flow_id: Option<i64>,
    /// Tag attached to newly created contacts.
    #[serde(default)]
    pub contact_tag_id: Option<i64>,
    /// Custom field receiving the contact's own id on creation.
    #[serde(default)]
    pub contact_id_field_id: Option<i64>,
    /// Custom field receiving the appointment sequence number before each send.
    #[serde(default)]
    pub sequence_field_id: Option<i64>,
    /// Custom field receiving the legacy schedule key before each send.
    #[serde(default)]
    pub schedule_key_field_id: Option<i64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_base_url(),
            api_key: String::new(),
            timeout_secs: default_gateway_timeout(),
            default_country_code: default_country_code(),
            flow_id: None,
            contact_tag_id: None,
            contact_id_field_id: None,
            sequence_field_id: None,
            schedule_key_field_id: None,
        }
    }
}
