use serde::{Deserialize, Serialize};

use super::defaults::*;
use crate::appointment::ReminderKind;

/// Per-kind message templates.
///
/// Placeholders: `{patient}`, `{date}`, `{time}`, `{physician}`, `{clinic_phone}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    #[serde(default = "default_first_notice_template")]
    pub first_notice: String,
    #[serde(default = "default_reminder_48h_template")]
    pub reminder_48h: String,
    #[serde(default = "default_reminder_12h_template")]
    pub reminder_12h: String,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            first_notice: default_first_notice_template(),
            reminder_48h: default_reminder_48h_template(),
            reminder_12h: default_reminder_12h_template(),
        }
    }
}

impl TemplatesConfig {
    /// Template for a reminder kind. `None` for kinds that send nothing.
    pub fn for_kind(&self, kind: ReminderKind) -> Option<&str> {
        match kind {
            ReminderKind::FirstNotice => Some(&self.first_notice),
            ReminderKind::Reminder48h => Some(&self.reminder_48h),
            ReminderKind::Reminder12h => Some(&self.reminder_12h),
            ReminderKind::NoResponse => None,
        }
    }
}

/// Clinic details rendered into messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_clinic_phone")]
    pub phone: String,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            phone: default_clinic_phone(),
        }
    }
}
