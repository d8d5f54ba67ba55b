mod defaults;
mod integrations;
mod templates;


pub use integrations::*;
pub use templates::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfirmaError;
use defaults::*;

/// Environment variables that override secrets from the config file.
pub const ENV_GATEWAY_API_KEY: &str = "CONFIRMA_GATEWAY_API_KEY";
pub const ENV_WEBHOOK_SECRET: &str = "CONFIRMA_WEBHOOK_SECRET";
pub const ENV_LEGACY_URL: &str = "CONFIRMA_LEGACY_URL";

/// Top-level Confirma configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub legacy: LegacyConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub windows: WindowConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub clinic: ClinicConfig,
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for daily-rolling log files. Unset = stdout only.
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

/// Dedupe Store config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Reminder window bounds, in hours before the appointment. All inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Confirmation horizon: upper edge of the first-notice band.
    #[serde(default = "default_first_notice_hours")]
    pub first_notice_hours: u32,
    /// Width of the first-notice band below the horizon.
    #[serde(default = "default_first_notice_band_hours")]
    pub first_notice_band_hours: u32,
    #[serde(default = "default_reminder_48h_min_hours")]
    pub reminder_48h_min_hours: u32,
    #[serde(default = "default_reminder_48h_max_hours")]
    pub reminder_48h_max_hours: u32,
    #[serde(default = "default_reminder_12h_hours")]
    pub reminder_12h_hours: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            first_notice_hours: default_first_notice_hours(),
            first_notice_band_hours: default_first_notice_band_hours(),
            reminder_48h_min_hours: default_reminder_48h_min_hours(),
            reminder_48h_max_hours: default_reminder_48h_max_hours(),
            reminder_12h_hours: default_reminder_12h_hours(),
        }
    }
}

/// Scheduler Driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Feed pass (first notice + 48h).
    #[serde(default = "default_feed_interval")]
    pub feed_interval_secs: u64,
    /// Store-driven 12h pass.
    #[serde(default = "default_followup_interval")]
    pub followup_interval_secs: u64,
    /// No-response marking pass.
    #[serde(default = "default_expiry_interval")]
    pub expiry_interval_secs: u64,
    #[serde(default = "default_true")]
    pub send_first_notice: bool,
    /// Also write "Sem resposta" to the legacy table on expiry.
    #[serde(default)]
    pub mark_no_response_in_legacy: bool,
    /// How long `stop()` waits for in-flight runs before aborting them.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            feed_interval_secs: default_feed_interval(),
            followup_interval_secs: default_followup_interval(),
            expiry_interval_secs: default_expiry_interval(),
            send_first_notice: true,
            mark_no_response_in_legacy: false,
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

/// Webhook and status HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Shared secret for webhook body signatures. Empty = verification off.
    #[serde(default)]
    pub webhook_secret: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_api_host(),
            port: default_api_port(),
            webhook_secret: String::new(),
        }
    }
}

impl Config {
    /// Override secrets from the environment (non-empty values only).
    pub fn apply_env_overrides<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_GATEWAY_API_KEY) {
            self.gateway.api_key = v;
        }
        if let Some(v) = get(ENV_WEBHOOK_SECRET) {
            self.api.webhook_secret = v;
        }
        if let Some(v) = get(ENV_LEGACY_URL) {
            self.legacy.url = v;
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfirmaError> {
        let legacy = &self.legacy;
        let mut identifiers = vec![
            ("legacy.feed_view", legacy.feed_view.as_str()),
            ("legacy.agenda_table", legacy.agenda_table.as_str()),
        ];
        if !legacy.sync_procedure.is_empty() {
            identifiers.push(("legacy.sync_procedure", legacy.sync_procedure.as_str()));
        }
        for col in legacy.columns.all() {
            identifiers.push(("legacy.columns", col));
        }
        for (field, ident) in identifiers {
            if !is_sql_identifier(ident) {
                return Err(ConfirmaError::Config(format!(
                    "{field}: '{ident}' is not a valid SQL identifier"
                )));
            }
        }

        let w = &self.windows;
        if w.reminder_48h_min_hours > w.reminder_48h_max_hours {
            return Err(ConfirmaError::Config(
                "windows: reminder_48h_min_hours must not exceed reminder_48h_max_hours".into(),
            ));
        }
        if w.reminder_12h_hours > w.reminder_48h_min_hours {
            return Err(ConfirmaError::Config(
                "windows: reminder_12h_hours must not exceed reminder_48h_min_hours".into(),
            ));
        }
        if w.first_notice_band_hours > w.first_notice_hours {
            return Err(ConfirmaError::Config(
                "windows: first_notice_band_hours must not exceed first_notice_hours".into(),
            ));
        }

        let s = &self.scheduler;
        if s.feed_interval_secs == 0 || s.followup_interval_secs == 0 || s.expiry_interval_secs == 0
        {
            return Err(ConfirmaError::Config(
                "scheduler: intervals must be greater than zero".into(),
            ));
        }
        if self.gateway.timeout_secs == 0 || legacy.timeout_secs == 0 {
            return Err(ConfirmaError::Config("timeouts must be greater than zero".into()));
        }
        Ok(())
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*` segments joined by single dots (`schema.table`).
pub fn is_sql_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|seg| {
            let mut chars = seg.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file, apply environment overrides, and
/// validate.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, ConfirmaError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfirmaError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str::<Config>(&content)
            .map_err(|e| ConfirmaError::Config(format!("failed to parse config: {}", e)))?
    } else {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}
