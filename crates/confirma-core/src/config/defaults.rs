//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "confirma".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_db_path() -> String {
    "~/.confirma/data/reminders.db".to_string()
}

pub fn default_feed_view() -> String {
    "ava_confirmacao_consulta".to_string()
}

pub fn default_agenda_table() -> String {
    "agenda_consulta".to_string()
}

pub fn default_sync_procedure() -> String {
    "ghas_prc_alt_status_age".to_string()
}

pub fn default_legacy_timeout() -> u64 {
    30
}

pub fn default_legacy_max_connections() -> u32 {
    4
}

pub fn default_col_sequence_number() -> String {
    "nr_sequencia".to_string()
}

pub fn default_col_schedule_key() -> String {
    "cd_agenda".to_string()
}

pub fn default_col_scheduled_at() -> String {
    "dt_agenda".to_string()
}

pub fn default_col_scheduled_at_fallback() -> String {
    "dt_consulta".to_string()
}

pub fn default_col_patient_name() -> String {
    "nm_paciente".to_string()
}

pub fn default_col_phone() -> String {
    "nr_telefone".to_string()
}

pub fn default_col_country_code() -> String {
    "nr_ddi".to_string()
}

pub fn default_col_physician_name() -> String {
    "nm_medico_externo".to_string()
}

pub fn default_col_confirmed_at() -> String {
    "dt_confirmacao".to_string()
}

pub fn default_col_confirmation_text() -> String {
    "ds_confirmacao".to_string()
}

pub fn default_gateway_base_url() -> String {
    "https://backend.botconversa.com.br/api/v1/webhook".to_string()
}

pub fn default_gateway_timeout() -> u64 {
    30
}

pub fn default_country_code() -> String {
    "55".to_string()
}

pub fn default_first_notice_hours() -> u32 {
    72
}

pub fn default_first_notice_band_hours() -> u32 {
    12
}

pub fn default_reminder_48h_min_hours() -> u32 {
    36
}

pub fn default_reminder_48h_max_hours() -> u32 {
    50
}

pub fn default_reminder_12h_hours() -> u32 {
    12
}

pub fn default_feed_interval() -> u64 {
    300
}

pub fn default_followup_interval() -> u64 {
    300
}

pub fn default_expiry_interval() -> u64 {
    900
}

pub fn default_shutdown_grace() -> u64 {
    30
}

pub fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_api_port() -> u16 {
    8000
}

pub fn default_clinic_phone() -> String {
    "(31) 3238-8100".to_string()
}

pub fn default_first_notice_template() -> String {
    "Olá, {patient}!\n\n\
     Sua consulta está agendada:\n\
     📅 {date} às {time}\n\
     👨‍⚕️ {physician}\n\n\
     Por favor, confirme sua presença:\n\
     ✅ 1 - Vou comparecer\n\
     ❌ 0 - Preciso cancelar\n\n\
     📞 Para dúvidas: {clinic_phone}"
        .to_string()
}

pub fn default_reminder_48h_template() -> String {
    "🔔 *LEMBRETE IMPORTANTE*, {patient}!\n\n\
     Sua consulta está marcada para *AMANHÃ*:\n\
     📅 {date} às {time}\n\
     👨‍⚕️ {physician}\n\n\
     Por favor, confirme sua presença:\n\
     ✅ 1 - Vou comparecer\n\
     ❌ 0 - Preciso cancelar\n\n\
     📞 Para dúvidas: {clinic_phone}"
        .to_string()
}

pub fn default_reminder_12h_template() -> String {
    "⚠️ *ÚLTIMO LEMBRETE*, {patient}!\n\n\
     Sua consulta é *HOJE* às {time}:\n\
     👨‍⚕️ {physician}\n\n\
     Confirme sua presença AGORA:\n\
     ✅ 1 - Vou comparecer\n\
     ❌ 0 - Preciso cancelar\n\n\
     📞 Para dúvidas: {clinic_phone}"
        .to_string()
}
