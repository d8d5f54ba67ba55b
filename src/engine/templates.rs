//! Message rendering from per-kind templates.

use confirma_core::config::ClinicConfig;

use super::Candidate;

pub(super) const DEFAULT_PATIENT: &str = "Paciente";
const DEFAULT_PHYSICIAN: &str = "médico";

/// Fill `{patient}`, `{date}`, `{time}`, `{physician}` and `{clinic_phone}`.
pub(super) fn render(template: &str, candidate: &Candidate, clinic: &ClinicConfig) -> String {
    let patient = candidate
        .patient_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_PATIENT);
    let physician = candidate
        .physician_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|n| format!("Dr. {n}"))
        .unwrap_or_else(|| DEFAULT_PHYSICIAN.to_string());
    let (date, time) = match candidate.scheduled_at {
        Some(at) => (
            at.format("%d/%m/%Y").to_string(),
            at.format("%H:%M").to_string(),
        ),
        None => (String::new(), String::new()),
    };

    template
        .replace("{patient}", patient)
        .replace("{date}", &date)
        .replace("{time}", &time)
        .replace("{physician}", &physician)
        .replace("{clinic_phone}", &clinic.phone)
}
