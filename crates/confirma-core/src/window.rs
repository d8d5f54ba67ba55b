//! Window Classifier: which reminder window an appointment falls into.

use chrono::{Duration, NaiveDateTime};

use crate::appointment::ReminderWindow;
use crate::config::WindowConfig;

/// Classify an appointment against `now`.
///
/// Precedence, first match wins: missing time → `None`; past or now →
/// `Expired`; `(0, 12h]` → `Reminder12h`; `[36h, 50h]` → `Reminder48h`;
/// `[60h, 72h]` → `FirstNotice`; anything else → `None`. Bounds come from
/// `config` and are inclusive.
pub fn classify(
    scheduled_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
    config: &WindowConfig,
) -> ReminderWindow {
    let Some(scheduled_at) = scheduled_at else {
        return ReminderWindow::None;
    };

    let ahead = scheduled_at - now;
    let hours = |h: u32| Duration::hours(i64::from(h));

    if ahead <= Duration::zero() {
        return ReminderWindow::Expired;
    }
    if ahead <= hours(config.reminder_12h_hours) {
        return ReminderWindow::Reminder12h;
    }
    if ahead >= hours(config.reminder_48h_min_hours)
        && ahead <= hours(config.reminder_48h_max_hours)
    {
        return ReminderWindow::Reminder48h;
    }
    let first_notice_floor = config
        .first_notice_hours
        .saturating_sub(config.first_notice_band_hours);
    if ahead >= hours(first_notice_floor) && ahead <= hours(config.first_notice_hours) {
        return ReminderWindow::FirstNotice;
    }
    ReminderWindow::None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 5, 4)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn at(offset: Duration) -> Option<NaiveDateTime> {
        Some(now() + offset)
    }

    fn classify_default(offset: Duration) -> ReminderWindow {
        classify(at(offset), now(), &WindowConfig::default())
    }

    #[test]
    fn test_48h_band_is_inclusive() {
        assert_eq!(classify_default(Duration::hours(36)), ReminderWindow::Reminder48h);
        assert_eq!(classify_default(Duration::hours(40)), ReminderWindow::Reminder48h);
        assert_eq!(classify_default(Duration::hours(48)), ReminderWindow::Reminder48h);
        assert_eq!(classify_default(Duration::hours(50)), ReminderWindow::Reminder48h);
    }

    #[test]
    fn test_just_outside_48h_band_is_none() {
        assert_eq!(classify_default(Duration::hours(51)), ReminderWindow::None);
        assert_eq!(classify_default(Duration::hours(35)), ReminderWindow::None);
        assert_eq!(
            classify_default(Duration::hours(50) + Duration::minutes(1)),
            ReminderWindow::None
        );
        assert_eq!(
            classify_default(Duration::hours(36) - Duration::seconds(1)),
            ReminderWindow::None
        );
    }

    #[test]
    fn test_12h_window() {
        assert_eq!(classify_default(Duration::minutes(1)), ReminderWindow::Reminder12h);
        assert_eq!(classify_default(Duration::hours(10)), ReminderWindow::Reminder12h);
        assert_eq!(classify_default(Duration::hours(12)), ReminderWindow::Reminder12h);
        assert_eq!(classify_default(Duration::hours(13)), ReminderWindow::None);
    }

    #[test]
    fn test_first_notice_band() {
        assert_eq!(classify_default(Duration::hours(72)), ReminderWindow::FirstNotice);
        assert_eq!(classify_default(Duration::hours(60)), ReminderWindow::FirstNotice);
        assert_eq!(classify_default(Duration::hours(59)), ReminderWindow::None);
        assert_eq!(classify_default(Duration::hours(73)), ReminderWindow::None);
    }

    #[test]
    fn test_expired_and_missing() {
        assert_eq!(classify_default(Duration::zero()), ReminderWindow::Expired);
        assert_eq!(classify_default(Duration::hours(-3)), ReminderWindow::Expired);
        assert_eq!(
            classify(None, now(), &WindowConfig::default()),
            ReminderWindow::None
        );
    }

    #[test]
    fn test_custom_bounds() {
        let cfg = WindowConfig {
            reminder_48h_min_hours: 40,
            reminder_48h_max_hours: 56,
            ..WindowConfig::default()
        };
        assert_eq!(
            classify(at(Duration::hours(38)), now(), &cfg),
            ReminderWindow::None
        );
        assert_eq!(
            classify(at(Duration::hours(55)), now(), &cfg),
            ReminderWindow::Reminder48h
        );
    }

    #[test]
    fn test_window_to_kind() {
        use crate::appointment::ReminderKind;
        assert_eq!(
            ReminderWindow::Reminder48h.reminder_kind(),
            Some(ReminderKind::Reminder48h)
        );
        assert_eq!(ReminderWindow::Expired.reminder_kind(), None);
        assert_eq!(ReminderWindow::None.reminder_kind(), None);
    }
}
