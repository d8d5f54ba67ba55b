use super::*;
use chrono::{Duration, NaiveDate};
use confirma_core::appointment::NewDedupeRecord;

/// Create an in-memory store for testing.
async fn test_store() -> Store {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .unwrap();
    Store::run_migrations(&pool).await.unwrap();
    Store { pool }
}

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 5, 4)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn send(seq: i64, kind: ReminderKind, sent_at: NaiveDateTime, ahead_h: i64) -> NewDedupeRecord {
    NewDedupeRecord {
        sequence_number: seq,
        schedule_key: Some(seq + 9000),
        kind,
        sent_at,
        scheduled_at: Some(now() + Duration::hours(ahead_h)),
        phone: "5531999999999".to_string(),
        country_code: Some("55".to_string()),
        patient_name: Some("Maria Silva".to_string()),
        physician_name: Some("Souza".to_string()),
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let store = test_store().await;
    Store::run_migrations(store.pool()).await.unwrap();
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn test_record_send_then_already_sent() {
    let store = test_store().await;
    assert!(!store
        .already_sent(100, ReminderKind::Reminder48h)
        .await
        .unwrap());

    let outcome = store
        .record_send(&send(100, ReminderKind::Reminder48h, now(), 40))
        .await
        .unwrap();
    assert!(matches!(outcome, RecordOutcome::Inserted(_)));

    assert!(store
        .already_sent(100, ReminderKind::Reminder48h)
        .await
        .unwrap());
    assert!(!store
        .already_sent(100, ReminderKind::Reminder12h)
        .await
        .unwrap());
    assert!(!store
        .already_sent(101, ReminderKind::Reminder48h)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_duplicate_send_maps_to_already_sent() {
    let store = test_store().await;
    let record = send(100, ReminderKind::Reminder48h, now(), 40);
    store.record_send(&record).await.unwrap();

    let later = NewDedupeRecord {
        sent_at: now() + Duration::minutes(5),
        ..record
    };
    let outcome = store.record_send(&later).await.unwrap();
    assert_eq!(outcome, RecordOutcome::AlreadySent);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total, 1);
}

#[tokio::test]
async fn test_record_send_normalizes_phone() {
    let store = test_store().await;
    let mut record = send(100, ReminderKind::FirstNotice, now(), 70);
    record.phone = "+55 (31) 99999-9999".to_string();
    store.record_send(&record).await.unwrap();

    let latest = store.latest_for_sequence(100).await.unwrap().unwrap();
    assert_eq!(latest.phone, "5531999999999");
    assert_eq!(latest.kind, ReminderKind::FirstNotice);
    assert_eq!(latest.sent_at, now());
    assert_eq!(latest.scheduled_at, Some(now() + Duration::hours(70)));
    assert_eq!(latest.schedule_key, Some(9100));
}

#[tokio::test]
async fn test_due_for_12h_selects_window_and_excludes_sent() {
    let store = test_store().await;
    // 48h sent two days ago; three appointments at +10h, +6h and +20h now.
    let sent = now() - Duration::hours(38);
    store
        .record_send(&send(100, ReminderKind::Reminder48h, sent, 10))
        .await
        .unwrap();
    store
        .record_send(&send(101, ReminderKind::Reminder48h, sent, 6))
        .await
        .unwrap();
    store
        .record_send(&send(102, ReminderKind::Reminder48h, sent, 20))
        .await
        .unwrap();
    // Past appointment is outside the window.
    store
        .record_send(&send(103, ReminderKind::Reminder48h, sent, -1))
        .await
        .unwrap();

    let due = store.due_for_12h(now(), 12).await.unwrap();
    let seqs: Vec<i64> = due.iter().map(|r| r.sequence_number).collect();
    assert_eq!(seqs, vec![101, 100], "soonest first, +20h and past excluded");

    store
        .record_send(&send(101, ReminderKind::Reminder12h, now(), 6))
        .await
        .unwrap();
    let due = store.due_for_12h(now(), 12).await.unwrap();
    let seqs: Vec<i64> = due.iter().map(|r| r.sequence_number).collect();
    assert_eq!(seqs, vec![100]);
}

#[tokio::test]
async fn test_due_for_12h_ignores_first_notice_only() {
    let store = test_store().await;
    store
        .record_send(&send(
            200,
            ReminderKind::FirstNotice,
            now() - Duration::hours(60),
            8,
        ))
        .await
        .unwrap();
    assert!(store.due_for_12h(now(), 12).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_find_latest_unreplied_by_phone() {
    let store = test_store().await;
    store
        .record_send(&send(
            100,
            ReminderKind::FirstNotice,
            now() - Duration::hours(30),
            40,
        ))
        .await
        .unwrap();
    store
        .record_send(&send(100, ReminderKind::Reminder48h, now(), 40))
        .await
        .unwrap();

    // Lookup is format-insensitive.
    let found = store
        .find_latest_unreplied_by_phone("+55 31 99999-9999")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.sequence_number, 100);
    assert_eq!(found.kind, ReminderKind::Reminder48h);

    assert!(store
        .find_latest_unreplied_by_phone("5531888888888")
        .await
        .unwrap()
        .is_none());
    assert!(store
        .find_latest_unreplied_by_phone("")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_replied_sequence_is_no_longer_unreplied() {
    let store = test_store().await;
    store
        .record_send(&send(
            100,
            ReminderKind::FirstNotice,
            now() - Duration::hours(30),
            40,
        ))
        .await
        .unwrap();
    store
        .record_send(&send(100, ReminderKind::Reminder48h, now(), 40))
        .await
        .unwrap();

    let updated = store
        .record_reply(100, ReplyCode::Confirm, now() + Duration::minutes(3))
        .await
        .unwrap();
    assert!(updated);

    let latest = store.latest_for_sequence(100).await.unwrap().unwrap();
    assert_eq!(latest.kind, ReminderKind::Reminder48h);
    assert_eq!(latest.reply_code, Some(ReplyCode::Confirm));
    assert_eq!(latest.replied_at, Some(now() + Duration::minutes(3)));

    // The older first-notice row has no reply, but the sequence does.
    assert!(store
        .find_latest_unreplied_by_phone("5531999999999")
        .await
        .unwrap()
        .is_none());
    assert!(store
        .unreplied_sequences_by_phone("5531999999999")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_unreplied_sequences_by_phone_lists_distinct() {
    let store = test_store().await;
    store
        .record_send(&send(100, ReminderKind::FirstNotice, now(), 70))
        .await
        .unwrap();
    store
        .record_send(&send(100, ReminderKind::Reminder48h, now(), 40))
        .await
        .unwrap();
    store
        .record_send(&send(101, ReminderKind::Reminder48h, now(), 45))
        .await
        .unwrap();

    let seqs = store
        .unreplied_sequences_by_phone("5531999999999")
        .await
        .unwrap();
    assert_eq!(seqs, vec![100, 101]);
}

#[tokio::test]
async fn test_record_reply_unknown_sequence() {
    let store = test_store().await;
    let updated = store
        .record_reply(999, ReplyCode::Cancel, now())
        .await
        .unwrap();
    assert!(!updated);
}

#[tokio::test]
async fn test_due_for_expiry() {
    let store = test_store().await;
    let sent = now() - Duration::hours(50);
    // 100: past, no reply -> due.
    store
        .record_send(&send(100, ReminderKind::Reminder48h, sent, -2))
        .await
        .unwrap();
    store
        .record_send(&send(
            100,
            ReminderKind::Reminder12h,
            now() - Duration::hours(10),
            -2,
        ))
        .await
        .unwrap();
    // 101: past, replied -> not due.
    store
        .record_send(&send(101, ReminderKind::Reminder48h, sent, -1))
        .await
        .unwrap();
    store
        .record_reply(101, ReplyCode::Confirm, now() - Duration::hours(20))
        .await
        .unwrap();
    // 102: future -> not due.
    store
        .record_send(&send(102, ReminderKind::Reminder48h, sent, 3))
        .await
        .unwrap();

    let due = store.due_for_expiry(now()).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].sequence_number, 100);
    assert_eq!(due[0].kind, ReminderKind::Reminder12h, "latest record");

    store
        .record_send(&send(100, ReminderKind::NoResponse, now(), -2))
        .await
        .unwrap();
    assert!(store.due_for_expiry(now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stats_counts_by_kind() {
    let store = test_store().await;
    store
        .record_send(&send(100, ReminderKind::Reminder48h, now(), 40))
        .await
        .unwrap();
    store
        .record_send(&send(101, ReminderKind::Reminder48h, now(), 41))
        .await
        .unwrap();
    store
        .record_send(&send(101, ReminderKind::Reminder12h, now(), 41))
        .await
        .unwrap();
    store
        .record_reply(100, ReplyCode::Cancel, now())
        .await
        .unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.replied, 1);
    assert_eq!(stats.by_kind.get("REMINDER_48H"), Some(&2));
    assert_eq!(stats.by_kind.get("REMINDER_12H"), Some(&1));
    assert_eq!(stats.by_kind.get("FIRST_NOTICE"), None);
}

#[tokio::test]
async fn test_store_new_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested/reminders.db");
    let config = StoreConfig {
        db_path: db_path.to_string_lossy().into_owned(),
    };
    let store = Store::new(&config).await.unwrap();
    store
        .record_send(&send(1, ReminderKind::FirstNotice, now(), 70))
        .await
        .unwrap();
    drop(store);

    let reopened = Store::new(&config).await.unwrap();
    assert!(reopened
        .already_sent(1, ReminderKind::FirstNotice)
        .await
        .unwrap());
}
