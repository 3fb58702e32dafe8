//! End-to-end delivery handling: payload in, store calls and settle calls out.

mod common;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

use common::{handler, FakeDelivery, LogCounter, RecordingDeadLetters, RecordingStore, Settle, QUEUE};
use contact_consumer::{ContactRules, Disposition, RedeliveryPolicy};

const ANA: &[u8] = br#"{"message": "{\"Nome\":\"Ana\",\"Telefone\":\"11999999999\",\"Email\":\"ana@x.com\",\"Ddd\":\"11\",\"Regiao\":\"SP\"}"}"#;

fn dead_letters() -> Arc<RecordingDeadLetters> {
    Arc::new(RecordingDeadLetters::default())
}

#[tokio::test]
async fn test_valid_message_is_stored_once_and_acked() {
    let store = Arc::new(RecordingStore::default());
    let dlq = dead_letters();
    let handler = handler(store.clone(), ContactRules::default(), RedeliveryPolicy::default(), Some(dlq.clone()));
    let delivery = FakeDelivery::new(ANA, 1);

    let before = Utc::now();
    let disposition = handler.handle(&delivery).await;
    let after = Utc::now();

    assert_eq!(disposition, Disposition::Ack);
    assert_eq!(delivery.settles(), vec![Settle::Ack]);

    let inserted = store.inserted();
    assert_eq!(inserted.len(), 1);
    let contact = &inserted[0];
    assert_eq!(contact.name, "Ana");
    assert_eq!(contact.phone.as_deref(), Some("11999999999"));
    assert_eq!(contact.email.as_deref(), Some("ana@x.com"));
    assert_eq!(contact.area_code.as_deref(), Some("11"));
    assert_eq!(contact.region.as_deref(), Some("SP"));
    assert!(contact.created_at >= before && contact.created_at <= after);
    assert!(dlq.letters().is_empty());
}

#[tokio::test]
async fn test_envelope_without_message_is_dead_lettered() {
    let counter = LogCounter::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(counter.clone()));

    let store = Arc::new(RecordingStore::default());
    let dlq = dead_letters();
    let handler = handler(store.clone(), ContactRules::default(), RedeliveryPolicy::default(), Some(dlq.clone()));
    let delivery = FakeDelivery::new(br#"{"notmessage": {}}"#, 1);

    let disposition = handler.handle(&delivery).await;

    assert_eq!(disposition, Disposition::DeadLetter);
    assert_eq!(store.attempts(), 0);
    assert_eq!(counter.count(Level::WARN), 1);
    assert_eq!(counter.count(Level::ERROR), 0);

    let letters = dlq.letters();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].queue, QUEUE);
    assert_eq!(letters[0].payload, r#"{"notmessage": {}}"#);
    assert!(letters[0].reason.contains("message"));
    // Removed from the main queue only once the dead letter is safe.
    assert_eq!(delivery.settles(), vec![Settle::Ack]);
}

#[tokio::test]
async fn test_missing_name_is_stored_in_lenient_mode() {
    let store = Arc::new(RecordingStore::default());
    let handler = handler(store.clone(), ContactRules::default(), RedeliveryPolicy::default(), Some(dead_letters()));
    let delivery = FakeDelivery::new(br#"{"message": "{\"Telefone\":\"123\"}"}"#, 1);

    assert_eq!(handler.handle(&delivery).await, Disposition::Ack);

    let inserted = store.inserted();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].name, "");
    assert_eq!(inserted[0].phone.as_deref(), Some("123"));
}

#[tokio::test]
async fn test_missing_name_is_rejected_in_strict_mode() {
    let store = Arc::new(RecordingStore::default());
    let dlq = dead_letters();
    let handler = handler(
        store.clone(),
        ContactRules { require_name: true },
        RedeliveryPolicy::default(),
        Some(dlq.clone()),
    );
    let delivery = FakeDelivery::new(br#"{"message": "{\"Telefone\":\"123\"}"}"#, 1);

    assert_eq!(handler.handle(&delivery).await, Disposition::DeadLetter);
    assert_eq!(store.attempts(), 0);
    assert_eq!(dlq.letters().len(), 1);
}

#[tokio::test]
async fn test_failing_store_never_acks() {
    let counter = LogCounter::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(counter.clone()));

    let store = Arc::new(RecordingStore::failing());
    let dlq = dead_letters();
    let policy = RedeliveryPolicy {
        max_deliver: 100,
        ..RedeliveryPolicy::default()
    };
    let handler = handler(store.clone(), ContactRules::default(), policy, Some(dlq.clone()));

    for attempt in 1..=4 {
        let delivery = FakeDelivery::new(ANA, attempt);
        let disposition = handler.handle(&delivery).await;

        assert!(matches!(disposition, Disposition::Retry(_)));
        assert!(!delivery.settles().contains(&Settle::Ack));
        assert_eq!(counter.count(Level::ERROR), attempt as usize);
    }

    assert_eq!(store.attempts(), 4);
    assert!(store.inserted().is_empty());
    assert!(dlq.letters().is_empty());
}

#[tokio::test]
async fn test_retry_backoff_grows_then_dead_letters_at_cap() {
    let store = Arc::new(RecordingStore::failing());
    let dlq = dead_letters();
    let policy = RedeliveryPolicy {
        max_deliver: 3,
        base_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_secs(10),
        dead_letter: true,
    };
    let handler = handler(store, ContactRules::default(), policy, Some(dlq.clone()));

    let first = FakeDelivery::new(ANA, 1);
    handler.handle(&first).await;
    assert_eq!(first.settles(), vec![Settle::Nak(Some(Duration::from_millis(100)))]);

    let second = FakeDelivery::new(ANA, 2);
    handler.handle(&second).await;
    assert_eq!(second.settles(), vec![Settle::Nak(Some(Duration::from_millis(200)))]);

    let last = FakeDelivery::new(ANA, 3);
    assert_eq!(handler.handle(&last).await, Disposition::DeadLetter);
    assert_eq!(last.settles(), vec![Settle::Ack]);

    let letters = dlq.letters();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].delivered, 3);
    assert!(letters[0].reason.contains("persistence failed"));
}

#[tokio::test]
async fn test_dead_letter_failure_keeps_message() {
    let store = Arc::new(RecordingStore::default());
    let dlq = Arc::new(RecordingDeadLetters {
        fail: true,
        ..Default::default()
    });
    let handler = handler(store, ContactRules::default(), RedeliveryPolicy::default(), Some(dlq));
    let delivery = FakeDelivery::new(b"not json at all", 1);

    assert_eq!(handler.handle(&delivery).await, Disposition::Retry(Duration::ZERO));
    assert_eq!(delivery.settles(), vec![Settle::Nak(None)]);
}

#[tokio::test]
async fn test_poison_message_is_terminated_without_dead_letter_queue() {
    let store = Arc::new(RecordingStore::default());
    let policy = RedeliveryPolicy {
        dead_letter: false,
        ..RedeliveryPolicy::default()
    };
    let handler = handler(store, ContactRules::default(), policy, None);
    let delivery = FakeDelivery::new(br#"{"message": null}"#, 1);

    assert_eq!(handler.handle(&delivery).await, Disposition::Discard);
    assert_eq!(delivery.settles(), vec![Settle::Term]);
}

#[tokio::test]
async fn test_client_timestamp_is_not_persisted() {
    let store = Arc::new(RecordingStore::default());
    let handler = handler(store.clone(), ContactRules::default(), RedeliveryPolicy::default(), None);
    let delivery = FakeDelivery::new(
        br#"{"message": {"Nome": "Ana", "CreatedAt": "2000-01-01T00:00:00Z"}}"#,
        1,
    );

    let before = Utc::now();
    handler.handle(&delivery).await;

    let inserted = store.inserted();
    assert_eq!(inserted.len(), 1);
    assert!(inserted[0].created_at >= before);
}
