//! Error handling and edge case tests.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tradesync::{
    default_watches, Actor, ChannelStatus, ConfigError, EntityRef, EventBus, LiveState,
    MemoryBackend, MemoryFeed, NewRfq, QuoteId, QuoteTerms, RfqId, StartOutcome,
    SubscriptionManager, SyncConfig, TenantContext, TenantSession, TradeError, TradeService,
};

fn session_with(feed: Arc<MemoryFeed>, backend: Arc<MemoryBackend>, user: &str) -> TenantSession {
    TenantSession::open(
        SyncConfig::default(),
        TenantContext::new("acme", user),
        feed,
        backend.clone(),
        backend,
    )
    .unwrap()
}

// --- Context errors ---

#[test]
fn test_mutations_require_context() {
    let service = TradeService::new(Arc::new(MemoryBackend::new()));
    let input = NewRfq {
        title: "Valves".into(),
        quantity: Decimal::from(1),
        target_price: None,
        deadline: Utc::now() + Duration::days(1),
    };

    let err = service
        .create_rfq(&TenantContext::new("acme", "  "), input)
        .unwrap_err();
    assert!(matches!(err, TradeError::InvalidContext(_)));
    assert!(!err.is_fatal());

    let err = service
        .submit_quote(
            &TenantContext::new("", "s1"),
            RfqId::new(),
            QuoteTerms::new(Decimal::from(1), Decimal::from(1)),
        )
        .unwrap_err();
    assert!(matches!(err, TradeError::InvalidContext(_)));
}

// --- Lookup errors ---

#[test]
fn test_unknown_records() {
    let service = TradeService::new(Arc::new(MemoryBackend::new()));
    let rfq_id = RfqId::new();
    let quote_id = QuoteId::new();

    assert!(matches!(
        service.get_rfq(rfq_id),
        Err(TradeError::NotFound(EntityRef::Rfq(id))) if id == rfq_id
    ));
    assert!(matches!(
        service.award_quote(&Actor::System, quote_id),
        Err(TradeError::NotFound(EntityRef::Quote(id))) if id == quote_id
    ));
    assert!(matches!(
        service.submit_quote(
            &TenantContext::new("acme", "s1"),
            rfq_id,
            QuoteTerms::new(Decimal::from(1), Decimal::from(1)),
        ),
        Err(TradeError::NotFound(_))
    ));
}

#[test]
fn test_rfq_input_validation() {
    let service = TradeService::new(Arc::new(MemoryBackend::new()));
    let err = service
        .create_rfq(
            &TenantContext::new("acme", "b1"),
            NewRfq {
                title: "   ".into(),
                quantity: Decimal::from(1),
                target_price: None,
                deadline: Utc::now() + Duration::days(1),
            },
        )
        .unwrap_err();
    assert!(matches!(err, TradeError::Validation(_)));
    assert_eq!(err.user_message(), "RFQ title is required");
}

// --- Storage errors ---

#[test]
fn test_storage_outage_is_fatal_and_recoverable() {
    let backend = Arc::new(MemoryBackend::new());
    let service = TradeService::new(backend.clone());

    backend.set_offline(true);
    let err = service.get_rfq(RfqId::new()).unwrap_err();
    assert!(matches!(err, TradeError::Storage(_)));
    assert!(err.is_fatal());
    assert_eq!(
        err.user_message(),
        "Something went wrong. Please try again later."
    );

    backend.set_offline(false);
    assert!(matches!(
        service.get_rfq(RfqId::new()),
        Err(TradeError::NotFound(_))
    ));
}

#[test]
fn test_session_survives_notification_store_outage() {
    let feed = Arc::new(MemoryFeed::new());
    let backend = Arc::new(MemoryBackend::with_feed(feed.clone()));
    let session = session_with(feed.clone(), backend.clone(), "b1");

    backend.set_offline(true);
    // Change arrives while storage is down; the listener logs and carries on
    feed.emit(tradesync::ChangeEvent::new(
        tradesync::Table::Quotes,
        tradesync::ChangeKind::Insert,
        serde_json::json!({"id": "q1", "buyer_id": "b1", "supplier_id": "s1", "status": "submitted"}),
    ));
    assert!(session.list_notifications().is_err());

    backend.set_offline(false);
    assert!(session.list_notifications().unwrap().is_empty());
    assert_eq!(session.live_state(), LiveState::Live);
}

// --- Feed errors ---

#[test]
fn test_open_failure_leaves_session_offline() {
    let feed = Arc::new(MemoryFeed::new());
    let backend = Arc::new(MemoryBackend::new());
    feed.fail_next_open("realtime disabled");

    let session = session_with(feed.clone(), backend, "b1");
    assert_eq!(session.live_state(), LiveState::Offline);
    assert_eq!(feed.channel_count(), 0);

    // Same context: nothing to restart, so start again explicitly
    assert_eq!(session.restart(), StartOutcome::Skipped);
    assert_eq!(
        session.switch_context(TenantContext::new("acme", "b1")),
        StartOutcome::Created
    );
    assert_eq!(session.live_state(), LiveState::Live);
}

#[test]
fn test_timeout_pauses_without_retry() {
    let feed = Arc::new(MemoryFeed::new());
    let bus = Arc::new(EventBus::new());
    let manager = SubscriptionManager::new(feed.clone(), bus.clone(), "dashboard");
    manager.start(&TenantContext::new("acme", "b1"), &default_watches());
    let receiver = bus.subscribe_channel(8);

    let id = feed.channel_ids()[0];
    feed.set_status(id, ChannelStatus::TimedOut, None).unwrap();

    assert_eq!(manager.live_state(), LiveState::Paused);
    assert_eq!(feed.opened_count(), 1);
    let events = receiver.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].as_connection().map(|c| c.status),
        Some(ChannelStatus::TimedOut)
    );
}

#[test]
fn test_teardown_failure_still_switches() {
    let feed = Arc::new(MemoryFeed::new());
    let bus = Arc::new(EventBus::new());
    let manager = SubscriptionManager::new(feed.clone(), bus, "dashboard");

    manager.start(&TenantContext::new("acme", "u1"), &default_watches());
    feed.fail_teardown(true);
    assert_eq!(
        manager.start(&TenantContext::new("acme", "u2"), &default_watches()),
        StartOutcome::Replaced
    );
    assert_eq!(feed.channel_count(), 1);
    assert_eq!(manager.current_topic().as_deref(), Some("dashboard:acme/u2"));
}

// --- Config errors ---

#[test]
fn test_config_errors() {
    assert!(matches!(
        SyncConfig::from_json(r#"{"topic_prefix": "a:b"}"#),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        SyncConfig::from_json(r#"{"notification_cache_size": 0}"#),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        SyncConfig::from_json(r#"{"watches": [{"table": "orders"}]}"#),
        Err(ConfigError::Parse(_))
    ));
}
