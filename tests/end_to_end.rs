//! Buyer and supplier sessions sharing one backend.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tradesync::{
    Actor, BusEvent, ChangeKind, LiveState, MemoryBackend, MemoryFeed, NewRfq, NotificationKind,
    QuoteStatus, QuoteTerms, RfqStatus, SyncConfig, Table, TenantContext, TenantSession,
    TradeError, UserId,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

struct Marketplace {
    feed: Arc<MemoryFeed>,
    backend: Arc<MemoryBackend>,
}

impl Marketplace {
    fn new() -> Self {
        init_tracing();
        let feed = Arc::new(MemoryFeed::new());
        let backend = Arc::new(MemoryBackend::with_feed(feed.clone()));
        Self { feed, backend }
    }

    fn session(&self, tenant: &str, user: &str) -> TenantSession {
        TenantSession::open(
            SyncConfig::default(),
            TenantContext::new(tenant, user),
            self.feed.clone(),
            self.backend.clone(),
            self.backend.clone(),
        )
        .unwrap()
    }
}

fn rfq_input() -> NewRfq {
    NewRfq {
        title: "Stainless fasteners".into(),
        quantity: Decimal::from(5),
        target_price: Some(Decimal::from(9)),
        deadline: Utc::now() + Duration::days(14),
    }
}

fn changes_for(events: &[BusEvent], table: Table) -> Vec<tradesync::ChangeEvent> {
    events
        .iter()
        .filter_map(|e| e.as_change())
        .filter(|c| c.table == table)
        .cloned()
        .collect()
}

#[test]
fn test_rfq_quote_award_scenario() {
    let market = Marketplace::new();
    let buyer = market.session("buyer-co", "b1");
    let supplier = market.session("supplier-co", "s1");
    assert_eq!(buyer.live_state(), LiveState::Live);
    assert_eq!(supplier.live_state(), LiveState::Live);

    // RFQ r1: draft -> in_review -> open
    let r1 = buyer.trade().create_rfq(&buyer.context(), rfq_input()).unwrap();
    assert_eq!(r1.status, RfqStatus::Draft);
    buyer.trade().submit_rfq_for_review(&buyer.actor(), r1.id).unwrap();
    let r1 = buyer.trade().approve_rfq(&Actor::System, r1.id).unwrap();
    assert_eq!(r1.status, RfqStatus::Open);

    let buyer_events = buyer.subscribe_channel();

    // Quote q1 from s1: unit price 10, quantity 5
    let q1 = supplier
        .trade()
        .submit_quote(
            &supplier.context(),
            r1.id,
            QuoteTerms::new(Decimal::from(10), Decimal::from(5)),
        )
        .unwrap();
    assert_eq!(q1.status, QuoteStatus::Submitted);
    assert_eq!(q1.total_price, Decimal::from(50));

    let events = buyer_events.drain();
    let quote_changes = changes_for(&events, Table::Quotes);
    assert_eq!(quote_changes.len(), 1);
    assert_eq!(quote_changes[0].kind, ChangeKind::Insert);
    assert_eq!(quote_changes[0].record_id(), Some(q1.id.to_string()));

    let notifications = buyer.list_notifications().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::QuoteReceived);
    assert_eq!(notifications[0].related_entity_id, q1.id.to_string());
    assert_eq!(buyer.unread_count().unwrap(), 1);

    // The notification row reached the buyer live, once
    assert_eq!(changes_for(&events, Table::Notifications).len(), 1);

    // Award
    let awarded = buyer.trade().award_quote(&buyer.actor(), q1.id).unwrap();
    assert_eq!(awarded.status, QuoteStatus::Awarded);
    assert_eq!(buyer.trade().get_rfq(r1.id).unwrap().status, RfqStatus::Matched);

    let supplier_kinds: Vec<_> = supplier
        .list_notifications()
        .unwrap()
        .iter()
        .map(|n| n.kind)
        .collect();
    assert_eq!(supplier_kinds, vec![NotificationKind::QuoteAwarded]);

    let buyer_kinds: Vec<_> = buyer
        .list_notifications()
        .unwrap()
        .iter()
        .map(|n| n.kind)
        .collect();
    assert!(buyer_kinds.contains(&NotificationKind::RfqMatched));
    assert_eq!(buyer_kinds.len(), 2);

    // Resubmission after the award
    let err = supplier
        .trade()
        .submit_quote(
            &supplier.context(),
            r1.id,
            QuoteTerms::new(Decimal::from(9), Decimal::from(5)),
        )
        .unwrap_err();
    assert!(matches!(err, TradeError::DuplicateSubmission { .. }));
    assert_eq!(
        err.user_message(),
        "You have already submitted a quote for this RFQ."
    );
}

#[test]
fn test_losing_supplier_notified_of_rejection() {
    let market = Marketplace::new();
    let buyer = market.session("buyer-co", "b1");
    let winner = market.session("supplier-co", "s1");
    let loser = market.session("other-co", "s2");

    let rfq = buyer.trade().create_rfq(&buyer.context(), rfq_input()).unwrap();
    buyer.trade().submit_rfq_for_review(&buyer.actor(), rfq.id).unwrap();
    buyer.trade().approve_rfq(&Actor::admin("ops-1"), rfq.id).unwrap();

    let terms = QuoteTerms::new(Decimal::from(10), Decimal::from(5));
    let q1 = winner
        .trade()
        .submit_quote(&winner.context(), rfq.id, terms.clone())
        .unwrap();
    let q2 = loser
        .trade()
        .submit_quote(&loser.context(), rfq.id, terms)
        .unwrap();

    buyer.trade().award_quote(&buyer.actor(), q1.id).unwrap();

    let loser_notes = loser.list_notifications().unwrap();
    assert_eq!(loser_notes.len(), 1);
    assert_eq!(loser_notes[0].kind, NotificationKind::QuoteRejected);
    assert_eq!(loser_notes[0].related_entity_id, q2.id.to_string());
}

#[test]
fn test_mark_read_flow() {
    let market = Marketplace::new();
    let buyer = market.session("buyer-co", "b1");
    let supplier = market.session("supplier-co", "s1");

    let rfq = buyer.trade().create_rfq(&buyer.context(), rfq_input()).unwrap();
    buyer.trade().submit_rfq_for_review(&buyer.actor(), rfq.id).unwrap();
    buyer.trade().approve_rfq(&Actor::System, rfq.id).unwrap();
    supplier
        .trade()
        .submit_quote(
            &supplier.context(),
            rfq.id,
            QuoteTerms::new(Decimal::from(3), Decimal::from(5)),
        )
        .unwrap();

    let note = buyer.list_notifications().unwrap().remove(0);

    // Not the supplier's to mark
    assert!(matches!(
        supplier.mark_read(note.id),
        Err(TradeError::NotFound(_))
    ));

    let read = buyer.mark_read(note.id).unwrap();
    assert!(read.read);
    assert_eq!(buyer.unread_count().unwrap(), 0);
}

#[test]
fn test_expired_rfq_notifies_buyer() {
    let market = Marketplace::new();
    let buyer = market.session("buyer-co", "b1");

    let rfq = buyer.trade().create_rfq(&buyer.context(), rfq_input()).unwrap();
    buyer.trade().submit_rfq_for_review(&buyer.actor(), rfq.id).unwrap();
    buyer.trade().approve_rfq(&Actor::System, rfq.id).unwrap();

    let expired = buyer
        .trade()
        .expire_overdue_rfqs(rfq.deadline + Duration::minutes(1))
        .unwrap();
    assert_eq!(expired.len(), 1);

    let notes = buyer.list_notifications().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::RfqExpired);
}

#[test]
fn test_dispute_reaches_respondent() {
    let market = Marketplace::new();
    let buyer = market.session("buyer-co", "b1");
    let supplier = market.session("supplier-co", "s1");
    let supplier_events = supplier.subscribe_channel();

    buyer
        .trade()
        .open_dispute(&buyer.context(), "order-7", "s1".into(), "Short shipment")
        .unwrap();

    let events = supplier_events.drain();
    assert_eq!(changes_for(&events, Table::Disputes).len(), 1);
    let badges: Vec<_> = events.iter().filter_map(|e| e.as_notification()).collect();
    assert_eq!(badges.len(), 1);
    assert_eq!(badges[0].kind, NotificationKind::DisputeOpened);
    assert_eq!(supplier.unread_count().unwrap(), 1);

    let disputes = market.backend.disputes();
    assert_eq!(disputes.len(), 1);
    assert_eq!(disputes[0].raised_by, UserId::from("b1"));
}
