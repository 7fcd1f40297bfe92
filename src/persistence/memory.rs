//! In-memory backend enforcing the storage-level invariants.
//!
//! Each write runs under one table lock, queues its change events into an
//! outbox before the lock is released, and the outbox is then drained into
//! the attached feed. Listeners reached through the feed may write back into
//! the backend; those writes are queued behind the current event, so the feed
//! always sees changes in commit order.

use super::{AwardCommit, NotificationStore, TradeStore};
use crate::error::{Result, TradeError};
use crate::feed::MemoryFeed;
use crate::lifecycle::{Dispute, Quote, QuoteStatus, Rfq, RfqStatus};
use crate::notifications::{Notification, NotificationKey};
use crate::types::{ChangeEvent, ChangeKind, EntityRef, NotificationId, QuoteId, RfqId, Table, UserId};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Default)]
struct Tables {
    rfqs: HashMap<RfqId, Rfq>,
    quotes: HashMap<QuoteId, Quote>,
    /// Non-withdrawn quote per (RFQ, supplier).
    live_quotes: HashMap<(RfqId, UserId), QuoteId>,
    disputes: Vec<Dispute>,
    notifications: HashMap<NotificationId, Notification>,
    notification_keys: HashMap<NotificationKey, NotificationId>,
}

/// Change events produced by one write.
struct Changes(Vec<ChangeEvent>);

impl Changes {
    fn insert(&mut self, table: Table, row: &impl Serialize) -> Result<()> {
        self.0
            .push(ChangeEvent::new(table, ChangeKind::Insert, serde_json::to_value(row)?));
        Ok(())
    }

    fn update(&mut self, table: Table, old: &impl Serialize, new: &impl Serialize) -> Result<()> {
        self.0.push(
            ChangeEvent::new(table, ChangeKind::Update, serde_json::to_value(new)?)
                .with_old_record(serde_json::to_value(old)?),
        );
        Ok(())
    }
}

/// Lifecycle and notification storage held in process memory.
pub struct MemoryBackend {
    tables: Mutex<Tables>,
    outbox: Mutex<VecDeque<ChangeEvent>>,
    /// Held by whichever thread is draining the outbox.
    flush_lock: Mutex<()>,
    feed: Option<Arc<MemoryFeed>>,
    offline: AtomicBool,
}

impl MemoryBackend {
    /// Backend that does not publish changes anywhere.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            outbox: Mutex::new(VecDeque::new()),
            flush_lock: Mutex::new(()),
            feed: None,
            offline: AtomicBool::new(false),
        }
    }

    /// Backend that publishes every committed change to `feed`.
    pub fn with_feed(feed: Arc<MemoryFeed>) -> Self {
        Self {
            feed: Some(feed),
            ..Self::new()
        }
    }

    /// Simulate the storage service becoming unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of quotes stored, in any status.
    pub fn quote_count(&self) -> usize {
        self.tables.lock().quotes.len()
    }

    /// Disputes recorded so far.
    pub fn disputes(&self) -> Vec<Dispute> {
        self.tables.lock().disputes.clone()
    }

    fn commit<T>(&self, write: impl FnOnce(&mut Tables, &mut Changes) -> Result<T>) -> Result<T> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TradeError::Storage("backend unreachable".into()));
        }

        let value = {
            let mut tables = self.tables.lock();
            let mut changes = Changes(Vec::new());
            let value = write(&mut *tables, &mut changes)?;
            if self.feed.is_some() {
                self.outbox.lock().extend(changes.0);
            }
            value
        };

        self.flush();
        Ok(value)
    }

    fn read<T>(&self, read: impl FnOnce(&Tables) -> T) -> Result<T> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TradeError::Storage("backend unreachable".into()));
        }
        Ok(read(&*self.tables.lock()))
    }

    fn flush(&self) {
        let Some(feed) = &self.feed else {
            return;
        };
        loop {
            // A write made from inside a listener finds the lock taken by the
            // outer drain, which delivers it next.
            let Some(guard) = self.flush_lock.try_lock() else {
                return;
            };
            loop {
                let next = self.outbox.lock().pop_front();
                match next {
                    Some(event) => {
                        let receivers = feed.emit(event);
                        trace!(receivers, "flushed change");
                    }
                    None => break,
                }
            }
            drop(guard);
            if self.outbox.lock().is_empty() {
                break;
            }
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn quote_transition_error(quote: &Quote, to: QuoteStatus, reason: &str) -> TradeError {
    TradeError::InvalidTransition {
        entity: EntityRef::Quote(quote.id),
        from: quote.status.to_string(),
        to: to.to_string(),
        reason: reason.to_string(),
    }
}

/// The RFQ exists, is open and its deadline has not passed.
fn ensure_accepting_quotes(tables: &Tables, rfq_id: RfqId) -> Result<()> {
    let rfq = tables
        .rfqs
        .get(&rfq_id)
        .ok_or(TradeError::NotFound(EntityRef::Rfq(rfq_id)))?;
    if !rfq.accepts_quotes(Utc::now()) {
        return Err(TradeError::InvalidTransition {
            entity: EntityRef::Rfq(rfq.id),
            from: rfq.status.to_string(),
            to: rfq.status.to_string(),
            reason: "RFQ is not accepting quotes".into(),
        });
    }
    Ok(())
}

fn rfq_transition_error(rfq: &Rfq, to: RfqStatus, reason: &str) -> TradeError {
    TradeError::InvalidTransition {
        entity: EntityRef::Rfq(rfq.id),
        from: rfq.status.to_string(),
        to: to.to_string(),
        reason: reason.to_string(),
    }
}

impl TradeStore for MemoryBackend {
    fn insert_rfq(&self, rfq: Rfq) -> Result<Rfq> {
        self.commit(|tables, changes| {
            if tables.rfqs.contains_key(&rfq.id) {
                return Err(TradeError::Validation(format!("RFQ {} already exists", rfq.id)));
            }
            changes.insert(Table::Rfqs, &rfq)?;
            tables.rfqs.insert(rfq.id, rfq.clone());
            Ok(rfq)
        })
    }

    fn get_rfq(&self, id: RfqId) -> Result<Option<Rfq>> {
        self.read(|tables| tables.rfqs.get(&id).cloned())
    }

    fn list_rfqs_by_status(&self, status: RfqStatus) -> Result<Vec<Rfq>> {
        self.read(|tables| {
            let mut rfqs: Vec<Rfq> = tables
                .rfqs
                .values()
                .filter(|r| r.status == status)
                .cloned()
                .collect();
            rfqs.sort_by_key(|r| (r.created_at, r.id));
            rfqs
        })
    }

    fn update_rfq_status(&self, id: RfqId, expected: RfqStatus, next: RfqStatus) -> Result<Rfq> {
        self.commit(|tables, changes| {
            let stored = tables
                .rfqs
                .get_mut(&id)
                .ok_or(TradeError::NotFound(EntityRef::Rfq(id)))?;
            if stored.status != expected {
                return Err(TradeError::Conflict {
                    entity: EntityRef::Rfq(id),
                    expected: expected.to_string(),
                    found: stored.status.to_string(),
                });
            }
            if !stored.status.can_transition_to(next) {
                return Err(rfq_transition_error(stored, next, "not in the transition table"));
            }

            let old = stored.clone();
            stored.status = next;
            stored.updated_at = Utc::now();
            changes.update(Table::Rfqs, &old, &*stored)?;
            Ok(stored.clone())
        })
    }

    fn insert_quote(&self, quote: Quote) -> Result<Quote> {
        self.commit(|tables, changes| {
            if !matches!(quote.status, QuoteStatus::Draft | QuoteStatus::Submitted) {
                return Err(quote_transition_error(
                    &quote,
                    quote.status,
                    "quotes are created as draft or submitted",
                ));
            }

            let key = (quote.rfq_id, quote.supplier_id.clone());
            if tables.live_quotes.contains_key(&key) {
                debug!(rfq = %quote.rfq_id, supplier = %quote.supplier_id, "duplicate quote rejected");
                return Err(TradeError::DuplicateSubmission {
                    rfq_id: quote.rfq_id,
                    supplier_id: quote.supplier_id.clone(),
                });
            }

            ensure_accepting_quotes(tables, quote.rfq_id)?;

            changes.insert(Table::Quotes, &quote)?;
            tables.live_quotes.insert(key, quote.id);
            tables.quotes.insert(quote.id, quote.clone());
            Ok(quote)
        })
    }

    fn get_quote(&self, id: QuoteId) -> Result<Option<Quote>> {
        self.read(|tables| tables.quotes.get(&id).cloned())
    }

    fn list_quotes_for_rfq(&self, rfq_id: RfqId) -> Result<Vec<Quote>> {
        self.read(|tables| {
            let mut quotes: Vec<Quote> = tables
                .quotes
                .values()
                .filter(|q| q.rfq_id == rfq_id)
                .cloned()
                .collect();
            quotes.sort_by_key(|q| (q.created_at, q.id));
            quotes
        })
    }

    fn update_quote(&self, quote: Quote, expected: QuoteStatus) -> Result<Quote> {
        self.commit(|tables, changes| {
            let stored = tables
                .quotes
                .get(&quote.id)
                .ok_or(TradeError::NotFound(EntityRef::Quote(quote.id)))?;

            if stored.status != expected {
                return Err(TradeError::Conflict {
                    entity: EntityRef::Quote(quote.id),
                    expected: expected.to_string(),
                    found: stored.status.to_string(),
                });
            }
            if !stored.same_parties(&quote) {
                return Err(quote_transition_error(
                    stored,
                    quote.status,
                    "RFQ and parties of a quote cannot change",
                ));
            }
            if stored.status != QuoteStatus::Draft && !stored.same_commercial_terms(&quote) {
                return Err(quote_transition_error(
                    stored,
                    quote.status,
                    "commercial terms are immutable once submitted",
                ));
            }
            if stored.status != quote.status && !stored.status.can_transition_to(quote.status) {
                return Err(quote_transition_error(
                    stored,
                    quote.status,
                    "not in the transition table",
                ));
            }
            if stored.status != QuoteStatus::Draft && stored.status == quote.status {
                // Nothing a non-draft write may change; leave the row untouched.
                return Ok(stored.clone());
            }
            if stored.status == QuoteStatus::Draft && quote.status == QuoteStatus::Submitted {
                ensure_accepting_quotes(tables, quote.rfq_id)?;
            }

            let old = stored.clone();
            let mut next = quote;
            next.created_at = old.created_at;
            next.updated_at = Utc::now();
            if next.status == QuoteStatus::Submitted && old.status == QuoteStatus::Draft {
                next.submitted_at = Some(next.updated_at);
            }
            if !next.status.is_live() {
                tables.live_quotes.remove(&(next.rfq_id, next.supplier_id.clone()));
            }

            changes.update(Table::Quotes, &old, &next)?;
            tables.quotes.insert(next.id, next.clone());
            Ok(next)
        })
    }

    fn commit_award(&self, quote_id: QuoteId) -> Result<AwardCommit> {
        self.commit(|tables, changes| {
            let quote = tables
                .quotes
                .get(&quote_id)
                .cloned()
                .ok_or(TradeError::NotFound(EntityRef::Quote(quote_id)))?;
            if quote.status != QuoteStatus::Submitted {
                return Err(quote_transition_error(
                    &quote,
                    QuoteStatus::Awarded,
                    "only submitted quotes can be awarded",
                ));
            }

            let rfq = tables
                .rfqs
                .get(&quote.rfq_id)
                .cloned()
                .ok_or(TradeError::NotFound(EntityRef::Rfq(quote.rfq_id)))?;
            if rfq.status != RfqStatus::Open {
                return Err(rfq_transition_error(
                    &rfq,
                    RfqStatus::Matched,
                    "RFQ is no longer open",
                ));
            }

            let now = Utc::now();

            let mut awarded = quote.clone();
            awarded.status = QuoteStatus::Awarded;
            awarded.updated_at = now;
            changes.update(Table::Quotes, &quote, &awarded)?;

            let mut rejected = Vec::new();
            let mut others: Vec<Quote> = tables
                .quotes
                .values()
                .filter(|q| {
                    q.rfq_id == rfq.id && q.id != quote_id && q.status == QuoteStatus::Submitted
                })
                .cloned()
                .collect();
            others.sort_by_key(|q| (q.created_at, q.id));
            for other in others {
                let mut next = other.clone();
                next.status = QuoteStatus::Rejected;
                next.updated_at = now;
                changes.update(Table::Quotes, &other, &next)?;
                rejected.push(next);
            }

            let mut matched = rfq.clone();
            matched.status = RfqStatus::Matched;
            matched.updated_at = now;
            changes.update(Table::Rfqs, &rfq, &matched)?;

            tables.quotes.insert(awarded.id, awarded.clone());
            for q in &rejected {
                tables.quotes.insert(q.id, q.clone());
            }
            tables.rfqs.insert(matched.id, matched.clone());

            Ok(AwardCommit {
                quote: awarded,
                rfq: matched,
                rejected,
            })
        })
    }

    fn insert_dispute(&self, dispute: Dispute) -> Result<Dispute> {
        self.commit(|tables, changes| {
            changes.insert(Table::Disputes, &dispute)?;
            tables.disputes.push(dispute.clone());
            Ok(dispute)
        })
    }
}

impl NotificationStore for MemoryBackend {
    fn insert_notification(&self, notification: Notification) -> Result<Option<Notification>> {
        self.commit(|tables, changes| {
            let key = notification.key();
            if tables.notification_keys.contains_key(&key) {
                return Ok(None);
            }
            changes.insert(Table::Notifications, &notification)?;
            tables.notification_keys.insert(key, notification.id);
            tables
                .notifications
                .insert(notification.id, notification.clone());
            Ok(Some(notification))
        })
    }

    fn find_notification(&self, key: &NotificationKey) -> Result<Option<Notification>> {
        self.read(|tables| {
            tables
                .notification_keys
                .get(key)
                .and_then(|id| tables.notifications.get(id))
                .cloned()
        })
    }

    fn list_notifications(&self, recipient: &UserId) -> Result<Vec<Notification>> {
        self.read(|tables| {
            let mut list: Vec<Notification> = tables
                .notifications
                .values()
                .filter(|n| &n.recipient_id == recipient)
                .cloned()
                .collect();
            list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
            list
        })
    }

    fn mark_read(&self, id: NotificationId) -> Result<Notification> {
        self.commit(|tables, changes| {
            let stored = tables
                .notifications
                .get_mut(&id)
                .ok_or(TradeError::NotFound(EntityRef::Notification(id)))?;
            if !stored.read {
                let old = stored.clone();
                stored.read = true;
                changes.update(Table::Notifications, &old, &*stored)?;
            }
            Ok(stored.clone())
        })
    }

    fn mark_all_read(&self, recipient: &UserId) -> Result<usize> {
        self.commit(|tables, changes| {
            let mut ids: Vec<NotificationId> = tables
                .notifications
                .values()
                .filter(|n| &n.recipient_id == recipient && !n.read)
                .map(|n| n.id)
                .collect();
            ids.sort();
            for id in &ids {
                if let Some(stored) = tables.notifications.get_mut(id) {
                    let old = stored.clone();
                    stored.read = true;
                    changes.update(Table::Notifications, &old, &*stored)?;
                }
            }
            Ok(ids.len())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{NewRfq, QuoteTerms};
    use crate::types::TenantContext;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn open_rfq(backend: &MemoryBackend) -> Rfq {
        let buyer = TenantContext::new("buyer-co", "b1");
        let rfq = Rfq::draft(
            &buyer,
            NewRfq {
                title: "Copper wire".into(),
                quantity: Decimal::from(100),
                target_price: None,
                deadline: Utc::now() + Duration::days(3),
            },
            Utc::now(),
        );
        let rfq = backend.insert_rfq(rfq).unwrap();
        backend
            .update_rfq_status(rfq.id, RfqStatus::Draft, RfqStatus::InReview)
            .unwrap();
        backend
            .update_rfq_status(rfq.id, RfqStatus::InReview, RfqStatus::Open)
            .unwrap()
    }

    fn quote(rfq: &Rfq, supplier: &str, status: QuoteStatus) -> Quote {
        Quote::new(
            rfq,
            &TenantContext::new("supplier-co", supplier),
            QuoteTerms::new(Decimal::from(10), Decimal::from(5)),
            status,
            Utc::now(),
        )
    }

    #[test]
    fn test_rfq_status_compare_and_set() {
        let backend = MemoryBackend::new();
        let rfq = open_rfq(&backend);

        let err = backend
            .update_rfq_status(rfq.id, RfqStatus::InReview, RfqStatus::Open)
            .unwrap_err();
        assert!(matches!(err, TradeError::Conflict { .. }));

        let err = backend
            .update_rfq_status(rfq.id, RfqStatus::Open, RfqStatus::Draft)
            .unwrap_err();
        assert!(matches!(err, TradeError::InvalidTransition { .. }));
    }

    #[test]
    fn test_submitted_quote_terms_are_immutable() {
        let backend = MemoryBackend::new();
        let rfq = open_rfq(&backend);
        let stored = backend
            .insert_quote(quote(&rfq, "s1", QuoteStatus::Submitted))
            .unwrap();

        let mut tampered = stored.clone();
        tampered.apply_terms(QuoteTerms::new(Decimal::from(1), Decimal::from(5)));
        let err = backend
            .update_quote(tampered, QuoteStatus::Submitted)
            .unwrap_err();
        assert!(matches!(err, TradeError::InvalidTransition { .. }));

        assert_eq!(backend.get_quote(stored.id).unwrap().unwrap(), stored);
    }

    #[test]
    fn test_draft_cannot_be_submitted_once_rfq_matched() {
        let backend = MemoryBackend::new();
        let rfq = open_rfq(&backend);
        let draft = backend
            .insert_quote(quote(&rfq, "s2", QuoteStatus::Draft))
            .unwrap();
        let winner = backend
            .insert_quote(quote(&rfq, "s1", QuoteStatus::Submitted))
            .unwrap();
        backend.commit_award(winner.id).unwrap();

        let mut submitted = draft.clone();
        submitted.status = QuoteStatus::Submitted;
        let err = backend
            .update_quote(submitted, QuoteStatus::Draft)
            .unwrap_err();
        assert!(matches!(
            err,
            TradeError::InvalidTransition { entity: EntityRef::Rfq(id), .. } if id == rfq.id
        ));
        assert_eq!(backend.get_quote(draft.id).unwrap().unwrap(), draft);
    }

    #[test]
    fn test_quotes_rejected_after_deadline() {
        let backend = MemoryBackend::new();
        let rfq = open_rfq(&backend);
        let draft = backend
            .insert_quote(quote(&rfq, "s1", QuoteStatus::Draft))
            .unwrap();

        // Deadline passes while the RFQ is still open
        backend.tables.lock().rfqs.get_mut(&rfq.id).unwrap().deadline =
            Utc::now() - Duration::seconds(1);

        let mut submitted = draft.clone();
        submitted.status = QuoteStatus::Submitted;
        assert!(matches!(
            backend.update_quote(submitted, QuoteStatus::Draft),
            Err(TradeError::InvalidTransition { .. })
        ));
        assert!(matches!(
            backend.insert_quote(quote(&rfq, "s2", QuoteStatus::Submitted)),
            Err(TradeError::InvalidTransition { .. })
        ));
        assert_eq!(backend.quote_count(), 1);
    }

    #[test]
    fn test_submitted_quote_cannot_be_withdrawn_directly() {
        let backend = MemoryBackend::new();
        let rfq = open_rfq(&backend);
        let stored = backend
            .insert_quote(quote(&rfq, "s1", QuoteStatus::Submitted))
            .unwrap();

        let mut withdrawn = stored.clone();
        withdrawn.status = QuoteStatus::Withdrawn;
        let err = backend
            .update_quote(withdrawn, QuoteStatus::Submitted)
            .unwrap_err();
        assert!(matches!(err, TradeError::InvalidTransition { .. }));
        assert_eq!(backend.get_quote(stored.id).unwrap().unwrap(), stored);
    }

    #[test]
    fn test_one_live_quote_per_supplier() {
        let backend = MemoryBackend::new();
        let rfq = open_rfq(&backend);
        let draft = backend
            .insert_quote(quote(&rfq, "s1", QuoteStatus::Draft))
            .unwrap();

        let err = backend
            .insert_quote(quote(&rfq, "s1", QuoteStatus::Submitted))
            .unwrap_err();
        assert!(matches!(err, TradeError::DuplicateSubmission { .. }));

        // Another supplier is unaffected
        backend
            .insert_quote(quote(&rfq, "s2", QuoteStatus::Submitted))
            .unwrap();

        // Withdrawing frees the slot
        let mut withdrawn = draft.clone();
        withdrawn.status = QuoteStatus::Withdrawn;
        backend.update_quote(withdrawn, QuoteStatus::Draft).unwrap();
        backend
            .insert_quote(quote(&rfq, "s1", QuoteStatus::Submitted))
            .unwrap();
    }

    #[test]
    fn test_commit_award_matches_and_rejects_others() {
        let backend = MemoryBackend::new();
        let rfq = open_rfq(&backend);
        let winner = backend
            .insert_quote(quote(&rfq, "s1", QuoteStatus::Submitted))
            .unwrap();
        let loser = backend
            .insert_quote(quote(&rfq, "s2", QuoteStatus::Submitted))
            .unwrap();
        let draft = backend
            .insert_quote(quote(&rfq, "s3", QuoteStatus::Draft))
            .unwrap();

        let commit = backend.commit_award(winner.id).unwrap();
        assert_eq!(commit.quote.status, QuoteStatus::Awarded);
        assert_eq!(commit.rfq.status, RfqStatus::Matched);
        assert_eq!(commit.rejected.len(), 1);
        assert_eq!(commit.rejected[0].id, loser.id);

        let draft_after = backend.get_quote(draft.id).unwrap().unwrap();
        assert_eq!(draft_after.status, QuoteStatus::Draft);

        // Second award on the same RFQ fails
        let err = backend.commit_award(loser.id).unwrap_err();
        assert!(matches!(err, TradeError::InvalidTransition { .. }));
    }

    #[test]
    fn test_notification_key_is_unique() {
        let backend = MemoryBackend::new();
        let draft = crate::notifications::NotificationDraft {
            key: NotificationKey {
                recipient_id: UserId::from("b1"),
                kind: crate::notifications::NotificationKind::QuoteReceived,
                related_entity_id: "q1".into(),
            },
            title: "New quote".into(),
            message: "A supplier sent a quote".into(),
        };

        let first = backend
            .insert_notification(draft.clone().into_notification(Utc::now()))
            .unwrap();
        let second = backend
            .insert_notification(draft.clone().into_notification(Utc::now()))
            .unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(backend.list_notifications(&UserId::from("b1")).unwrap().len(), 1);
        assert_eq!(
            backend.find_notification(&draft.key).unwrap().map(|n| n.id),
            first.map(|n| n.id)
        );
    }

    #[test]
    fn test_offline_backend_reports_storage_error() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);
        let err = backend.get_rfq(RfqId::new()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_changes_reach_feed_in_commit_order() {
        use crate::feed::{ChangeFeed, ChannelSpec, FeedSink};
        use crate::subscriptions::{EventFilter, Predicate, WatchDescriptor};

        let feed = Arc::new(MemoryFeed::new());
        let backend = MemoryBackend::with_feed(Arc::clone(&feed));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let ctx = TenantContext::new("buyer-co", "b1");
        feed.open(
            ChannelSpec {
                topic: "t".into(),
                watches: vec![WatchDescriptor::new(
                    Table::Rfqs,
                    EventFilter::All,
                    Predicate::user("buyer_id"),
                )
                .bind(&ctx)
                .unwrap()],
            },
            FeedSink::new(
                |_, _| {},
                move |event: ChangeEvent| sink_seen.lock().push(event.field("status")),
            ),
        )
        .unwrap();

        open_rfq(&backend);
        assert_eq!(
            *seen.lock(),
            vec![
                Some("draft".to_string()),
                Some("in_review".to_string()),
                Some("open".to_string())
            ]
        );
    }
}
