//! Derives notifications from lifecycle changes.

use super::types::{Notification, NotificationDraft, NotificationKey, NotificationKind};
use crate::bus::{BusEvent, EventBus};
use crate::error::Result;
use crate::lifecycle::{LifecycleTransition, QuoteStatus, RfqStatus, TransitionObserver};
use crate::persistence::NotificationStore;
use crate::types::{ChangeEvent, ChangeKind, NotificationId, Table, UserId};
use chrono::Utc;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

const DEFAULT_CACHE_SIZE: usize = 1024;

/// Turns change events and lifecycle transitions into notifications.
///
/// The same underlying change usually arrives twice, once as a transition
/// from the trade service and once as a change event from the feed, and a
/// reconnect may replay it again. Each derived notification carries a key
/// `(recipient, kind, related entity)`; keys already created are remembered
/// in a bounded cache, and the store rejects any key the cache has evicted.
pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    /// Keys known to exist in the store.
    seen: Mutex<LruCache<NotificationKey, ()>>,
    bus: Option<Weak<EventBus>>,
    /// When set, only this user's notifications are published on the bus.
    audience: RwLock<Option<UserId>>,
}

impl NotificationDispatcher {
    /// Create a dispatcher with the default key cache size.
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self::with_cache_size(store, DEFAULT_CACHE_SIZE)
    }

    /// Create a dispatcher remembering up to `cache_size` keys.
    pub fn with_cache_size(store: Arc<dyn NotificationStore>, cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            seen: Mutex::new(LruCache::new(capacity)),
            bus: None,
            audience: RwLock::new(None),
        }
    }

    /// Publish every newly created notification on `bus`.
    pub fn with_bus(mut self, bus: &Arc<EventBus>) -> Self {
        self.bus = Some(Arc::downgrade(bus));
        self
    }

    /// Restrict bus publication to `recipient`'s notifications. Others are
    /// still stored.
    pub fn set_audience(&self, recipient: Option<UserId>) {
        *self.audience.write() = recipient;
    }

    /// Create the notification a change event implies, if any.
    ///
    /// Returns `None` for unrecognized changes and for changes whose
    /// notification already exists.
    pub fn on_change_event(&self, event: &ChangeEvent) -> Result<Option<Notification>> {
        match derive_from_change(event) {
            Some(draft) => self.dispatch(draft),
            None => Ok(None),
        }
    }

    /// Create the notification a committed transition implies, if any.
    pub fn on_lifecycle_transition(
        &self,
        transition: &LifecycleTransition,
    ) -> Result<Option<Notification>> {
        match derive_from_transition(transition) {
            Some(draft) => self.dispatch(draft),
            None => Ok(None),
        }
    }

    /// Notifications for `recipient`, newest first.
    pub fn list_notifications(&self, recipient: &UserId) -> Result<Vec<Notification>> {
        self.store.list_notifications(recipient)
    }

    /// Mark one notification read.
    pub fn mark_read(&self, id: NotificationId) -> Result<Notification> {
        self.store.mark_read(id)
    }

    /// Mark everything for `recipient` read. Returns how many changed.
    pub fn mark_all_read(&self, recipient: &UserId) -> Result<usize> {
        let changed = self.store.mark_all_read(recipient)?;
        debug!(recipient = %recipient, changed, "marked all notifications read");
        Ok(changed)
    }

    /// Get unread notification count.
    pub fn unread_count(&self, recipient: &UserId) -> Result<usize> {
        Ok(self
            .store
            .list_notifications(recipient)?
            .iter()
            .filter(|n| !n.read)
            .count())
    }

    /// Seed the key cache with `recipient`'s stored notifications. Returns
    /// how many were loaded.
    pub fn hydrate(&self, recipient: &UserId) -> Result<usize> {
        let existing = self.store.list_notifications(recipient)?;
        let mut seen = self.seen.lock();
        for notification in &existing {
            seen.put(notification.key(), ());
        }
        Ok(existing.len())
    }

    fn dispatch(&self, draft: NotificationDraft) -> Result<Option<Notification>> {
        if draft.key.recipient_id.is_blank() {
            return Ok(None);
        }
        if self.seen.lock().get(&draft.key).is_some() {
            debug!(kind = %draft.key.kind, entity = %draft.key.related_entity_id, "notification already sent");
            return Ok(None);
        }

        let key = draft.key.clone();
        let created = self
            .store
            .insert_notification(draft.into_notification(Utc::now()))?;
        self.seen.lock().put(key, ());

        if let Some(notification) = &created {
            info!(
                notification = %notification.id,
                recipient = %notification.recipient_id,
                kind = %notification.kind,
                "notification created"
            );
            let audience = self.audience.read().clone();
            let for_audience = audience.map_or(true, |user| user == notification.recipient_id);
            if for_audience {
                if let Some(bus) = self.bus.as_ref().and_then(Weak::upgrade) {
                    bus.publish(BusEvent::from(notification.clone()));
                }
            }
        }
        Ok(created)
    }
}

impl TransitionObserver for NotificationDispatcher {
    fn on_transition(&self, transition: &LifecycleTransition) {
        if let Err(e) = self.on_lifecycle_transition(transition) {
            warn!(entity = %transition.entity(), error = %e, "failed to record notification");
        }
    }
}

fn quote_draft(
    status: QuoteStatus,
    quote_id: String,
    buyer_id: UserId,
    supplier_id: UserId,
) -> Option<NotificationDraft> {
    let (recipient_id, kind, title, message) = match status {
        QuoteStatus::Submitted => (
            buyer_id,
            NotificationKind::QuoteReceived,
            "New quote received",
            "A supplier submitted a quote on your RFQ.",
        ),
        QuoteStatus::Awarded => (
            supplier_id,
            NotificationKind::QuoteAwarded,
            "Quote awarded",
            "Your quote was accepted by the buyer.",
        ),
        QuoteStatus::Rejected => (
            supplier_id,
            NotificationKind::QuoteRejected,
            "Quote not selected",
            "The buyer selected another quote.",
        ),
        QuoteStatus::Draft | QuoteStatus::Withdrawn => return None,
    };
    Some(NotificationDraft {
        key: NotificationKey {
            recipient_id,
            kind,
            related_entity_id: quote_id,
        },
        title: title.into(),
        message: message.into(),
    })
}

fn rfq_draft(status: RfqStatus, rfq_id: String, buyer_id: UserId) -> Option<NotificationDraft> {
    let (kind, title, message) = match status {
        RfqStatus::Matched => (
            NotificationKind::RfqMatched,
            "RFQ matched",
            "Your RFQ was matched with a supplier quote.",
        ),
        RfqStatus::Expired => (
            NotificationKind::RfqExpired,
            "RFQ expired",
            "Your RFQ passed its deadline without a match.",
        ),
        _ => return None,
    };
    Some(NotificationDraft {
        key: NotificationKey {
            recipient_id: buyer_id,
            kind,
            related_entity_id: rfq_id,
        },
        title: title.into(),
        message: message.into(),
    })
}

fn derive_from_transition(transition: &LifecycleTransition) -> Option<NotificationDraft> {
    match transition {
        LifecycleTransition::Quote { quote, from, .. } => {
            if *from == Some(quote.status) {
                return None;
            }
            quote_draft(
                quote.status,
                quote.id.to_string(),
                quote.buyer_id.clone(),
                quote.supplier_id.clone(),
            )
        }
        LifecycleTransition::Rfq { rfq, from, .. } => {
            if *from == rfq.status {
                return None;
            }
            rfq_draft(rfq.status, rfq.id.to_string(), rfq.buyer_id.clone())
        }
    }
}

/// Parse a status column into its enum.
fn status_column<T: serde::de::DeserializeOwned>(record: &serde_json::Value) -> Option<T> {
    record
        .get("status")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn derive_from_change(event: &ChangeEvent) -> Option<NotificationDraft> {
    if event.kind == ChangeKind::Delete {
        return None;
    }
    // An update that left the status alone is not a transition.
    let status_changed = match &event.old_record {
        Some(old) => old.get("status") != event.record.get("status"),
        None => true,
    };
    if !status_changed {
        return None;
    }

    let record_id = event.record_id()?;
    let user = |column: &str| event.field(column).map(UserId::from);

    match event.table {
        Table::Quotes => quote_draft(
            status_column(&event.record)?,
            record_id,
            user("buyer_id")?,
            user("supplier_id")?,
        ),
        Table::Rfqs => rfq_draft(status_column(&event.record)?, record_id, user("buyer_id")?),
        Table::Disputes => {
            if event.field("status").as_deref() != Some("open") {
                return None;
            }
            Some(NotificationDraft {
                key: NotificationKey {
                    recipient_id: user("respondent_id")?,
                    kind: NotificationKind::DisputeOpened,
                    related_entity_id: record_id,
                },
                title: "Dispute opened".into(),
                message: "A trade partner opened a dispute with you.".into(),
            })
        }
        Table::Notifications => None,
    }
}
