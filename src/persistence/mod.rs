//! Persistence contract for lifecycle records and notifications.
//!
//! The store is the source of truth for the invariants the state machine
//! also checks optimistically:
//! - commercial fields of a quote are immutable once it leaves `draft`
//! - at most one non-withdrawn quote per (RFQ, supplier)
//! - at most one notification per (recipient, kind, related entity)
//!
//! Every write is a compare-and-set against the status the caller last saw,
//! so a stale or replayed write is rejected instead of silently applied.

mod memory;

pub use memory::MemoryBackend;

use crate::error::Result;
use crate::lifecycle::{Dispute, Quote, QuoteStatus, Rfq, RfqStatus};
use crate::notifications::{Notification, NotificationKey};
use crate::types::{NotificationId, QuoteId, RfqId, UserId};

/// Rows written by an award, in commit order.
#[derive(Clone, Debug, PartialEq)]
pub struct AwardCommit {
    /// The awarded quote.
    pub quote: Quote,
    /// The RFQ, now matched.
    pub rfq: Rfq,
    /// Other submitted quotes on the RFQ, now rejected.
    pub rejected: Vec<Quote>,
}

/// Storage for RFQs and quotes.
pub trait TradeStore: Send + Sync {
    fn insert_rfq(&self, rfq: Rfq) -> Result<Rfq>;

    fn get_rfq(&self, id: RfqId) -> Result<Option<Rfq>>;

    fn list_rfqs_by_status(&self, status: RfqStatus) -> Result<Vec<Rfq>>;

    /// Move an RFQ from `expected` to `next`. Fails with `Conflict` if the
    /// stored status is no longer `expected`.
    fn update_rfq_status(&self, id: RfqId, expected: RfqStatus, next: RfqStatus) -> Result<Rfq>;

    /// Insert a draft or submitted quote. Fails with `DuplicateSubmission` if
    /// the supplier already has a live quote on the RFQ.
    fn insert_quote(&self, quote: Quote) -> Result<Quote>;

    fn get_quote(&self, id: QuoteId) -> Result<Option<Quote>>;

    fn list_quotes_for_rfq(&self, rfq_id: RfqId) -> Result<Vec<Quote>>;

    /// Replace a quote whose stored status is still `expected`.
    fn update_quote(&self, quote: Quote, expected: QuoteStatus) -> Result<Quote>;

    /// Atomically award a submitted quote, match its open RFQ and reject the
    /// RFQ's other submitted quotes.
    fn commit_award(&self, quote_id: QuoteId) -> Result<AwardCommit>;

    /// Record a dispute row.
    fn insert_dispute(&self, dispute: Dispute) -> Result<Dispute>;
}

/// Storage for notifications.
pub trait NotificationStore: Send + Sync {
    /// Insert unless a notification with the same key exists; returns None
    /// in that case.
    fn insert_notification(&self, notification: Notification) -> Result<Option<Notification>>;

    fn find_notification(&self, key: &NotificationKey) -> Result<Option<Notification>>;

    /// Newest first.
    fn list_notifications(&self, recipient: &UserId) -> Result<Vec<Notification>>;

    fn mark_read(&self, id: NotificationId) -> Result<Notification>;

    /// Returns how many notifications changed.
    fn mark_all_read(&self, recipient: &UserId) -> Result<usize>;
}
