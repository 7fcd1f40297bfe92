//! Notification records.

use crate::types::{NotificationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a notification is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A supplier submitted a quote on the recipient's RFQ.
    QuoteReceived,
    /// The recipient's quote was awarded.
    QuoteAwarded,
    /// The recipient's quote was rejected.
    QuoteRejected,
    /// The recipient's RFQ was matched to a quote.
    RfqMatched,
    /// The recipient's RFQ passed its deadline without a match.
    RfqExpired,
    /// A dispute was opened against the recipient.
    DisputeOpened,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuoteReceived => "quote_received",
            Self::QuoteAwarded => "quote_awarded",
            Self::QuoteRejected => "quote_rejected",
            Self::RfqMatched => "rfq_matched",
            Self::RfqExpired => "rfq_expired",
            Self::DisputeOpened => "dispute_opened",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deduplication key. At most one notification exists per key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationKey {
    pub recipient_id: UserId,
    pub kind: NotificationKind,
    pub related_entity_id: String,
}

/// A user-facing notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub kind: NotificationKind,
    /// Weak reference to the RFQ, quote or dispute; lookup only.
    pub related_entity_id: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn key(&self) -> NotificationKey {
        NotificationKey {
            recipient_id: self.recipient_id.clone(),
            kind: self.kind,
            related_entity_id: self.related_entity_id.clone(),
        }
    }
}

/// A notification that has not been stored yet.
#[derive(Clone, Debug, PartialEq)]
pub struct NotificationDraft {
    pub key: NotificationKey,
    pub title: String,
    pub message: String,
}

impl NotificationDraft {
    pub fn into_notification(self, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: NotificationId::new(),
            recipient_id: self.key.recipient_id,
            kind: self.key.kind,
            related_entity_id: self.key.related_entity_id,
            title: self.title,
            message: self.message,
            read: false,
            created_at,
        }
    }
}
