//! Actor roles and transition records.

use super::quote::{Quote, QuoteStatus};
use super::rfq::{Rfq, RfqStatus};
use crate::types::{Actor, EntityRef};
use serde::{Deserialize, Serialize};

/// The part an actor plays relative to a specific record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Buyer,
    Supplier,
    Admin,
    System,
    /// A user with no stake in the record.
    Outsider,
}

impl ActorRole {
    /// Any user other than the RFQ's buyer is a prospective supplier.
    pub fn for_rfq(actor: &Actor, rfq: &Rfq) -> Self {
        match actor {
            Actor::User { context } if context.user_id == rfq.buyer_id => ActorRole::Buyer,
            Actor::User { .. } => ActorRole::Supplier,
            Actor::Admin { .. } => ActorRole::Admin,
            Actor::System => ActorRole::System,
        }
    }

    pub fn for_quote(actor: &Actor, quote: &Quote) -> Self {
        match actor {
            Actor::User { context } if context.user_id == quote.supplier_id => ActorRole::Supplier,
            Actor::User { context } if context.user_id == quote.buyer_id => ActorRole::Buyer,
            Actor::User { .. } => ActorRole::Outsider,
            Actor::Admin { .. } => ActorRole::Admin,
            Actor::System => ActorRole::System,
        }
    }
}

/// A committed status change, carrying the record as written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum LifecycleTransition {
    Rfq {
        rfq: Rfq,
        from: RfqStatus,
        actor: Actor,
    },
    Quote {
        quote: Quote,
        /// None when the quote was created directly in its current status.
        from: Option<QuoteStatus>,
        actor: Actor,
    },
}

impl LifecycleTransition {
    pub fn entity(&self) -> EntityRef {
        match self {
            LifecycleTransition::Rfq { rfq, .. } => EntityRef::Rfq(rfq.id),
            LifecycleTransition::Quote { quote, .. } => EntityRef::Quote(quote.id),
        }
    }

    pub fn actor(&self) -> &Actor {
        match self {
            LifecycleTransition::Rfq { actor, .. } | LifecycleTransition::Quote { actor, .. } => {
                actor
            }
        }
    }

    /// `from -> to`, for logs.
    pub fn describe(&self) -> String {
        match self {
            LifecycleTransition::Rfq { rfq, from, .. } => format!("{} -> {}", from, rfq.status),
            LifecycleTransition::Quote { quote, from, .. } => match from {
                Some(from) => format!("{} -> {}", from, quote.status),
                None => format!("new -> {}", quote.status),
            },
        }
    }
}

/// Receives every transition committed through the trade service.
pub trait TransitionObserver: Send + Sync {
    fn on_transition(&self, transition: &LifecycleTransition);
}
