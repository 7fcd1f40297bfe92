//! Supplier quotes and their status table.

use super::rfq::Rfq;
use super::transition::ActorRole;
use crate::types::{QuoteId, RfqId, TenantContext, TenantId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quote status: `draft → submitted → {awarded | rejected}`, `draft → withdrawn`.
///
/// There is no way out of `submitted` for the author: a submitted quote can
/// only be awarded or rejected by the counterparty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    #[default]
    Draft,
    Submitted,
    Awarded,
    Rejected,
    Withdrawn,
}

impl QuoteStatus {
    /// Check the quote transition table.
    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Submitted)
                | (Self::Draft, Self::Withdrawn)
                | (Self::Submitted, Self::Awarded)
                | (Self::Submitted, Self::Rejected)
        )
    }

    /// Submit and withdraw belong to the author; award and reject to the
    /// counterparty.
    pub fn allows(&self, next: QuoteStatus, role: ActorRole) -> bool {
        if !self.can_transition_to(next) {
            return false;
        }
        match next {
            Self::Submitted | Self::Withdrawn => role == ActorRole::Supplier,
            Self::Awarded | Self::Rejected => matches!(
                role,
                ActorRole::Buyer | ActorRole::Admin | ActorRole::System
            ),
            Self::Draft => false,
        }
    }

    /// Awarded, rejected and withdrawn quotes never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Awarded | Self::Rejected | Self::Withdrawn)
    }

    /// Counts against the one-live-quote-per-supplier rule.
    pub fn is_live(&self) -> bool {
        *self != Self::Withdrawn
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Awarded => "awarded",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commercial terms of a quote.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteTerms {
    pub unit_price: Decimal,
    pub quantity: Decimal,
    #[serde(default)]
    pub terms: Option<String>,
}

impl QuoteTerms {
    /// Create terms without free-text conditions.
    pub fn new(unit_price: Decimal, quantity: Decimal) -> Self {
        Self {
            unit_price,
            quantity,
            terms: None,
        }
    }

    pub fn with_terms(mut self, terms: impl Into<String>) -> Self {
        self.terms = Some(terms.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.unit_price <= Decimal::ZERO {
            return Err("Unit price must be greater than zero".into());
        }
        if self.quantity <= Decimal::ZERO {
            return Err("Quantity must be greater than zero".into());
        }
        Ok(())
    }

    /// Unit price times quantity.
    pub fn total(&self) -> Decimal {
        self.unit_price * self.quantity
    }
}

/// A supplier's offer against an RFQ.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub rfq_id: RfqId,
    /// Copied from the RFQ so the buyer's channel can watch it.
    pub buyer_id: UserId,
    pub supplier_id: UserId,
    pub tenant_id: TenantId,
    pub unit_price: Decimal,
    pub quantity: Decimal,
    pub total_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms: Option<String>,
    pub status: QuoteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(
        rfq: &Rfq,
        supplier: &TenantContext,
        terms: QuoteTerms,
        status: QuoteStatus,
        now: DateTime<Utc>,
    ) -> Self {
        let mut quote = Self {
            id: QuoteId::new(),
            rfq_id: rfq.id,
            buyer_id: rfq.buyer_id.clone(),
            supplier_id: supplier.user_id.clone(),
            tenant_id: supplier.tenant_id.clone(),
            unit_price: Decimal::ZERO,
            quantity: Decimal::ZERO,
            total_price: Decimal::ZERO,
            terms: None,
            status,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        };
        quote.apply_terms(terms);
        if status == QuoteStatus::Submitted {
            quote.submitted_at = Some(now);
        }
        quote
    }

    /// Overwrite the commercial fields, keeping the total consistent.
    pub fn apply_terms(&mut self, terms: QuoteTerms) {
        self.total_price = terms.total();
        self.unit_price = terms.unit_price;
        self.quantity = terms.quantity;
        self.terms = terms.terms;
    }

    /// True if price, quantity, total and terms are identical.
    pub fn same_commercial_terms(&self, other: &Quote) -> bool {
        self.unit_price == other.unit_price
            && self.quantity == other.quantity
            && self.total_price == other.total_price
            && self.terms == other.terms
    }

    /// True if the quote belongs to the same RFQ and parties.
    pub fn same_parties(&self, other: &Quote) -> bool {
        self.rfq_id == other.rfq_id
            && self.buyer_id == other.buyer_id
            && self.supplier_id == other.supplier_id
            && self.tenant_id == other.tenant_id
    }
}
