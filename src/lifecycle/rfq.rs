//! Request-for-quotation records and their status table.

use super::transition::ActorRole;
use crate::types::{RfqId, TenantContext, TenantId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// RFQ status. Forward only: `draft → in_review → open → matched → closed`,
/// plus `open → expired` once the deadline has passed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfqStatus {
    #[default]
    Draft,
    InReview,
    Open,
    Matched,
    Closed,
    Expired,
}

impl RfqStatus {
    /// Check if transition is valid, regardless of who performs it.
    pub fn can_transition_to(&self, next: RfqStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::InReview)
                | (Self::InReview, Self::Open)
                | (Self::Open, Self::Matched)
                | (Self::Matched, Self::Closed)
                | (Self::Open, Self::Expired)
        )
    }

    /// Check if `role` may perform the transition. Buyers cannot move an RFQ
    /// past review; suppliers never move RFQs.
    pub fn allows(&self, next: RfqStatus, role: ActorRole) -> bool {
        if !self.can_transition_to(next) {
            return false;
        }
        match (self, next) {
            (Self::Draft, Self::InReview) => role == ActorRole::Buyer,
            (Self::InReview, Self::Open) | (Self::Open, Self::Expired) => {
                matches!(role, ActorRole::Admin | ActorRole::System)
            }
            (Self::Open, Self::Matched) | (Self::Matched, Self::Closed) => matches!(
                role,
                ActorRole::Buyer | ActorRole::Admin | ActorRole::System
            ),
            _ => false,
        }
    }

    /// Closed and expired RFQs never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InReview => "in_review",
            Self::Open => "open",
            Self::Matched => "matched",
            Self::Closed => "closed",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for RfqStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A buyer's sourcing request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rfq {
    pub id: RfqId,
    pub tenant_id: TenantId,
    pub buyer_id: UserId,
    pub title: String,
    pub status: RfqStatus,
    pub quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_price: Option<Decimal>,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rfq {
    /// A fresh draft owned by the context's user.
    pub fn draft(context: &TenantContext, input: NewRfq, now: DateTime<Utc>) -> Self {
        Self {
            id: RfqId::new(),
            tenant_id: context.tenant_id.clone(),
            buyer_id: context.user_id.clone(),
            title: input.title,
            status: RfqStatus::Draft,
            quantity: input.quantity,
            target_price: input.target_price,
            deadline: input.deadline,
            created_at: now,
            updated_at: now,
        }
    }

    /// Open and still before its deadline.
    pub fn accepts_quotes(&self, now: DateTime<Utc>) -> bool {
        self.status == RfqStatus::Open && now <= self.deadline
    }

    /// Deadline has passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }
}

/// Buyer input for a new RFQ.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewRfq {
    pub title: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub target_price: Option<Decimal>,
    pub deadline: DateTime<Utc>,
}

impl NewRfq {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("RFQ title is required".into());
        }
        if self.quantity <= Decimal::ZERO {
            return Err("Quantity must be greater than zero".into());
        }
        if let Some(price) = self.target_price {
            if price < Decimal::ZERO {
                return Err("Target price cannot be negative".into());
            }
        }
        if self.deadline <= now {
            return Err("Deadline must be in the future".into());
        }
        Ok(())
    }
}
