//! Dispute rows. Only their opening is observed here; resolution belongs to
//! the escrow workflow.

use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    #[default]
    Open,
}

/// A dispute raised by one trade party against the other.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: Uuid,
    /// Order, quote or escrow the dispute is about.
    pub subject_id: String,
    pub raised_by: UserId,
    pub respondent_id: UserId,
    pub reason: String,
    #[serde(default)]
    pub status: DisputeStatus,
    pub created_at: DateTime<Utc>,
}

impl Dispute {
    pub fn open(
        subject_id: impl Into<String>,
        raised_by: UserId,
        respondent_id: UserId,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id: subject_id.into(),
            raised_by,
            respondent_id,
            reason: reason.into(),
            status: DisputeStatus::Open,
            created_at: Utc::now(),
        }
    }
}
