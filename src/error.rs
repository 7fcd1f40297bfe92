//! Error types for lifecycle mutations, the change feed, and configuration.

use crate::types::{ChannelId, EntityRef, RfqId, UserId};
use thiserror::Error;

/// Errors returned by lifecycle mutations and the persistence layer.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("Invalid tenant context: {0}")]
    InvalidContext(String),

    #[error("Duplicate submission for RFQ {rfq_id} by supplier {supplier_id}")]
    DuplicateSubmission { rfq_id: RfqId, supplier_id: UserId },

    #[error("Invalid transition on {entity}: {from} -> {to} ({reason})")]
    InvalidTransition {
        entity: EntityRef,
        from: String,
        to: String,
        reason: String,
    },

    #[error("Conflicting write on {entity}: expected {expected}, found {found}")]
    Conflict {
        entity: EntityRef,
        expected: String,
        found: String,
    },

    #[error("Not found: {0}")]
    NotFound(EntityRef),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage unavailable: {0}")]
    Storage(String),
}

impl TradeError {
    /// Short, actionable text for end users.
    pub fn user_message(&self) -> String {
        match self {
            TradeError::InvalidContext(_) => {
                "Your session is missing company or user details. Please sign in again.".into()
            }
            TradeError::DuplicateSubmission { .. } => {
                "You have already submitted a quote for this RFQ.".into()
            }
            TradeError::InvalidTransition { entity, to, .. } => match entity {
                EntityRef::Quote(_) => format!(
                    "This quote can no longer be changed to {}. Reload to see its current status.",
                    to
                ),
                _ => format!(
                    "This request can no longer be moved to {}. Reload to see its current status.",
                    to
                ),
            },
            TradeError::Conflict { .. } => {
                "Someone else updated this record. Reload and try again.".into()
            }
            TradeError::NotFound(_) => "The record no longer exists.".into(),
            TradeError::Unauthorized(_) => "You are not allowed to perform this action.".into(),
            TradeError::Validation(msg) => msg.clone(),
            TradeError::Serialization(_) | TradeError::Storage(_) => {
                "Something went wrong. Please try again later.".into()
            }
        }
    }

    /// Business-rule violations are recoverable; only storage faults are not.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TradeError::Storage(_) | TradeError::Serialization(_))
    }
}

impl From<serde_json::Error> for TradeError {
    fn from(e: serde_json::Error) -> Self {
        TradeError::Serialization(e.to_string())
    }
}

/// Errors reported by a change feed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Failed to open channel {topic}: {reason}")]
    OpenFailed { topic: String, reason: String },

    #[error("Unknown channel: {0}")]
    UnknownChannel(ChannelId),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Result type for lifecycle and persistence operations.
pub type Result<T> = std::result::Result<T, TradeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuoteId;

    #[test]
    fn test_duplicate_message_is_actionable() {
        let err = TradeError::DuplicateSubmission {
            rfq_id: RfqId::new(),
            supplier_id: UserId::from("s1"),
        };
        assert_eq!(
            err.user_message(),
            "You have already submitted a quote for this RFQ."
        );
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_storage_errors_are_fatal() {
        assert!(TradeError::Storage("down".into()).is_fatal());
        let err = TradeError::InvalidTransition {
            entity: EntityRef::Quote(QuoteId::new()),
            from: "submitted".into(),
            to: "withdrawn".into(),
            reason: "submitted quotes are immutable".into(),
        };
        assert!(!err.is_fatal());
        assert!(err.user_message().contains("withdrawn"));
    }
}
