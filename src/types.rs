//! Core identifiers and change-event types shared by every component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse from the canonical hyphenated form.
            pub fn parse(s: &str) -> Option<Self> {
                Uuid::parse_str(s).ok().map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a request for quotation.
    RfqId,
    "RfqId"
);
uuid_id!(
    /// Identifier of a supplier quote.
    QuoteId,
    "QuoteId"
);
uuid_id!(
    /// Identifier of a user-facing notification.
    NotificationId,
    "NotificationId"
);

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True if the identifier is empty or whitespace only.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Company (tenant) identifier supplied by the auth layer.
    TenantId
);
string_id!(
    /// User identifier supplied by the auth layer.
    UserId
);

/// Identifier of a live channel handed out by a change feed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whose data a subscription manager watches.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub user_id: UserId,
}

impl TenantContext {
    /// Create a new tenant context.
    pub fn new(tenant_id: impl Into<TenantId>, user_id: impl Into<UserId>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Both identifiers must be present for the context to be usable.
    pub fn is_valid(&self) -> bool {
        !self.tenant_id.is_blank() && !self.user_id.is_blank()
    }
}

impl fmt::Display for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.user_id)
    }
}

/// Record collections the feed can watch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Rfqs,
    Quotes,
    Notifications,
    Disputes,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Rfqs => "rfqs",
            Table::Quotes => "quotes",
            Table::Notifications => "notifications",
            Table::Disputes => "disputes",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row-level change kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A normalized row-level change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// The row after the change (before it, for deletes).
    pub record: serde_json::Value,
    /// The row before the change, when the feed provides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_record: Option<serde_json::Value>,
    pub committed_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind, record: serde_json::Value) -> Self {
        Self {
            table,
            kind,
            record,
            old_record: None,
            committed_at: Utc::now(),
        }
    }

    pub fn with_old_record(mut self, old: serde_json::Value) -> Self {
        self.old_record = Some(old);
        self
    }

    /// Read a column of the record as a string, stringifying scalars.
    pub fn field(&self, column: &str) -> Option<String> {
        column_value(&self.record, column)
    }

    /// The record's `id` column.
    pub fn record_id(&self) -> Option<String> {
        self.field("id")
    }
}

/// Column lookup used by predicates and the dispatcher.
pub(crate) fn column_value(record: &serde_json::Value, column: &str) -> Option<String> {
    match record.get(column)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Weak reference to a lifecycle entity, for errors and notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Rfq(RfqId),
    Quote(QuoteId),
    Notification(NotificationId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Rfq(id) => write!(f, "RFQ {}", id),
            EntityRef::Quote(id) => write!(f, "quote {}", id),
            EntityRef::Notification(id) => write!(f, "notification {}", id),
        }
    }
}

/// Who is performing a lifecycle mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Actor {
    /// A signed-in marketplace user (buyer or supplier depending on the record).
    User { context: TenantContext },
    /// Platform administrator.
    Admin { user_id: UserId },
    /// Automated process (review queue, matching, deadline sweep).
    System,
}

impl Actor {
    pub fn user(context: TenantContext) -> Self {
        Actor::User { context }
    }

    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Actor::Admin {
            user_id: user_id.into(),
        }
    }

    /// The acting user, if any.
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Actor::User { context } => Some(&context.user_id),
            Actor::Admin { user_id } => Some(user_id),
            Actor::System => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_validity() {
        assert!(TenantContext::new("acme", "u1").is_valid());
        assert!(!TenantContext::new("", "u1").is_valid());
        assert!(!TenantContext::new("acme", "   ").is_valid());
    }

    #[test]
    fn test_field_stringifies_scalars() {
        let event = ChangeEvent::new(
            Table::Rfqs,
            ChangeKind::Insert,
            json!({"id": "r1", "quantity": 5, "flag": true, "missing": null}),
        );
        assert_eq!(event.record_id().as_deref(), Some("r1"));
        assert_eq!(event.field("quantity").as_deref(), Some("5"));
        assert_eq!(event.field("flag").as_deref(), Some("true"));
        assert_eq!(event.field("missing"), None);
        assert_eq!(event.field("absent"), None);
    }

    #[test]
    fn test_uuid_id_roundtrip() {
        let id = QuoteId::new();
        assert_eq!(QuoteId::parse(&id.to_string()), Some(id));
        assert_eq!(QuoteId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_table_serializes_snake_case() {
        assert_eq!(serde_json::to_value(Table::Rfqs).unwrap(), json!("rfqs"));
        assert_eq!(
            serde_json::to_value(ChangeKind::Update).unwrap(),
            json!("update")
        );
    }
}
