//! Watch descriptors, predicates, and channel status types.

use crate::types::{column_value, ChangeEvent, ChangeKind, Table, TenantContext};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which change kinds a watch is interested in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFilter {
    /// Every kind (`*`).
    All,
    /// Only the listed kinds.
    Only(Vec<ChangeKind>),
}

impl EventFilter {
    /// Check if the filter admits this kind of change.
    pub fn matches(&self, kind: ChangeKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(kinds) => kinds.contains(&kind),
        }
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventFilter::All => f.write_str("*"),
            EventFilter::Only(kinds) => {
                let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
                f.write_str(&names.join("|"))
            }
        }
    }
}

/// Row predicate declared against a context that is not known yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// No row filter.
    All,
    /// `column = tenant_id` of the bound context.
    ColumnEqTenant { column: String },
    /// `column = user_id` of the bound context.
    ColumnEqUser { column: String },
    /// `column = value`, independent of the context.
    ColumnEq { column: String, value: String },
}

impl Predicate {
    /// Match the column against the context's tenant.
    pub fn tenant(column: impl Into<String>) -> Self {
        Predicate::ColumnEqTenant {
            column: column.into(),
        }
    }

    /// Match the column against the context's user.
    pub fn user(column: impl Into<String>) -> Self {
        Predicate::ColumnEqUser {
            column: column.into(),
        }
    }

    /// Resolve against a context. Returns None for an invalid context so a
    /// half-configured filter can never be produced.
    pub fn bind(&self, context: &TenantContext) -> Option<BoundPredicate> {
        if !context.is_valid() {
            return None;
        }
        Some(match self {
            Predicate::All => BoundPredicate::All,
            Predicate::ColumnEqTenant { column } => BoundPredicate::Eq {
                column: column.clone(),
                value: context.tenant_id.to_string(),
            },
            Predicate::ColumnEqUser { column } => BoundPredicate::Eq {
                column: column.clone(),
                value: context.user_id.to_string(),
            },
            Predicate::ColumnEq { column, value } => BoundPredicate::Eq {
                column: column.clone(),
                value: value.clone(),
            },
        })
    }
}

/// A predicate with concrete values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundPredicate {
    All,
    Eq { column: String, value: String },
}

impl BoundPredicate {
    pub fn matches(&self, record: &serde_json::Value) -> bool {
        match self {
            BoundPredicate::All => true,
            BoundPredicate::Eq { column, value } => {
                column_value(record, column).as_deref() == Some(value.as_str())
            }
        }
    }
}

impl fmt::Display for BoundPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundPredicate::All => f.write_str("*"),
            BoundPredicate::Eq { column, value } => write!(f, "{}=eq.{}", column, value),
        }
    }
}

/// Static declaration of one table watch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchDescriptor {
    pub table: Table,
    pub events: EventFilter,
    pub predicate: Predicate,
}

impl WatchDescriptor {
    /// Create a new watch descriptor.
    pub fn new(table: Table, events: EventFilter, predicate: Predicate) -> Self {
        Self {
            table,
            events,
            predicate,
        }
    }

    /// Resolve the predicate for `context`. `None` if the context lacks the value.
    pub fn bind(&self, context: &TenantContext) -> Option<BoundWatch> {
        Some(BoundWatch {
            table: self.table,
            events: self.events.clone(),
            predicate: self.predicate.bind(context)?,
        })
    }
}

/// A watch descriptor bound to one tenant context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundWatch {
    pub table: Table,
    pub events: EventFilter,
    pub predicate: BoundPredicate,
}

impl BoundWatch {
    /// Check if the event falls under this watch.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table || !self.events.matches(event.kind) {
            return false;
        }
        if self.predicate.matches(&event.record) {
            return true;
        }
        // Deletes may only carry the old row.
        event
            .old_record
            .as_ref()
            .map(|old| self.predicate.matches(old))
            .unwrap_or(false)
    }
}

impl fmt::Display for BoundWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.table, self.events, self.predicate)
    }
}

/// The dashboard watch set: RFQs and quotes the user is party to, plus their
/// notifications and disputes raised against them.
pub fn default_watches() -> Vec<WatchDescriptor> {
    vec![
        WatchDescriptor::new(Table::Rfqs, EventFilter::All, Predicate::user("buyer_id")),
        WatchDescriptor::new(Table::Quotes, EventFilter::All, Predicate::user("buyer_id")),
        WatchDescriptor::new(
            Table::Quotes,
            EventFilter::All,
            Predicate::user("supplier_id"),
        ),
        WatchDescriptor::new(
            Table::Notifications,
            EventFilter::Only(vec![ChangeKind::Insert, ChangeKind::Update]),
            Predicate::user("recipient_id"),
        ),
        WatchDescriptor::new(
            Table::Disputes,
            EventFilter::Only(vec![ChangeKind::Insert, ChangeKind::Update]),
            Predicate::user("respondent_id"),
        ),
    ]
}

/// Status of the underlying connection as reported by the feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Connecting,
    Active,
    Error,
    TimedOut,
    Closed,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelStatus::Connecting => "connecting",
            ChannelStatus::Active => "active",
            ChannelStatus::Error => "error",
            ChannelStatus::TimedOut => "timed_out",
            ChannelStatus::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// What a call to `start` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// Invalid context or empty watch set; nothing was touched.
    Skipped,
    /// A channel for the same context already exists.
    AlreadyRunning,
    /// A new channel was opened.
    Created,
    /// The channel for a different context was torn down and a new one opened.
    Replaced,
    /// The feed refused to open a channel; a connection error was published.
    Failed,
}

/// Caller-facing summary of the live connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveState {
    /// No channel.
    Offline,
    /// Channel opened, not yet active.
    Connecting,
    /// Channel active, events flowing.
    Live,
    /// Channel reported an error, timeout or close; live updates paused.
    Paused,
}
