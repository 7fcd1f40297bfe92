//! Event bus payloads and handles.

use crate::notifications::Notification;
use crate::subscriptions::ChannelStatus;
use crate::types::ChangeEvent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Everything that flows over the bus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    /// A watched row changed.
    Change { event: ChangeEvent },
    /// The live connection changed state or failed.
    Connection { event: ConnectionEvent },
    /// A notification was created.
    Notification { notification: Notification },
}

impl BusEvent {
    /// Get the change event, if this is one.
    pub fn as_change(&self) -> Option<&ChangeEvent> {
        match self {
            BusEvent::Change { event } => Some(event),
            _ => None,
        }
    }

    pub fn as_connection(&self) -> Option<&ConnectionEvent> {
        match self {
            BusEvent::Connection { event } => Some(event),
            _ => None,
        }
    }

    pub fn as_notification(&self) -> Option<&Notification> {
        match self {
            BusEvent::Notification { notification } => Some(notification),
            _ => None,
        }
    }
}

impl From<ChangeEvent> for BusEvent {
    fn from(event: ChangeEvent) -> Self {
        BusEvent::Change { event }
    }
}

impl From<ConnectionEvent> for BusEvent {
    fn from(event: ConnectionEvent) -> Self {
        BusEvent::Connection { event }
    }
}

impl From<Notification> for BusEvent {
    fn from(notification: Notification) -> Self {
        BusEvent::Notification { notification }
    }
}

/// Connection status change reported on the bus. Errors and timeouts are
/// surfaced here rather than returned to any caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub topic: String,
    pub status: ChannelStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ConnectionEvent {
    /// True for statuses that pause live updates.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self.status,
            ChannelStatus::Error | ChannelStatus::TimedOut | ChannelStatus::Closed
        )
    }
}

/// Identifies a registered listener.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bounded receiving end for listeners that consume on another thread.
///
/// Dropped from the bus once its buffer overflows or the receiver is dropped.
pub struct BusReceiver {
    pub id: ListenerId,
    pub receiver: crossbeam_channel::Receiver<BusEvent>,
}

impl BusReceiver {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<BusEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<BusEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<BusEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<BusEvent> {
        self.receiver.try_iter().collect()
    }
}
