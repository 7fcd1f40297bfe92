//! Change feed contract.
//!
//! A change feed is the backend that emits row-level changes. The
//! subscription manager opens at most one channel per tenant context on it,
//! and the feed reports back through a [`FeedSink`]:
//! - connection status transitions (`connecting`, `active`, `error`, ...)
//! - change events matching any of the channel's bound watches
//!
//! Opening is non-blocking: `open` hands back a channel id immediately and
//! the connection progresses through status callbacks. Callbacks may fire on
//! any thread, including synchronously from inside `open`.

mod memory;

pub use memory::{FeedOp, MemoryFeed};

use crate::error::FeedError;
use crate::subscriptions::{BoundWatch, ChannelStatus};
use crate::types::{ChangeEvent, ChannelId};
use std::sync::Arc;

/// What to subscribe to on one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Topic key, unique per tenant context.
    pub topic: String,
    /// Watches bound to the channel's context.
    pub watches: Vec<BoundWatch>,
}

impl ChannelSpec {
    /// True if any watch wants this event.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.watches.iter().any(|w| w.matches(event))
    }
}

type StatusCallback = Arc<dyn Fn(ChannelStatus, Option<String>) + Send + Sync>;
type ChangeCallback = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Callbacks a feed uses to report on a channel.
#[derive(Clone)]
pub struct FeedSink {
    on_status: StatusCallback,
    on_change: ChangeCallback,
}

impl FeedSink {
    pub fn new<S, C>(on_status: S, on_change: C) -> Self
    where
        S: Fn(ChannelStatus, Option<String>) + Send + Sync + 'static,
        C: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        Self {
            on_status: Arc::new(on_status),
            on_change: Arc::new(on_change),
        }
    }

    /// Report a connection status, with optional detail (error text).
    pub fn status(&self, status: ChannelStatus, detail: Option<String>) {
        (self.on_status)(status, detail)
    }

    /// Deliver a change event.
    pub fn change(&self, event: ChangeEvent) {
        (self.on_change)(event)
    }
}

impl std::fmt::Debug for FeedSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSink").finish_non_exhaustive()
    }
}

/// Backend capable of streaming row-level changes.
pub trait ChangeFeed: Send + Sync {
    /// Open a channel for `spec`. Must not block on connection establishment.
    fn open(&self, spec: ChannelSpec, sink: FeedSink) -> Result<ChannelId, FeedError>;

    /// Detach every watch from the channel.
    fn unsubscribe(&self, channel: ChannelId) -> Result<(), FeedError>;

    /// Release the channel's connection resources.
    fn release(&self, channel: ChannelId) -> Result<(), FeedError>;
}
