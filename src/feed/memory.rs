//! In-process change feed.
//!
//! Routes change events written by the in-memory backend to every active
//! channel whose watches match. Connection status can progress automatically
//! (`MemoryFeed::new`) or be driven by hand (`MemoryFeed::manual`), and
//! open/teardown failures can be injected.

use super::{ChangeFeed, ChannelSpec, FeedSink};
use crate::error::FeedError;
use crate::subscriptions::ChannelStatus;
use crate::types::{ChangeEvent, ChannelId};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Released channels whose sinks stay reachable for late callbacks.
const RETIRED_CAPACITY: usize = 64;

/// Channel operations observed by the feed, in call order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedOp {
    Opened { channel: ChannelId, topic: String },
    Unsubscribed { channel: ChannelId },
    Released { channel: ChannelId },
}

struct FeedChannel {
    spec: ChannelSpec,
    sink: FeedSink,
    status: ChannelStatus,
    subscribed: bool,
}

#[derive(Default)]
struct Faults {
    open: Option<String>,
    unsubscribe: bool,
    release: bool,
}

/// Change feed living in the same process as its consumers.
pub struct MemoryFeed {
    /// Live channels, ordered by id for deterministic delivery.
    channels: Mutex<BTreeMap<ChannelId, FeedChannel>>,
    /// Sinks of the most recently released channels. A transport may still
    /// fire late callbacks.
    retired: Mutex<LruCache<ChannelId, FeedSink>>,
    next_id: AtomicU64,
    auto_activate: bool,
    ops: Mutex<Vec<FeedOp>>,
    faults: Mutex<Faults>,
}

impl MemoryFeed {
    /// Feed whose channels become active as soon as they are opened.
    pub fn new() -> Self {
        Self::with_auto_activate(true)
    }

    /// Feed whose channels stay `connecting` until `set_status` is called.
    pub fn manual() -> Self {
        Self::with_auto_activate(false)
    }

    fn with_auto_activate(auto_activate: bool) -> Self {
        Self {
            channels: Mutex::new(BTreeMap::new()),
            retired: Mutex::new(LruCache::new(
                NonZeroUsize::new(RETIRED_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
            next_id: AtomicU64::new(1),
            auto_activate,
            ops: Mutex::new(Vec::new()),
            faults: Mutex::new(Faults::default()),
        }
    }

    /// Drive a channel's connection status, invoking its sink.
    ///
    /// Works on released channels too, which models a late callback from
    /// the transport.
    pub fn set_status(
        &self,
        channel: ChannelId,
        status: ChannelStatus,
        detail: Option<String>,
    ) -> Result<(), FeedError> {
        let sink = {
            let mut channels = self.channels.lock();
            match channels.get_mut(&channel) {
                Some(ch) => {
                    ch.status = status;
                    Some(ch.sink.clone())
                }
                None => self.retired.lock().get(&channel).cloned(),
            }
        };

        match sink {
            Some(sink) => {
                sink.status(status, detail);
                Ok(())
            }
            None => Err(FeedError::UnknownChannel(channel)),
        }
    }

    /// Deliver a change to every active channel with a matching watch.
    ///
    /// Returns how many channels received the event. A channel receives an
    /// event at most once even when several of its watches match.
    pub fn emit(&self, event: ChangeEvent) -> usize {
        let sinks: Vec<FeedSink> = {
            let channels = self.channels.lock();
            channels
                .values()
                .filter(|ch| {
                    ch.subscribed && ch.status == ChannelStatus::Active && ch.spec.matches(&event)
                })
                .map(|ch| ch.sink.clone())
                .collect()
        };

        trace!(
            table = %event.table,
            kind = %event.kind,
            receivers = sinks.len(),
            "emitting change"
        );

        for sink in &sinks {
            sink.change(event.clone());
        }
        sinks.len()
    }

    /// Push a change straight into one channel's sink, bypassing watch
    /// matching and status. Reaches recently released channels too, which
    /// models a change the transport delivers after teardown.
    pub fn emit_to(&self, channel: ChannelId, event: ChangeEvent) -> Result<(), FeedError> {
        let sink = {
            let channels = self.channels.lock();
            match channels.get(&channel) {
                Some(ch) => Some(ch.sink.clone()),
                None => self.retired.lock().get(&channel).cloned(),
            }
        };
        let sink = sink.ok_or(FeedError::UnknownChannel(channel))?;
        sink.change(event);
        Ok(())
    }

    /// Make the next `open` fail with `reason`.
    pub fn fail_next_open(&self, reason: impl Into<String>) {
        self.faults.lock().open = Some(reason.into());
    }

    /// Make unsubscribe and release report errors. Release still frees the
    /// channel.
    pub fn fail_teardown(&self, fail: bool) {
        let mut faults = self.faults.lock();
        faults.unsubscribe = fail;
        faults.release = fail;
    }

    /// Number of live channels.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    /// Ids of live channels.
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.lock().keys().copied().collect()
    }

    /// Topic of a live channel.
    pub fn topic(&self, channel: ChannelId) -> Option<String> {
        self.channels.lock().get(&channel).map(|ch| ch.spec.topic.clone())
    }

    /// Spec of a live channel.
    pub fn spec(&self, channel: ChannelId) -> Option<ChannelSpec> {
        self.channels.lock().get(&channel).map(|ch| ch.spec.clone())
    }

    /// Status of a live channel.
    pub fn status(&self, channel: ChannelId) -> Option<ChannelStatus> {
        self.channels.lock().get(&channel).map(|ch| ch.status)
    }

    /// Every channel operation so far.
    pub fn ops(&self) -> Vec<FeedOp> {
        self.ops.lock().clone()
    }

    /// How many channels were ever opened.
    pub fn opened_count(&self) -> usize {
        self.ops
            .lock()
            .iter()
            .filter(|op| matches!(op, FeedOp::Opened { .. }))
            .count()
    }
}

impl Default for MemoryFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed for MemoryFeed {
    fn open(&self, spec: ChannelSpec, sink: FeedSink) -> Result<ChannelId, FeedError> {
        if let Some(reason) = self.faults.lock().open.take() {
            return Err(FeedError::OpenFailed {
                topic: spec.topic,
                reason,
            });
        }

        let id = ChannelId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let topic = spec.topic.clone();
        let initial = if self.auto_activate {
            ChannelStatus::Active
        } else {
            ChannelStatus::Connecting
        };

        self.channels.lock().insert(
            id,
            FeedChannel {
                spec,
                sink: sink.clone(),
                status: initial,
                subscribed: true,
            },
        );
        self.ops.lock().push(FeedOp::Opened {
            channel: id,
            topic: topic.clone(),
        });
        debug!(channel = %id, topic = %topic, "channel opened");

        sink.status(ChannelStatus::Connecting, None);
        if self.auto_activate {
            sink.status(ChannelStatus::Active, None);
        }

        Ok(id)
    }

    fn unsubscribe(&self, channel: ChannelId) -> Result<(), FeedError> {
        let mut channels = self.channels.lock();
        let ch = channels
            .get_mut(&channel)
            .ok_or(FeedError::UnknownChannel(channel))?;
        if self.faults.lock().unsubscribe {
            return Err(FeedError::Transport("unsubscribe rejected".into()));
        }
        ch.subscribed = false;
        self.ops.lock().push(FeedOp::Unsubscribed { channel });
        Ok(())
    }

    fn release(&self, channel: ChannelId) -> Result<(), FeedError> {
        let removed = self
            .channels
            .lock()
            .remove(&channel)
            .ok_or(FeedError::UnknownChannel(channel))?;
        self.ops.lock().push(FeedOp::Released { channel });
        self.retired.lock().put(channel, removed.sink.clone());
        debug!(channel = %channel, topic = %removed.spec.topic, "channel released");

        removed.sink.status(ChannelStatus::Closed, None);

        if self.faults.lock().release {
            return Err(FeedError::Transport("release reported an error".into()));
        }
        Ok(())
    }
}
