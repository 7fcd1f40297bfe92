//! Owner of the single live channel for a tenant context.

use super::types::{BoundWatch, ChannelStatus, LiveState, StartOutcome, WatchDescriptor};
use crate::bus::{BusEvent, ConnectionEvent, EventBus};
use crate::config::channel_topic;
use crate::feed::{ChangeFeed, ChannelSpec, FeedSink};
use crate::types::{ChangeEvent, ChannelId, TenantContext};
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

/// The channel currently owned by the manager.
struct LiveChannel {
    /// Assigned once `open` returns. Callbacks may arrive before that.
    id: Option<ChannelId>,
    generation: u64,
    context: TenantContext,
    watches: Vec<WatchDescriptor>,
    bound: Vec<BoundWatch>,
    topic: String,
    status: ChannelStatus,
    /// Set on the first `active` callback.
    activated: bool,
}

#[derive(Default)]
struct State {
    /// Incremented for every channel created.
    generation: u64,
    channel: Option<LiveChannel>,
}

struct Inner {
    feed: Arc<dyn ChangeFeed>,
    bus: Arc<EventBus>,
    topic_prefix: String,
    /// Serializes start, stop and restart. Re-entrant so a bus listener may
    /// switch context from inside a callback fired during `open`.
    lifecycle: ReentrantMutex<()>,
    state: Mutex<State>,
}

/// Maintains at most one channel on the feed and forwards its events to the
/// bus.
///
/// Channel callbacks capture the generation they were created for and are
/// ignored once that channel is no longer current, so a late `active` from a
/// torn-down channel cannot revive it and its events are never forwarded.
/// No lock is held while the feed or the bus runs a callback.
pub struct SubscriptionManager {
    inner: Arc<Inner>,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new(feed: Arc<dyn ChangeFeed>, bus: Arc<EventBus>, topic_prefix: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                feed,
                bus,
                topic_prefix: topic_prefix.into(),
                lifecycle: ReentrantMutex::new(()),
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Ensure a channel exists for `context` carrying `watches`.
    ///
    /// - invalid context or no watches: nothing happens
    /// - a channel for the same context exists: nothing happens
    /// - a channel for another context exists: it is torn down first
    ///
    /// Returns once the channel is opened, not once it is active.
    pub fn start(&self, context: &TenantContext, watches: &[WatchDescriptor]) -> StartOutcome {
        let _lifecycle = self.inner.lifecycle.lock();

        if !context.is_valid() || watches.is_empty() {
            debug!(context = %context, watches = watches.len(), "skipping subscription start");
            return StartOutcome::Skipped;
        }
        let Some(bound) = watches.iter().map(|w| w.bind(context)).collect::<Option<Vec<_>>>()
        else {
            return StartOutcome::Skipped;
        };

        let replacing = {
            let state = self.inner.state.lock();
            match &state.channel {
                Some(channel) if &channel.context == context => {
                    debug!(topic = %channel.topic, "channel already running");
                    return StartOutcome::AlreadyRunning;
                }
                Some(_) => true,
                None => false,
            }
        };

        if replacing {
            self.inner.teardown();
        }

        match self.inner.create(context, watches.to_vec(), bound) {
            true if replacing => StartOutcome::Replaced,
            true => StartOutcome::Created,
            false => StartOutcome::Failed,
        }
    }

    /// Tear down the current channel, if any. Safe to call repeatedly.
    pub fn stop(&self) {
        let _lifecycle = self.inner.lifecycle.lock();
        self.inner.teardown();
    }

    /// Tear down and reopen the channel for the same context and watches.
    /// There is no automatic reconnect; this is the manual one.
    pub fn restart(&self) -> StartOutcome {
        let _lifecycle = self.inner.lifecycle.lock();

        let previous = {
            let state = self.inner.state.lock();
            state
                .channel
                .as_ref()
                .map(|ch| (ch.context.clone(), ch.watches.clone(), ch.bound.clone()))
        };
        let Some((context, watches, bound)) = previous else {
            return StartOutcome::Skipped;
        };

        info!(context = %context, "restarting channel");
        self.inner.teardown();
        if self.inner.create(&context, watches, bound) {
            StartOutcome::Created
        } else {
            StartOutcome::Failed
        }
    }

    /// Last status reported for the current channel.
    pub fn status(&self) -> Option<ChannelStatus> {
        self.inner.state.lock().channel.as_ref().map(|ch| ch.status)
    }

    /// Context of the current channel, once it has become active.
    pub fn bound_context(&self) -> Option<TenantContext> {
        self.inner
            .state
            .lock()
            .channel
            .as_ref()
            .filter(|ch| ch.activated)
            .map(|ch| ch.context.clone())
    }

    /// Topic of the current channel, if any.
    pub fn current_topic(&self) -> Option<String> {
        self.inner.state.lock().channel.as_ref().map(|ch| ch.topic.clone())
    }

    /// True while a channel exists, whatever its status.
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().channel.is_some()
    }

    /// Coarse connection state for display.
    pub fn live_state(&self) -> LiveState {
        match self.status() {
            None => LiveState::Offline,
            Some(ChannelStatus::Connecting) => LiveState::Connecting,
            Some(ChannelStatus::Active) => LiveState::Live,
            Some(ChannelStatus::Error | ChannelStatus::TimedOut | ChannelStatus::Closed) => {
                LiveState::Paused
            }
        }
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn topic_for(&self, context: &TenantContext) -> String {
        channel_topic(&self.topic_prefix, context)
    }

    /// Open a new channel. The caller holds the lifecycle lock and has torn
    /// down any previous channel. Returns false if the feed refused.
    fn create(
        self: &Arc<Self>,
        context: &TenantContext,
        watches: Vec<WatchDescriptor>,
        bound: Vec<BoundWatch>,
    ) -> bool {
        let topic = self.topic_for(context);

        // Recorded before `open`: the feed may call back synchronously.
        let generation = {
            let mut state = self.state.lock();
            state.generation += 1;
            let generation = state.generation;
            state.channel = Some(LiveChannel {
                id: None,
                generation,
                context: context.clone(),
                watches,
                bound: bound.clone(),
                topic: topic.clone(),
                status: ChannelStatus::Connecting,
                activated: false,
            });
            generation
        };

        let spec = ChannelSpec {
            topic: topic.clone(),
            watches: bound,
        };

        match self.feed.open(spec, self.sink(generation)) {
            Ok(id) => {
                let superseded = {
                    let mut state = self.state.lock();
                    match state.channel.as_mut() {
                        Some(channel) if channel.generation == generation => {
                            channel.id = Some(id);
                            false
                        }
                        _ => true,
                    }
                };
                if superseded {
                    // Stopped or replaced from inside a callback during open.
                    debug!(channel = %id, topic = %topic, generation, "channel superseded during open");
                    self.close(id, &topic);
                } else {
                    info!(channel = %id, topic = %topic, generation, "channel opened");
                }
                true
            }
            Err(e) => {
                {
                    let mut state = self.state.lock();
                    if state.channel.as_ref().map(|ch| ch.generation) == Some(generation) {
                        state.channel = None;
                    }
                }
                warn!(topic = %topic, error = %e, "failed to open channel");
                self.bus.publish(ConnectionEvent {
                    topic,
                    status: ChannelStatus::Error,
                    detail: Some(e.to_string()),
                });
                false
            }
        }
    }

    /// Forget the current channel and release it on the feed.
    fn teardown(&self) {
        let channel = self.state.lock().channel.take();
        let Some(channel) = channel else {
            return;
        };
        match channel.id {
            Some(id) => self.close(id, &channel.topic),
            None => debug!(topic = %channel.topic, "dropping channel that never finished opening"),
        }
    }

    /// Unsubscribe and release. Failures are logged; the channel is
    /// forgotten either way.
    fn close(&self, id: ChannelId, topic: &str) {
        if let Err(e) = self.feed.unsubscribe(id) {
            warn!(channel = %id, topic = %topic, error = %e, "unsubscribe failed");
        }
        if let Err(e) = self.feed.release(id) {
            warn!(channel = %id, topic = %topic, error = %e, "release failed");
        }
        info!(channel = %id, topic = %topic, "channel torn down");
    }

    fn sink(self: &Arc<Self>, generation: u64) -> FeedSink {
        let on_status = Arc::downgrade(self);
        let on_change = Arc::downgrade(self);
        FeedSink::new(
            move |status, detail| {
                if let Some(inner) = Weak::upgrade(&on_status) {
                    inner.on_status(generation, status, detail);
                }
            },
            move |event| {
                if let Some(inner) = Weak::upgrade(&on_change) {
                    inner.on_change(generation, event);
                }
            },
        )
    }

    fn on_status(&self, generation: u64, status: ChannelStatus, detail: Option<String>) {
        let topic = {
            let mut state = self.state.lock();
            match state.channel.as_mut() {
                Some(channel) if channel.generation == generation => {
                    channel.status = status;
                    if status == ChannelStatus::Active {
                        channel.activated = true;
                    }
                    channel.topic.clone()
                }
                _ => {
                    debug!(generation, status = %status, "ignoring stale status callback");
                    return;
                }
            }
        };

        match status {
            ChannelStatus::Connecting => debug!(topic = %topic, generation, "channel connecting"),
            ChannelStatus::Active => info!(topic = %topic, generation, "live updates active"),
            ChannelStatus::Error | ChannelStatus::TimedOut => warn!(
                topic = %topic,
                generation,
                status = %status,
                detail = detail.as_deref().unwrap_or(""),
                "live updates paused"
            ),
            ChannelStatus::Closed => info!(topic = %topic, generation, "channel closed by feed"),
        }

        self.bus.publish(ConnectionEvent {
            topic,
            status,
            detail,
        });
    }

    fn on_change(&self, generation: u64, event: ChangeEvent) {
        let wanted = {
            let state = self.state.lock();
            match &state.channel {
                Some(channel) if channel.generation == generation => {
                    channel.bound.iter().any(|w| w.matches(&event))
                }
                _ => false,
            }
        };

        if wanted {
            self.bus.publish(BusEvent::Change { event });
        } else {
            trace!(generation, table = %event.table, kind = %event.kind, "dropping change");
        }
    }
}
