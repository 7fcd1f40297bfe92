//! Per-user composition of the realtime and lifecycle components.

use crate::bus::{BusEvent, BusReceiver, BusSubscription, EventBus};
use crate::config::SyncConfig;
use crate::error::{ConfigError, Result, TradeError};
use crate::feed::ChangeFeed;
use crate::lifecycle::TradeService;
use crate::notifications::{Notification, NotificationDispatcher};
use crate::persistence::{NotificationStore, TradeStore};
use crate::subscriptions::{LiveState, StartOutcome, SubscriptionManager};
use crate::types::{Actor, EntityRef, NotificationId, TenantContext};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a signed-in user needs: one live channel, a bus to observe it,
/// the trade service and their notifications.
///
/// Dropping the session tears its channel down.
pub struct TenantSession {
    config: SyncConfig,
    context: Mutex<TenantContext>,
    bus: Arc<EventBus>,
    notifications: Arc<NotificationDispatcher>,
    trade: TradeService,
    /// Feeds change events into the dispatcher.
    _dispatch: BusSubscription,
    manager: SubscriptionManager,
}

impl TenantSession {
    /// Build a session and open its channel for `context`.
    ///
    /// An invalid context yields a session without a channel; call
    /// [`switch_context`](Self::switch_context) once the user is known.
    pub fn open(
        config: SyncConfig,
        context: TenantContext,
        feed: Arc<dyn ChangeFeed>,
        trade_store: Arc<dyn TradeStore>,
        notification_store: Arc<dyn NotificationStore>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let bus = Arc::new(EventBus::new());
        let notifications = Arc::new(
            NotificationDispatcher::with_cache_size(
                notification_store,
                config.notification_cache_size,
            )
            .with_bus(&bus),
        );
        let trade = TradeService::new(trade_store).with_observer(notifications.clone());

        let dispatcher = Arc::downgrade(&notifications);
        let dispatch = bus.subscribe(move |event| {
            let BusEvent::Change { event } = event else {
                return;
            };
            let Some(dispatcher) = dispatcher.upgrade() else {
                return;
            };
            if let Err(e) = dispatcher.on_change_event(event) {
                warn!(table = %event.table, error = %e, "failed to derive notification");
            }
        });

        let manager = SubscriptionManager::new(feed, bus.clone(), config.topic_prefix.clone());

        let session = Self {
            config,
            context: Mutex::new(context.clone()),
            bus,
            notifications,
            trade,
            _dispatch: dispatch,
            manager,
        };

        if context.is_valid() {
            session.notifications.set_audience(Some(context.user_id.clone()));
            session.hydrate(&context);
            let outcome = session.manager.start(&context, &session.config.watches);
            info!(context = %context, outcome = ?outcome, "session opened");
        } else {
            debug!(context = %context, "session opened without a valid context");
        }
        Ok(session)
    }

    /// Register a bus handler. It stays registered while the returned
    /// subscription is alive.
    pub fn subscribe<F>(&self, handler: F) -> BusSubscription
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(handler)
    }

    /// Bus receiver with the configured capacity.
    pub fn subscribe_channel(&self) -> BusReceiver {
        self.bus.subscribe_channel(self.config.bus_channel_capacity)
    }

    /// Point the session at another user or tenant. The old channel is torn
    /// down before the new one opens. An invalid context changes nothing.
    pub fn switch_context(&self, context: TenantContext) -> StartOutcome {
        if !context.is_valid() {
            debug!(context = %context, "ignoring switch to invalid context");
            return StartOutcome::Skipped;
        }
        let changed = {
            let mut current = self.context.lock();
            let changed = *current != context;
            *current = context.clone();
            changed
        };
        if changed {
            self.notifications.set_audience(Some(context.user_id.clone()));
            self.hydrate(&context);
        }
        self.manager.start(&context, &self.config.watches)
    }

    /// Reopen the channel after an error or timeout.
    pub fn restart(&self) -> StartOutcome {
        self.manager.restart()
    }

    /// Tear the channel down, for example on sign-out.
    pub fn stop(&self) {
        self.manager.stop();
    }

    pub fn live_state(&self) -> LiveState {
        self.manager.live_state()
    }

    pub fn context(&self) -> TenantContext {
        self.context.lock().clone()
    }

    /// The signed-in user as a lifecycle actor.
    pub fn actor(&self) -> Actor {
        Actor::user(self.context())
    }

    pub fn trade(&self) -> &TradeService {
        &self.trade
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn manager(&self) -> &SubscriptionManager {
        &self.manager
    }

    pub fn notifications(&self) -> &Arc<NotificationDispatcher> {
        &self.notifications
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The signed-in user's notifications, newest first.
    pub fn list_notifications(&self) -> Result<Vec<Notification>> {
        let context = self.require_context()?;
        self.notifications.list_notifications(&context.user_id)
    }

    /// Mark one of the signed-in user's notifications read.
    pub fn mark_read(&self, id: NotificationId) -> Result<Notification> {
        let context = self.require_context()?;
        let owned = self
            .notifications
            .list_notifications(&context.user_id)?
            .iter()
            .any(|n| n.id == id);
        if !owned {
            return Err(TradeError::NotFound(EntityRef::Notification(id)));
        }
        self.notifications.mark_read(id)
    }

    pub fn mark_all_read(&self) -> Result<usize> {
        let context = self.require_context()?;
        self.notifications.mark_all_read(&context.user_id)
    }

    /// Get the signed-in user's unread count.
    pub fn unread_count(&self) -> Result<usize> {
        let context = self.require_context()?;
        self.notifications.unread_count(&context.user_id)
    }

    fn require_context(&self) -> Result<TenantContext> {
        let context = self.context();
        if context.is_valid() {
            Ok(context)
        } else {
            Err(TradeError::InvalidContext(context.to_string()))
        }
    }

    fn hydrate(&self, context: &TenantContext) {
        match self.notifications.hydrate(&context.user_id) {
            Ok(loaded) => debug!(user = %context.user_id, loaded, "notification keys loaded"),
            Err(e) => warn!(user = %context.user_id, error = %e, "failed to load notifications"),
        }
    }
}
