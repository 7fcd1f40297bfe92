//! # Trade Sync
//!
//! Realtime subscriptions and lifecycle consistency for a multi-tenant
//! request-for-quotation marketplace.
//!
//! ## Core Concepts
//!
//! - **Subscriptions**: One live channel per signed-in user, torn down before
//!   any context switch
//! - **Bus**: Typed in-process fan-out from the channel to any number of
//!   listeners
//! - **Lifecycle**: RFQ and quote status tables, enforced again by storage
//! - **Notifications**: Derived from transitions, deduplicated per recipient,
//!   kind and entity
//!
//! ## Example
//!
//! ```ignore
//! use tradesync::{MemoryBackend, MemoryFeed, SyncConfig, TenantContext, TenantSession};
//!
//! let feed = Arc::new(MemoryFeed::new());
//! let backend = Arc::new(MemoryBackend::with_feed(feed.clone()));
//! let session = TenantSession::open(
//!     SyncConfig::default(),
//!     TenantContext::new("acme", "buyer-1"),
//!     feed,
//!     backend.clone(),
//!     backend,
//! )?;
//!
//! let _sub = session.subscribe(|event| {
//!     if let Some(change) = event.as_change() {
//!         println!("{} {}", change.table, change.kind);
//!     }
//! });
//!
//! let rfq = session.trade().create_rfq(&session.context(), new_rfq)?;
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod feed;
pub mod lifecycle;
pub mod notifications;
pub mod persistence;
pub mod session;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use bus::{BusEvent, BusReceiver, BusSubscription, ConnectionEvent, EventBus, ListenerId};
pub use config::SyncConfig;
pub use error::{ConfigError, FeedError, Result, TradeError};
pub use feed::{ChangeFeed, ChannelSpec, FeedOp, FeedSink, MemoryFeed};
pub use lifecycle::{
    ActorRole, Dispute, DisputeStatus, LifecycleTransition, NewRfq, Quote, QuoteStatus,
    QuoteTerms, Rfq, RfqStatus, TradeService, TransitionObserver,
};
pub use notifications::{
    Notification, NotificationDispatcher, NotificationDraft, NotificationKey, NotificationKind,
};
pub use persistence::{AwardCommit, MemoryBackend, NotificationStore, TradeStore};
pub use session::TenantSession;
pub use subscriptions::{
    default_watches, BoundPredicate, BoundWatch, ChannelStatus, EventFilter, LiveState,
    Predicate, StartOutcome, SubscriptionManager, WatchDescriptor,
};
pub use types::*;
