//! Realtime subscriptions for a tenant context.
//!
//! A [`SubscriptionManager`] keeps exactly one channel open on the change
//! feed for the signed-in user and forwards matching changes to the bus:
//! - each watch names a table, the change kinds it wants and a row predicate
//! - predicates are bound to the tenant context when the channel is opened
//! - a change is forwarded only if some bound watch matches it
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new(feed, bus.clone(), "dashboard");
//! let context = TenantContext::new("acme", "u1");
//!
//! match manager.start(&context, &default_watches()) {
//!     StartOutcome::Created | StartOutcome::Replaced => {}
//!     StartOutcome::AlreadyRunning | StartOutcome::Skipped => {}
//!     StartOutcome::Failed => println!("live updates unavailable"),
//! }
//!
//! // Switching users tears the old channel down before opening a new one
//! manager.start(&TenantContext::new("acme", "u2"), &default_watches());
//! manager.stop();
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    default_watches, BoundPredicate, BoundWatch, ChannelStatus, EventFilter, LiveState,
    Predicate, StartOutcome, WatchDescriptor,
};
