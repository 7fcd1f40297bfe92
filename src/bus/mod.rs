//! In-process event bus.
//!
//! Decouples the subscription manager from any number of consumers
//! (notification badge, list views, toasts) without either side holding a
//! reference to the other:
//! - `publish` delivers synchronously, in registration order
//! - listeners may subscribe or unsubscribe from inside a handler
//! - a listener sees an event only if it was registered when `publish` began
//!
//! # Example
//!
//! ```ignore
//! let bus = EventBus::new();
//! let sub = bus.subscribe(|event| {
//!     if let Some(change) = event.as_change() {
//!         println!("{} {}", change.table, change.kind);
//!     }
//! });
//! bus.publish(change_event);
//! sub.unsubscribe();
//! ```

mod broadcast;
mod types;

pub use broadcast::{BusSubscription, EventBus};
pub use types::{BusEvent, BusReceiver, ConnectionEvent, ListenerId};
