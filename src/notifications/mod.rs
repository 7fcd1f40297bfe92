//! User-facing notifications derived from lifecycle changes.

mod dispatcher;
mod types;

pub use dispatcher::NotificationDispatcher;
pub use types::{Notification, NotificationDraft, NotificationKey, NotificationKind};
