//! RFQ and quote lifecycles.
//!
//! Status tables live on the status enums; [`TradeService`] is the write
//! path that checks them, commits through the store and reports each
//! committed change to a [`TransitionObserver`].

mod dispute;
mod quote;
mod rfq;
mod service;
mod transition;

pub use dispute::{Dispute, DisputeStatus};
pub use quote::{Quote, QuoteStatus, QuoteTerms};
pub use rfq::{NewRfq, Rfq, RfqStatus};
pub use service::TradeService;
pub use transition::{ActorRole, LifecycleTransition, TransitionObserver};
