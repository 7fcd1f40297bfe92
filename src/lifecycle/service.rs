//! Trade service: the only write path for RFQs and quotes.
//!
//! Every operation checks the transition table and the actor's role against
//! the freshest stored record, then hands the write to the store as a
//! compare-and-set on the status it just read. The store re-checks the
//! invariants it owns; whichever check fails first produces the error.

use super::dispute::Dispute;
use super::quote::{Quote, QuoteStatus, QuoteTerms};
use super::rfq::{NewRfq, Rfq, RfqStatus};
use super::transition::{ActorRole, LifecycleTransition, TransitionObserver};
use crate::error::{Result, TradeError};
use crate::persistence::TradeStore;
use crate::types::{Actor, EntityRef, QuoteId, RfqId, TenantContext, UserId};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle operations on top of a [`TradeStore`].
pub struct TradeService {
    store: Arc<dyn TradeStore>,
    observer: Option<Arc<dyn TransitionObserver>>,
}

impl TradeService {
    /// Create a new trade service over `store`.
    pub fn new(store: Arc<dyn TradeStore>) -> Self {
        Self {
            store,
            observer: None,
        }
    }

    /// Report every committed transition to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get the underlying store.
    pub fn store(&self) -> &Arc<dyn TradeStore> {
        &self.store
    }

    // ---- RFQs ----

    /// Create a draft RFQ owned by the context's user.
    pub fn create_rfq(&self, context: &TenantContext, input: NewRfq) -> Result<Rfq> {
        require_context(context)?;
        let now = Utc::now();
        input.validate(now).map_err(TradeError::Validation)?;

        let rfq = self.store.insert_rfq(Rfq::draft(context, input, now))?;
        info!(rfq = %rfq.id, buyer = %rfq.buyer_id, "RFQ created");
        Ok(rfq)
    }

    /// draft → in_review, by the buyer.
    pub fn submit_rfq_for_review(&self, actor: &Actor, rfq_id: RfqId) -> Result<Rfq> {
        self.move_rfq(actor, rfq_id, RfqStatus::InReview)
    }

    /// in_review → open, by the review queue or an admin.
    pub fn approve_rfq(&self, actor: &Actor, rfq_id: RfqId) -> Result<Rfq> {
        self.move_rfq(actor, rfq_id, RfqStatus::Open)
    }

    /// matched → closed.
    pub fn close_rfq(&self, actor: &Actor, rfq_id: RfqId) -> Result<Rfq> {
        self.move_rfq(actor, rfq_id, RfqStatus::Closed)
    }

    /// Expire every open RFQ whose deadline is before `now`.
    ///
    /// RFQs that changed concurrently (matched by an award in the meantime)
    /// are skipped. Returns the RFQs this call expired.
    pub fn expire_overdue_rfqs(&self, now: DateTime<Utc>) -> Result<Vec<Rfq>> {
        let mut expired = Vec::new();
        for rfq in self.store.list_rfqs_by_status(RfqStatus::Open)? {
            if !rfq.is_overdue(now) {
                continue;
            }
            match self
                .store
                .update_rfq_status(rfq.id, RfqStatus::Open, RfqStatus::Expired)
            {
                Ok(updated) => {
                    info!(rfq = %updated.id, deadline = %updated.deadline, "RFQ expired");
                    self.notify(LifecycleTransition::Rfq {
                        rfq: updated.clone(),
                        from: RfqStatus::Open,
                        actor: Actor::System,
                    });
                    expired.push(updated);
                }
                Err(TradeError::Conflict { .. }) => {
                    debug!(rfq = %rfq.id, "RFQ left open state before expiry");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(expired)
    }

    /// Load an RFQ, failing with `NotFound` if absent.
    pub fn get_rfq(&self, rfq_id: RfqId) -> Result<Rfq> {
        self.load_rfq(rfq_id)
    }

    // ---- Quotes ----

    /// Save a draft quote. The supplier may edit it until it is submitted.
    pub fn save_quote_draft(
        &self,
        supplier: &TenantContext,
        rfq_id: RfqId,
        terms: QuoteTerms,
    ) -> Result<Quote> {
        self.create_quote(supplier, rfq_id, terms, QuoteStatus::Draft)
    }

    /// Create a quote directly in `submitted`, as one write.
    pub fn submit_quote(
        &self,
        supplier: &TenantContext,
        rfq_id: RfqId,
        terms: QuoteTerms,
    ) -> Result<Quote> {
        self.create_quote(supplier, rfq_id, terms, QuoteStatus::Submitted)
    }

    /// Replace the commercial terms of a draft quote.
    pub fn update_quote_terms(
        &self,
        actor: &Actor,
        quote_id: QuoteId,
        terms: QuoteTerms,
    ) -> Result<Quote> {
        terms.validate().map_err(TradeError::Validation)?;
        let quote = self.load_quote(quote_id)?;

        if ActorRole::for_quote(actor, &quote) != ActorRole::Supplier {
            return Err(TradeError::Unauthorized(
                "only the author can edit a quote".into(),
            ));
        }
        if quote.status != QuoteStatus::Draft {
            return Err(TradeError::InvalidTransition {
                entity: EntityRef::Quote(quote.id),
                from: quote.status.to_string(),
                to: quote.status.to_string(),
                reason: "commercial terms are immutable once submitted".into(),
            });
        }

        let mut next = quote.clone();
        next.apply_terms(terms);
        let stored = self.store.update_quote(next, QuoteStatus::Draft)?;
        debug!(quote = %stored.id, total = %stored.total_price, "draft terms updated");
        Ok(stored)
    }

    /// draft → submitted, by the author, while the RFQ accepts quotes.
    pub fn submit_draft(&self, actor: &Actor, quote_id: QuoteId) -> Result<Quote> {
        let quote = self.load_quote(quote_id)?;
        let rfq = self.load_rfq(quote.rfq_id)?;
        if !rfq.accepts_quotes(Utc::now()) {
            return Err(not_accepting(&rfq));
        }
        self.move_quote(actor, quote, QuoteStatus::Submitted)
    }

    /// draft → withdrawn, by the author.
    pub fn withdraw_quote(&self, actor: &Actor, quote_id: QuoteId) -> Result<Quote> {
        let quote = self.load_quote(quote_id)?;
        self.move_quote(actor, quote, QuoteStatus::Withdrawn)
    }

    /// Reject a submitted quote.
    pub fn reject_quote(&self, actor: &Actor, quote_id: QuoteId) -> Result<Quote> {
        let quote = self.load_quote(quote_id)?;
        self.move_quote(actor, quote, QuoteStatus::Rejected)
    }

    /// Award a submitted quote. The RFQ moves to `matched` and every other
    /// submitted quote on it is rejected, in one commit.
    pub fn award_quote(&self, actor: &Actor, quote_id: QuoteId) -> Result<Quote> {
        let quote = self.load_quote(quote_id)?;
        let role = ActorRole::for_quote(actor, &quote);
        check_quote_move(&quote, QuoteStatus::Awarded, role)?;

        let rfq = self.load_rfq(quote.rfq_id)?;
        if !rfq.status.allows(RfqStatus::Matched, ActorRole::for_rfq(actor, &rfq)) {
            return Err(rfq_error(&rfq, RfqStatus::Matched, actor));
        }

        let commit = self.store.commit_award(quote_id)?;
        info!(
            quote = %commit.quote.id,
            rfq = %commit.rfq.id,
            rejected = commit.rejected.len(),
            "quote awarded"
        );

        self.notify(LifecycleTransition::Quote {
            quote: commit.quote.clone(),
            from: Some(QuoteStatus::Submitted),
            actor: actor.clone(),
        });
        for rejected in &commit.rejected {
            self.notify(LifecycleTransition::Quote {
                quote: rejected.clone(),
                from: Some(QuoteStatus::Submitted),
                actor: actor.clone(),
            });
        }
        self.notify(LifecycleTransition::Rfq {
            rfq: commit.rfq,
            from: RfqStatus::Open,
            actor: actor.clone(),
        });

        Ok(commit.quote)
    }

    /// Load a quote, failing with `NotFound` if absent.
    pub fn get_quote(&self, quote_id: QuoteId) -> Result<Quote> {
        self.load_quote(quote_id)
    }

    /// Quotes on an RFQ, oldest first.
    pub fn list_quotes_for_rfq(&self, rfq_id: RfqId) -> Result<Vec<Quote>> {
        self.store.list_quotes_for_rfq(rfq_id)
    }

    /// Record a dispute raised by the context's user.
    pub fn open_dispute(
        &self,
        context: &TenantContext,
        subject_id: impl Into<String>,
        respondent_id: UserId,
        reason: impl Into<String>,
    ) -> Result<Dispute> {
        require_context(context)?;
        if respondent_id.is_blank() || respondent_id == context.user_id {
            return Err(TradeError::Validation(
                "A dispute needs a counterparty".into(),
            ));
        }
        let dispute = self.store.insert_dispute(Dispute::open(
            subject_id,
            context.user_id.clone(),
            respondent_id,
            reason,
        ))?;
        info!(dispute = %dispute.id, respondent = %dispute.respondent_id, "dispute opened");
        Ok(dispute)
    }

    // ---- internals ----

    fn create_quote(
        &self,
        supplier: &TenantContext,
        rfq_id: RfqId,
        terms: QuoteTerms,
        status: QuoteStatus,
    ) -> Result<Quote> {
        require_context(supplier)?;
        terms.validate().map_err(TradeError::Validation)?;

        let rfq = self.load_rfq(rfq_id)?;
        if rfq.buyer_id == supplier.user_id {
            return Err(TradeError::Unauthorized(
                "buyers cannot quote on their own RFQ".into(),
            ));
        }

        // Duplicate before availability, so a supplier retrying after the
        // RFQ matched still learns the quote exists.
        let existing = self.store.list_quotes_for_rfq(rfq_id)?;
        if existing
            .iter()
            .any(|q| q.supplier_id == supplier.user_id && q.status.is_live())
        {
            debug!(rfq = %rfq_id, supplier = %supplier.user_id, "duplicate quote rejected");
            return Err(TradeError::DuplicateSubmission {
                rfq_id,
                supplier_id: supplier.user_id.clone(),
            });
        }

        let now = Utc::now();
        if !rfq.accepts_quotes(now) {
            return Err(not_accepting(&rfq));
        }

        let quote = self
            .store
            .insert_quote(Quote::new(&rfq, supplier, terms, status, now))?;
        info!(
            quote = %quote.id,
            rfq = %quote.rfq_id,
            supplier = %quote.supplier_id,
            status = %quote.status,
            "quote created"
        );
        self.notify(LifecycleTransition::Quote {
            quote: quote.clone(),
            from: None,
            actor: Actor::user(supplier.clone()),
        });
        Ok(quote)
    }

    fn move_rfq(&self, actor: &Actor, rfq_id: RfqId, next: RfqStatus) -> Result<Rfq> {
        let rfq = self.load_rfq(rfq_id)?;
        let role = ActorRole::for_rfq(actor, &rfq);
        if !rfq.status.allows(next, role) {
            return Err(rfq_error(&rfq, next, actor));
        }

        let from = rfq.status;
        let updated = self.store.update_rfq_status(rfq_id, from, next)?;
        info!(rfq = %rfq_id, from = %from, to = %next, by = ?actor.user_id(), "RFQ transition");
        self.notify(LifecycleTransition::Rfq {
            rfq: updated.clone(),
            from,
            actor: actor.clone(),
        });
        Ok(updated)
    }

    fn move_quote(&self, actor: &Actor, quote: Quote, next: QuoteStatus) -> Result<Quote> {
        let role = ActorRole::for_quote(actor, &quote);
        check_quote_move(&quote, next, role)?;

        let from = quote.status;
        let mut proposed = quote;
        proposed.status = next;
        let updated = self.store.update_quote(proposed, from)?;
        info!(quote = %updated.id, from = %from, to = %next, by = ?actor.user_id(), "quote transition");
        self.notify(LifecycleTransition::Quote {
            quote: updated.clone(),
            from: Some(from),
            actor: actor.clone(),
        });
        Ok(updated)
    }

    fn load_rfq(&self, rfq_id: RfqId) -> Result<Rfq> {
        self.store
            .get_rfq(rfq_id)?
            .ok_or(TradeError::NotFound(EntityRef::Rfq(rfq_id)))
    }

    fn load_quote(&self, quote_id: QuoteId) -> Result<Quote> {
        self.store
            .get_quote(quote_id)?
            .ok_or(TradeError::NotFound(EntityRef::Quote(quote_id)))
    }

    fn notify(&self, transition: LifecycleTransition) {
        if let Some(observer) = &self.observer {
            debug!(entity = %transition.entity(), change = %transition.describe(), "notifying observer");
            observer.on_transition(&transition);
        }
    }
}

fn require_context(context: &TenantContext) -> Result<()> {
    if context.is_valid() {
        Ok(())
    } else {
        warn!(context = %context, "rejected mutation without tenant context");
        Err(TradeError::InvalidContext(context.to_string()))
    }
}

fn check_quote_move(quote: &Quote, next: QuoteStatus, role: ActorRole) -> Result<()> {
    if !quote.status.can_transition_to(next) {
        return Err(TradeError::InvalidTransition {
            entity: EntityRef::Quote(quote.id),
            from: quote.status.to_string(),
            to: next.to_string(),
            reason: "not in the transition table".into(),
        });
    }
    if !quote.status.allows(next, role) {
        return Err(TradeError::Unauthorized(format!(
            "{:?} cannot move a quote to {}",
            role, next
        )));
    }
    Ok(())
}

fn rfq_error(rfq: &Rfq, next: RfqStatus, actor: &Actor) -> TradeError {
    if !rfq.status.can_transition_to(next) {
        return TradeError::InvalidTransition {
            entity: EntityRef::Rfq(rfq.id),
            from: rfq.status.to_string(),
            to: next.to_string(),
            reason: "not in the transition table".into(),
        };
    }
    TradeError::Unauthorized(format!(
        "{:?} cannot move an RFQ to {}",
        ActorRole::for_rfq(actor, rfq),
        next
    ))
}

fn not_accepting(rfq: &Rfq) -> TradeError {
    TradeError::InvalidTransition {
        entity: EntityRef::Rfq(rfq.id),
        from: rfq.status.to_string(),
        to: rfq.status.to_string(),
        reason: "RFQ is not accepting quotes".into(),
    }
}
