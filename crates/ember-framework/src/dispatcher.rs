//! Handler resolution and the dispatch pipeline.
//!
//! For every inbound message the [`Dispatcher`]:
//!
//! 1. runs each middleware in order, letting it enrich or replace the message
//! 2. resolves the single best handler over the merged registry view
//! 3. runs the before-reply hooks; any hook returning `false` cancels
//! 4. invokes the handler
//! 5. runs the after-reply hooks with the handler's reply
//! 6. sends the reply through the bot, if there is one
//!
//! A fault raised at any step is routed to exception handlers along the
//! [`FaultKind`] parent chain and no further step runs.
//!
//! Resolution picks the matched candidate with the highest weight, then the
//! highest level, then the earliest registration. A match with a non-finite
//! weight counts as no match.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{Instrument, Level, debug, error, info, span, trace, warn};

use ember_core::{
    BoxedBot, FaultKind, HandlerFault, Inbound, InboundHandler, NormalizedEvent,
    NormalizedMessage, VerifyResult,
};

use crate::handler::{EventContext, FaultContext, MessageContext};
use crate::registry::{Candidate, HandlerRegistry};

/// What happened to one dispatched item.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// No handler applied.
    NoMatch,
    /// A handler ran and its reply was sent.
    Replied,
    /// Handlers ran and there was nothing to send.
    Handled,
    /// A before-reply hook cancelled the reply.
    Cancelled,
    /// A fault was raised; `handled` tells whether any exception handler took it.
    Faulted { handled: bool },
}

/// A resolved handler and the verification result that selected it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub candidate: Candidate,
    pub verify: VerifyResult,
}

/// Resolves and runs handlers from a [`HandlerRegistry`].
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Binds the dispatcher to a bot so it can receive adapter traffic.
    pub fn bind(&self, bot: BoxedBot) -> BoundDispatcher {
        BoundDispatcher {
            dispatcher: self.clone(),
            bot,
        }
    }

    // ─── Resolution ──────────────────────────────────────────────────────────

    /// Returns the best handler for `message` without running anything.
    pub async fn resolve(&self, message: &NormalizedMessage) -> Option<Resolved> {
        let candidates: Vec<Candidate> = self
            .registry
            .candidates()
            .into_iter()
            .filter(|c| c.spec.accepts(message.is_direct, c.group.as_ref()))
            .collect();

        let verified = join_all(candidates.iter().map(|c| {
            c.spec.verify(message, &c.prefixes, c.group.as_ref())
        }))
        .await;

        candidates
            .into_iter()
            .zip(verified)
            .filter(|(candidate, verify)| {
                if verify.matched && !verify.weight.is_finite() {
                    warn!(
                        handler = %candidate.spec.display_name(),
                        weight = verify.weight,
                        "Ignoring match with non-finite weight"
                    );
                }
                verify.matched && verify.weight.is_finite()
            })
            .map(|(candidate, verify)| Resolved { candidate, verify })
            .reduce(|best, next| match rank(&next, &best) {
                Ordering::Greater => next,
                _ => best,
            })
    }

    // ─── Messages ────────────────────────────────────────────────────────────

    /// Runs the full pipeline for one message.
    pub async fn dispatch_message(
        &self,
        message: NormalizedMessage,
        bot: BoxedBot,
    ) -> DispatchOutcome {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            bot_id = %message.bot_id,
            message_id = %message.message_id,
        );
        self.run_message(message, bot).instrument(span).await
    }

    async fn run_message(&self, mut message: NormalizedMessage, bot: BoxedBot) -> DispatchOutcome {
        for middleware in self.registry.middlewares() {
            match middleware(MessageContext::new(message.clone(), bot.clone())).await {
                Ok(enriched) => message = enriched,
                Err(fault) => return self.route_fault(fault, Some(message), None, &bot).await,
            }
        }

        let Some(Resolved { candidate, verify }) = self.resolve(&message).await else {
            trace!("No handler matched");
            return DispatchOutcome::NoMatch;
        };
        debug!(
            handler = %candidate.spec.display_name(),
            owner = %candidate.owner,
            weight = verify.weight,
            level = candidate.spec.level,
            "Handler selected"
        );
        message.verify = Some(verify);
        let ctx = MessageContext::new(message, bot.clone());

        for hook in self.registry.before_reply_hooks() {
            match hook(ctx.clone()).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Reply cancelled by before-reply hook");
                    return DispatchOutcome::Cancelled;
                }
                Err(fault) => return self.route_fault(fault, Some(ctx.message), None, &bot).await,
            }
        }

        let reply = match (candidate.spec.handler)(ctx.clone()).await {
            Ok(reply) => reply.filter(|r| !r.is_empty()),
            Err(fault) => return self.route_fault(fault, Some(ctx.message), None, &bot).await,
        };

        for hook in self.registry.after_reply_hooks() {
            if let Err(fault) = hook(ctx.clone(), reply.clone()).await {
                return self.route_fault(fault, Some(ctx.message), None, &bot).await;
            }
        }

        let Some(reply) = reply else {
            return DispatchOutcome::Handled;
        };
        match bot.send(&ctx.message, &reply).await {
            Ok(message_id) => {
                info!(
                    handler = %candidate.spec.display_name(),
                    target = %ctx.message.reply_target(),
                    message_id = ?message_id,
                    "Reply sent"
                );
                DispatchOutcome::Replied
            }
            Err(e) => {
                self.route_fault(e.into(), Some(ctx.message), None, &bot)
                    .await
            }
        }
    }

    // ─── Events ──────────────────────────────────────────────────────────────

    /// Invokes every handler registered for the event's name.
    pub async fn dispatch_event(&self, event: NormalizedEvent, bot: BoxedBot) -> DispatchOutcome {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            bot_id = %event.bot_id,
            event_name = %event.event_name,
        );
        self.run_event(event, bot).instrument(span).await
    }

    async fn run_event(&self, event: NormalizedEvent, bot: BoxedBot) -> DispatchOutcome {
        let handlers = self.registry.event_handlers(&event.event_name);
        if handlers.is_empty() {
            trace!("No event handler registered");
            return DispatchOutcome::NoMatch;
        }

        let mut outcome = DispatchOutcome::Handled;
        for handler in handlers {
            let ctx = EventContext {
                event: event.clone(),
                bot: bot.clone(),
            };
            if let Err(fault) = handler(ctx).await {
                let faulted = self
                    .route_fault(fault, None, Some(event.clone()), &bot)
                    .await;
                if outcome == DispatchOutcome::Handled {
                    outcome = faulted;
                }
            }
        }
        outcome
    }

    // ─── Faults ──────────────────────────────────────────────────────────────

    /// Routes a fault to the handlers of its nearest kind.
    ///
    /// Walks `fault.kind` up to [`FaultKind::Any`] and invokes every handler
    /// registered for the first kind that has any. Faults raised by exception
    /// handlers are only logged.
    async fn route_fault(
        &self,
        fault: HandlerFault,
        message: Option<NormalizedMessage>,
        event: Option<NormalizedEvent>,
        bot: &BoxedBot,
    ) -> DispatchOutcome {
        for kind in fault.kind.chain() {
            let handlers = self.registry.exception_handlers(kind);
            if handlers.is_empty() {
                continue;
            }
            debug!(fault = %fault, handled_as = %kind, "Routing fault");
            for handler in handlers {
                let ctx = FaultContext {
                    fault: fault.clone(),
                    message: message.clone(),
                    event: event.clone(),
                    bot: bot.clone(),
                };
                if let Err(nested) = handler(ctx).await {
                    warn!(fault = %fault, error = %nested, "Exception handler failed");
                }
            }
            return DispatchOutcome::Faulted { handled: true };
        }

        match (&message, &event) {
            (Some(message), _) => error!(fault = %fault, message = %message, "Unhandled fault"),
            (None, Some(event)) => error!(fault = %fault, event = %event, "Unhandled fault"),
            (None, None) => error!(fault = %fault, "Unhandled fault"),
        }
        DispatchOutcome::Faulted { handled: false }
    }
}

/// Orders two matched results; `Greater` means `a` ranks above `b`.
fn rank(a: &Resolved, b: &Resolved) -> Ordering {
    a.verify
        .weight
        .total_cmp(&b.verify.weight)
        .then(a.candidate.spec.level.cmp(&b.candidate.spec.level))
        .then(b.candidate.index.cmp(&a.candidate.index))
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("plugins", &self.registry.plugin_ids())
            .finish()
    }
}

/// A [`Dispatcher`] paired with the bot its traffic belongs to.
#[derive(Clone)]
pub struct BoundDispatcher {
    dispatcher: Dispatcher,
    bot: BoxedBot,
}

impl BoundDispatcher {
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn bot(&self) -> &BoxedBot {
        &self.bot
    }
}

#[async_trait]
impl InboundHandler for BoundDispatcher {
    async fn handle(&self, inbound: Inbound) {
        let outcome = match inbound {
            Inbound::Message(message) => {
                self.dispatcher
                    .dispatch_message(message, self.bot.clone())
                    .await
            }
            Inbound::Event(event) => self.dispatcher.dispatch_event(event, self.bot.clone()).await,
        };
        trace!(?outcome, "Inbound dispatched");
    }
}
