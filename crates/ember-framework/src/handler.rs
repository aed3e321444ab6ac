//! Handler contexts, return-value conversion and type-erased handler types.
//!
//! Handlers are plain async closures. Their return values are converted
//! through [`IntoReply`] (message handlers) or [`IntoHandled`] (event and
//! exception handlers), so a handler can return `()`, a `String`, a
//! [`Reply`], an `Option` of those or a `Result` whose error converts into a
//! [`HandlerFault`].
//!
//! ```rust,ignore
//! factory.on_message(
//!     HandlerSpec::builder()
//!         .keywords(["ping"])
//!         .handler(|ctx: MessageContext| async move {
//!             format!("pong, {}", ctx.message.sender.nickname)
//!         }),
//! );
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use ember_core::{
    BoxedBot, HandlerFault, HandlerResult, Keypoint, NormalizedEvent, NormalizedMessage, Reply,
    VerifyResult,
};

// ============================================================================
// Contexts
// ============================================================================

/// What a message handler, middleware or reply hook receives.
#[derive(Clone)]
pub struct MessageContext {
    pub message: NormalizedMessage,
    pub bot: BoxedBot,
}

impl MessageContext {
    pub fn new(message: NormalizedMessage, bot: BoxedBot) -> Self {
        Self { message, bot }
    }

    /// Normalized text of the message.
    pub fn text(&self) -> &str {
        self.message.text()
    }

    /// Verification result attached by the dispatcher.
    pub fn verify(&self) -> Option<&VerifyResult> {
        self.message.verify.as_ref()
    }

    /// Keypoint captured while verifying, if any.
    pub fn keypoint(&self) -> Option<&Keypoint> {
        self.verify().and_then(|v| v.keypoint.as_ref())
    }

    /// Sends `reply` right away, outside the normal reply flow.
    pub async fn send(&self, reply: impl Into<Reply>) -> HandlerResult<Option<String>> {
        Ok(self.bot.send(&self.message, &reply.into()).await?)
    }
}

/// What an event handler receives.
#[derive(Clone)]
pub struct EventContext {
    pub event: NormalizedEvent,
    pub bot: BoxedBot,
}

/// What an exception handler receives.
#[derive(Clone)]
pub struct FaultContext {
    pub fault: HandlerFault,
    /// The message being dispatched when the fault was raised.
    pub message: Option<NormalizedMessage>,
    /// The event being dispatched when the fault was raised.
    pub event: Option<NormalizedEvent>,
    pub bot: BoxedBot,
}

// ============================================================================
// IntoReply / IntoHandled
// ============================================================================

/// Converts a message handler's return value into an optional reply.
pub trait IntoReply: Send {
    fn into_reply(self) -> HandlerResult<Option<Reply>>;
}

impl IntoReply for () {
    fn into_reply(self) -> HandlerResult<Option<Reply>> {
        Ok(None)
    }
}

impl IntoReply for Reply {
    fn into_reply(self) -> HandlerResult<Option<Reply>> {
        Ok(Some(self))
    }
}

impl IntoReply for String {
    fn into_reply(self) -> HandlerResult<Option<Reply>> {
        Ok(Some(Reply::text(self)))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> HandlerResult<Option<Reply>> {
        Ok(Some(Reply::text(self)))
    }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> HandlerResult<Option<Reply>> {
        match self {
            Some(inner) => inner.into_reply(),
            None => Ok(None),
        }
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<HandlerFault> + Send,
{
    fn into_reply(self) -> HandlerResult<Option<Reply>> {
        self.map_err(Into::<HandlerFault>::into)?.into_reply()
    }
}

/// Converts an event or exception handler's return value.
pub trait IntoHandled: Send {
    fn into_handled(self) -> HandlerResult<()>;
}

impl IntoHandled for () {
    fn into_handled(self) -> HandlerResult<()> {
        Ok(())
    }
}

impl<E: Into<HandlerFault> + Send> IntoHandled for Result<(), E> {
    fn into_handled(self) -> HandlerResult<()> {
        self.map_err(Into::into)
    }
}

// ============================================================================
// Boxed handlers
// ============================================================================

pub type BoxedMessageHandler =
    Arc<dyn Fn(MessageContext) -> BoxFuture<'static, HandlerResult<Option<Reply>>> + Send + Sync>;

pub type BoxedEventHandler =
    Arc<dyn Fn(EventContext) -> BoxFuture<'static, HandlerResult<()>> + Send + Sync>;

pub type BoxedFaultHandler =
    Arc<dyn Fn(FaultContext) -> BoxFuture<'static, HandlerResult<()>> + Send + Sync>;

/// Runs before the handler; returning `false` cancels the reply.
pub type BoxedBeforeHook =
    Arc<dyn Fn(MessageContext) -> BoxFuture<'static, HandlerResult<bool>> + Send + Sync>;

/// Runs after the handler with the reply about to be sent.
pub type BoxedAfterHook =
    Arc<dyn Fn(MessageContext, Option<Reply>) -> BoxFuture<'static, HandlerResult<()>> + Send + Sync>;

/// Enriches or replaces a message before resolution.
pub type BoxedMiddleware = Arc<
    dyn Fn(MessageContext) -> BoxFuture<'static, HandlerResult<NormalizedMessage>> + Send + Sync,
>;

/// Custom verification function for a [`HandlerSpec`](crate::spec::HandlerSpec).
///
/// Receives the message and the prefix set of the handler's owner.
pub type BoxedVerify = Arc<
    dyn Fn(NormalizedMessage, Arc<[String]>) -> BoxFuture<'static, VerifyResult> + Send + Sync,
>;

/// Plugin install/uninstall hook.
pub type BoxedLifecycleHook = Arc<dyn Fn() -> BoxFuture<'static, HandlerResult<()>> + Send + Sync>;

pub fn into_message_handler<F, Fut, R>(f: F) -> BoxedMessageHandler
where
    F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + 'static,
{
    Arc::new(move |ctx| {
        let fut = f(ctx);
        async move { fut.await.into_reply() }.boxed()
    })
}

pub fn into_event_handler<F, Fut, R>(f: F) -> BoxedEventHandler
where
    F: Fn(EventContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandled + 'static,
{
    Arc::new(move |ctx| {
        let fut = f(ctx);
        async move { fut.await.into_handled() }.boxed()
    })
}

pub fn into_fault_handler<F, Fut, R>(f: F) -> BoxedFaultHandler
where
    F: Fn(FaultContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandled + 'static,
{
    Arc::new(move |ctx| {
        let fut = f(ctx);
        async move { fut.await.into_handled() }.boxed()
    })
}

pub fn into_before_hook<F, Fut>(f: F) -> BoxedBeforeHook
where
    F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<bool>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

pub fn into_after_hook<F, Fut, R>(f: F) -> BoxedAfterHook
where
    F: Fn(MessageContext, Option<Reply>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHandled + 'static,
{
    Arc::new(move |ctx, reply| {
        let fut = f(ctx, reply);
        async move { fut.await.into_handled() }.boxed()
    })
}

pub fn into_middleware<F, Fut>(f: F) -> BoxedMiddleware
where
    F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<NormalizedMessage>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

pub fn into_verify<F, Fut>(f: F) -> BoxedVerify
where
    F: Fn(NormalizedMessage, Arc<[String]>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = VerifyResult> + Send + 'static,
{
    Arc::new(move |message, prefixes| f(message, prefixes).boxed())
}

pub fn into_lifecycle_hook<F, Fut>(f: F) -> BoxedLifecycleHook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<()>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

#[cfg(test)]
mod tests {
    use ember_core::FaultKind;

    use super::*;

    #[test]
    fn return_values_convert_to_replies() {
        assert_eq!(().into_reply().unwrap(), None);
        assert_eq!("hi".into_reply().unwrap(), Some(Reply::text("hi")));
        assert_eq!(Some(String::from("x")).into_reply().unwrap(), Some(Reply::text("x")));
        assert_eq!(None::<Reply>.into_reply().unwrap(), None);

        let failed: Result<String, HandlerFault> = Err(HandlerFault::not_found("gone"));
        assert_eq!(failed.into_reply().unwrap_err().kind, FaultKind::NotFound);
    }

    #[test]
    fn io_errors_convert_through_result() {
        let failed: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert_eq!(failed.into_handled().unwrap_err().kind, FaultKind::Timeout);
    }
}
