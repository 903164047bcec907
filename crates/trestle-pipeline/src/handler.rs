//! Handler contract and continuation.
//!
//! Every unit of request logic implements [`Handler`]: a named `handle`
//! operation given the per-request [`Context`] and a [`Next`] continuation,
//! returning an [`Outcome`]. Handlers that want downstream handlers to run
//! must invoke `next.run(ctx)` themselves before returning
//! [`Outcome::Continue`]; returning without invoking it ends the pipeline
//! at that point with whatever the reply builder currently holds. That is
//! observable behavior, not an error.

use crate::context::Context;
use std::sync::Arc;
use trestle_core::{BoxFuture, TrestleResult};

/// The result of one handler invocation.
#[derive(Debug)]
pub enum Outcome {
    /// Proceed normally. Downstream handlers only ran if the handler
    /// already invoked its continuation.
    Continue,
    /// Stop here: the supplied reply is returned immediately, bypassing
    /// every handler not yet run and the context's own reply builder.
    Stop(trestle_core::CanonicalReply),
}

/// A named unit of request-processing logic.
///
/// # Invariants
///
/// - `handle` invokes its continuation at most once; [`Next`] is consumed
///   by `run` so the type system enforces this.
/// - Handlers are stateless across requests unless they deliberately close
///   over shared external state (for example a store); the engine provides
///   no locking for such state.
///
/// # Example
///
/// ```ignore
/// struct Timing;
///
/// impl Handler for Timing {
///     fn name(&self) -> &'static str {
///         "timing"
///     }
///
///     fn handle<'a>(
///         &'a self,
///         ctx: &'a mut Context,
///         next: Next<'a>,
///     ) -> BoxFuture<'a, TrestleResult<Outcome>> {
///         Box::pin(async move {
///             next.run(ctx).await?;
///             let elapsed = ctx.meta().elapsed();
///             tracing::debug!(?elapsed, "request finished");
///             Ok(Outcome::Continue)
///         })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Returns the diagnostic name of this handler.
    ///
    /// Names are used for logging and error attribution. Duplicate names
    /// are permitted but discouraged.
    fn name(&self) -> &'static str;

    /// Processes the request.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The mutable per-request context
    /// * `next` - Continuation invoking the remaining handlers
    fn handle<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, TrestleResult<Outcome>>;

    /// Lifecycle hook run exactly once per pipeline instance, the first
    /// time `run` is invoked. Hooks should be idempotent.
    fn on_start(&self) -> BoxFuture<'_, TrestleResult<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Lifecycle hook for shutdown. Invoking it is the caller's
    /// responsibility (`Pipeline::shutdown`), not part of per-request
    /// execution.
    fn on_stop(&self) -> BoxFuture<'_, TrestleResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Continuation invoking the handlers not yet run.
///
/// Consumed by [`Next::run`], so a handler can invoke it at most once. A
/// continuation past the end of the list is a no-op, as is any
/// continuation reached after a short-circuit was recorded.
pub struct Next<'a> {
    rest: &'a [Arc<dyn Handler>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(rest: &'a [Arc<dyn Handler>]) -> Self {
        Self { rest }
    }

    /// Invokes the remaining handlers in order.
    ///
    /// Returns once every downstream handler has finished (or one of them
    /// stopped). Ordinary errors from downstream handlers surface here;
    /// a handler may match on this result to centralize error handling
    /// for everything below it.
    pub async fn run(self, ctx: &mut Context) -> TrestleResult<()> {
        if ctx.is_short_circuited() {
            return Ok(());
        }
        let Some((handler, rest)) = self.rest.split_first() else {
            return Ok(());
        };

        tracing::trace!(handler = handler.name(), "entering handler");
        match handler.handle(ctx, Next { rest }).await? {
            Outcome::Continue => Ok(()),
            Outcome::Stop(reply) => {
                tracing::debug!(
                    handler = handler.name(),
                    status = %reply.status(),
                    "handler short-circuited"
                );
                ctx.record_short_circuit(reply);
                Ok(())
            }
        }
    }
}

/// A handler backed by a plain function, for quick registration without a
/// dedicated type.
///
/// # Example
///
/// ```
/// use trestle_core::TrestleResult;
/// use trestle_pipeline::{BoxFuture, Context, FnHandler, Next, Outcome};
///
/// fn noop<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
///     Box::pin(async move {
///         next.run(ctx).await?;
///         Ok(Outcome::Continue)
///     })
/// }
///
/// let handler = FnHandler::new("noop", noop);
/// ```
pub struct FnHandler<F> {
    name: &'static str,
    func: F,
}

impl<F> FnHandler<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>>
        + Send
        + Sync
        + 'static,
{
    /// Creates a function-backed handler with the given diagnostic name.
    pub fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, TrestleResult<Outcome>> {
        (self.func)(ctx, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trestle_core::{CanonicalRequest, State};

    fn test_context() -> Context {
        let request = CanonicalRequest::builder()
            .uri("https://example.com/test")
            .build()
            .unwrap();
        Context::new(request, &State::new()).unwrap()
    }

    fn touch<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            next.run(ctx).await?;
            ctx.state_mut().insert("touched", true)?;
            Ok(Outcome::Continue)
        })
    }

    #[test]
    fn test_fn_handler_name() {
        let handler = FnHandler::new("touch", touch);
        assert_eq!(handler.name(), "touch");
    }

    #[tokio::test]
    async fn test_exhausted_next_is_a_noop() {
        let mut ctx = test_context();
        let next = Next::new(&[]);
        next.run(&mut ctx).await.unwrap();
        assert!(!ctx.is_short_circuited());
    }

    #[tokio::test]
    async fn test_fn_handler_runs() {
        let handler = FnHandler::new("touch", touch);
        let mut ctx = test_context();
        let outcome = handler.handle(&mut ctx, Next::new(&[])).await.unwrap();
        assert!(matches!(outcome, Outcome::Continue));
        assert_eq!(ctx.state().get_as::<bool>("touched"), Some(true));
    }

    #[tokio::test]
    async fn test_default_lifecycle_hooks_succeed() {
        let handler = FnHandler::new("touch", touch);
        handler.on_start().await.unwrap();
        handler.on_stop().await.unwrap();
    }
}
