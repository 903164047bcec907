//! The pipeline: an ordered handler list and its driver.
//!
//! A [`Pipeline`] owns the handlers registered on it, runs `on_start`
//! lifecycle hooks exactly once per instance, builds a fresh [`Context`]
//! per request, and drives the continuation chain to a canonical reply.

use crate::context::Context;
use crate::handler::{Handler, Next};
use std::sync::Arc;
use tokio::sync::OnceCell;
use trestle_core::{CanonicalReply, CanonicalRequest, State, TrestleError, TrestleResult};

/// An ordered, appendable list of handlers plus the execution driver.
///
/// Handlers execute in registration order; each may wrap "before/after"
/// logic around its continuation, producing first-registered-first-entered,
/// first-registered-last-exited nesting.
///
/// Cloning yields an independent handler list (sharing the registered
/// handler instances, not the list) and a fresh lifecycle gate; mutating a
/// clone never affects its source.
///
/// # Example
///
/// ```no_run
/// use trestle_pipeline::{FnHandler, Pipeline};
/// # fn logging<'a>(ctx: &'a mut trestle_pipeline::Context, next: trestle_pipeline::Next<'a>)
/// #     -> trestle_pipeline::BoxFuture<'a, trestle_core::TrestleResult<trestle_pipeline::Outcome>>
/// # { Box::pin(async move { next.run(ctx).await?; Ok(trestle_pipeline::Outcome::Continue) }) }
///
/// let mut pipeline = Pipeline::new();
/// pipeline.append(FnHandler::new("logging", logging));
/// assert_eq!(pipeline.handler_names(), vec!["logging"]);
/// ```
pub struct Pipeline {
    /// Registered handlers, in execution order.
    handlers: Vec<Arc<dyn Handler>>,
    /// One-shot gate for `on_start` hooks. Concurrent first runs await a
    /// single in-flight initialization rather than racing a boolean.
    started: OnceCell<()>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            started: OnceCell::new(),
        }
    }

    /// Appends a handler to the end of the list.
    pub fn append<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Appends an already-shared handler to the end of the list.
    pub fn append_arc(&mut self, handler: Arc<dyn Handler>) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    /// Consuming variant of [`Pipeline::append`] for fluent construction.
    #[must_use]
    pub fn with<H: Handler>(mut self, handler: H) -> Self {
        self.append(handler);
        self
    }

    /// Returns the registered handlers in registration order.
    #[must_use]
    pub fn handlers(&self) -> &[Arc<dyn Handler>] {
        &self.handlers
    }

    /// Returns the handler names in registration order.
    #[must_use]
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` when no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Executes the pipeline for one request.
    ///
    /// The first invocation on this instance runs every handler's
    /// `on_start` hook in registration order; concurrent first invocations
    /// await the same in-flight initialization. A fresh [`Context`] is
    /// built per run, seeded with a copy of `initial_state`.
    ///
    /// Returns the short-circuit reply when a handler stopped, otherwise a
    /// snapshot of the context's reply builder. Ordinary handler errors
    /// propagate out unchanged; the engine recovers nothing.
    pub async fn run(
        &self,
        request: CanonicalRequest,
        initial_state: &State,
    ) -> TrestleResult<CanonicalReply> {
        self.ensure_started().await?;

        let mut ctx = Context::new(request, initial_state)?;
        Next::new(&self.handlers).run(&mut ctx).await?;
        Ok(ctx.into_reply())
    }

    /// Runs every handler's `on_stop` hook, in registration order.
    ///
    /// Shutdown is the caller's responsibility; per-request execution
    /// never invokes these hooks.
    pub async fn shutdown(&self) -> TrestleResult<()> {
        for handler in &self.handlers {
            tracing::debug!(handler = handler.name(), "running on_stop hook");
            handler.on_stop().await?;
        }
        Ok(())
    }

    async fn ensure_started(&self) -> TrestleResult<()> {
        self.started
            .get_or_try_init(|| async {
                for handler in &self.handlers {
                    tracing::debug!(handler = handler.name(), "running on_start hook");
                    handler.on_start().await?;
                }
                Ok::<(), TrestleError>(())
            })
            .await?;
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Pipeline {
    fn clone(&self) -> Self {
        // The clone is a distinct instance: its lifecycle hooks run again
        // on its own first request.
        Self {
            handlers: self.handlers.clone(),
            started: OnceCell::new(),
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("handlers", &self.handler_names())
            .field("started", &self.started.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{FnHandler, Outcome};
    use http::StatusCode;
    use trestle_core::BoxFuture;

    fn test_request() -> CanonicalRequest {
        CanonicalRequest::builder()
            .uri("https://example.com/test")
            .build()
            .unwrap()
    }

    fn pass<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            next.run(ctx).await?;
            Ok(Outcome::Continue)
        })
    }

    fn halt<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        let _ = next;
        Box::pin(async move {
            ctx.reply_mut().status(StatusCode::FORBIDDEN).text("halt");
            Ok(Outcome::Stop(ctx.reply().build()))
        })
    }

    #[tokio::test]
    async fn test_empty_pipeline_yields_default_reply() {
        let pipeline = Pipeline::new();
        let reply = pipeline.run(test_request(), &State::new()).await.unwrap();
        assert_eq!(reply.status(), StatusCode::OK);
        assert!(reply.body().is_none());
    }

    #[tokio::test]
    async fn test_stop_bypasses_builder() {
        let pipeline = Pipeline::new()
            .with(FnHandler::new("pass", pass))
            .with(FnHandler::new("halt", halt));

        let reply = pipeline.run(test_request(), &State::new()).await.unwrap();
        assert_eq!(reply.status(), StatusCode::FORBIDDEN);
        assert_eq!(reply.body().unwrap().as_ref(), b"halt");
    }

    #[tokio::test]
    async fn test_handler_names_in_registration_order() {
        let pipeline = Pipeline::new()
            .with(FnHandler::new("first", pass))
            .with(FnHandler::new("second", pass));
        assert_eq!(pipeline.handler_names(), vec!["first", "second"]);
        assert_eq!(pipeline.len(), 2);
        assert!(!pipeline.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_names_are_permitted() {
        let pipeline = Pipeline::new()
            .with(FnHandler::new("dup", pass))
            .with(FnHandler::new("dup", pass));
        assert_eq!(pipeline.handler_names(), vec!["dup", "dup"]);
    }

    #[tokio::test]
    async fn test_clone_is_independent() {
        let source = Pipeline::new().with(FnHandler::new("base", pass));
        let mut clone = source.clone();
        clone.append(FnHandler::new("extra", pass));

        assert_eq!(source.handler_names(), vec!["base"]);
        assert_eq!(clone.handler_names(), vec!["base", "extra"]);
    }

    #[tokio::test]
    async fn test_relative_uri_is_an_ordinary_error() {
        let pipeline = Pipeline::new().with(FnHandler::new("pass", pass));
        let request = CanonicalRequest::builder().uri("/only-path").build().unwrap();
        let result = pipeline.run(request, &State::new()).await;
        assert!(matches!(
            result,
            Err(TrestleError::RelativeUrl { .. })
        ));
    }
}
