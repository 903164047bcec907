//! Request logging handler.
//!
//! Emits one structured event when a request enters the pipeline and one
//! when the downstream handlers have finished, carrying the correlation
//! id, method, path, accumulated status, and latency.

use trestle_core::{BoxFuture, TrestleResult};
use trestle_pipeline::{Context, Handler, Next, Outcome};

/// Handler logging request start and completion through `tracing`.
///
/// The completion event reports the reply builder's status; a reply
/// produced by a deeper short-circuit bypasses the builder and is logged
/// by whichever handler produced it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

impl LoggingHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Handler for LoggingHandler {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            tracing::debug!(
                id = %ctx.meta().id(),
                method = %ctx.meta().method(),
                path = %ctx.meta().path(),
                "request started"
            );

            let result = next.run(ctx).await;

            #[allow(clippy::cast_possible_truncation)]
            let elapsed_ms = ctx.elapsed().as_millis() as u64;
            match &result {
                Ok(()) => tracing::info!(
                    id = %ctx.meta().id(),
                    status = %ctx.reply().current_status(),
                    elapsed_ms,
                    "request finished"
                ),
                Err(error) => tracing::error!(
                    id = %ctx.meta().id(),
                    %error,
                    elapsed_ms,
                    "request failed"
                ),
            }

            result?;
            Ok(Outcome::Continue)
        })
    }
}
