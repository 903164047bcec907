//! Timeout handler.
//!
//! Races the downstream continuation against a timer. When the timer
//! wins, the handler stops the pipeline with `504 Gateway Timeout`.
//! Losing the race drops the downstream future, which cancels it; any
//! work it had in flight stops at its next suspension point.

use http::StatusCode;
use std::time::Duration;
use trestle_core::{BoxFuture, ReplyBuilder, TrestleResult};
use trestle_pipeline::{Context, Handler, Next, Outcome};

/// Handler bounding downstream execution time.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use trestle_handlers::TimeoutHandler;
///
/// let timeout = TimeoutHandler::new(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct TimeoutHandler {
    limit: Duration,
}

impl TimeoutHandler {
    /// Creates a handler with the given limit.
    #[must_use]
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    /// Returns the configured limit.
    #[must_use]
    pub fn limit(&self) -> Duration {
        self.limit
    }

    fn timeout_reply(&self) -> TrestleResult<Outcome> {
        let mut reply = ReplyBuilder::new();
        reply.status(StatusCode::GATEWAY_TIMEOUT).json(&serde_json::json!({
            "error": {
                "code": "TIMEOUT",
                "message": format!("request exceeded {}ms", self.limit.as_millis()),
            }
        }))?;
        Ok(Outcome::Stop(reply.build()))
    }
}

impl Handler for TimeoutHandler {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            tokio::select! {
                result = next.run(ctx) => {
                    result?;
                    Ok(Outcome::Continue)
                }
                () = tokio::time::sleep(self.limit) => {
                    tracing::warn!(limit_ms = self.limit.as_millis() as u64, "request timed out");
                    self.timeout_reply()
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trestle_core::{CanonicalRequest, State};
    use trestle_pipeline::{FnHandler, Pipeline};

    fn request() -> CanonicalRequest {
        CanonicalRequest::builder()
            .uri("https://example.com/slow")
            .build()
            .unwrap()
    }

    fn slow<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            next.run(ctx).await?;
            Ok(Outcome::Continue)
        })
    }

    fn fast<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            next.run(ctx).await?;
            ctx.reply_mut().text("fast enough");
            Ok(Outcome::Continue)
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_downstream_yields_504() {
        let pipeline = Pipeline::new()
            .with(TimeoutHandler::new(Duration::from_millis(100)))
            .with(FnHandler::new("slow", slow));

        let reply = pipeline.run(request(), &State::new()).await.unwrap();
        assert_eq!(reply.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(reply.content_type(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_fast_downstream_is_untouched() {
        let pipeline = Pipeline::new()
            .with(TimeoutHandler::new(Duration::from_secs(5)))
            .with(FnHandler::new("fast", fast));

        let reply = pipeline.run(request(), &State::new()).await.unwrap();
        assert_eq!(reply.status(), StatusCode::OK);
        assert_eq!(reply.body().unwrap().as_ref(), b"fast enough");
    }
}
