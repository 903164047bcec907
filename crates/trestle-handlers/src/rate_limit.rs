//! Rate-limiting handler.
//!
//! Fixed-window counting over the [`Store`] contract. Each request
//! increments the counter for its key in the current window; once the
//! limit is reached the handler stops the pipeline with `429 Too Many
//! Requests` and a `retry-after` hint.
//!
//! Counter atomicity is the store's concern: the bundled
//! [`MemoryStore`](crate::MemoryStore) runs read-modify-write under one
//! process-local lock per call, which is close enough for a single
//! process; distributed deployments need a store with atomic increments.

use http::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use trestle_core::{BoxFuture, ReplyBuilder, Store, TrestleResult};
use trestle_pipeline::{Context, Handler, Next, Outcome};

/// Rate-limit header names.
pub mod headers {
    /// Maximum requests allowed in the window.
    pub const LIMIT: &str = "x-ratelimit-limit";
    /// Remaining requests in the current window.
    pub const REMAINING: &str = "x-ratelimit-remaining";
    /// Seconds until the window resets.
    pub const RESET_AFTER: &str = "x-ratelimit-reset-after";
    /// Seconds to wait before retrying (on 429).
    pub const RETRY_AFTER: &str = "retry-after";
}

/// How the rate-limit key is derived from a request.
#[derive(Debug, Clone, Default)]
pub enum RateKey {
    /// The validated client address from request metadata.
    #[default]
    Ip,
    /// A header value (API keys, tenant ids).
    Header(String),
    /// One shared counter for every request.
    Global,
}

/// Store-backed fixed-window rate limiter.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use trestle_handlers::{MemoryStore, RateLimitHandler};
///
/// let limiter = RateLimitHandler::builder(Arc::new(MemoryStore::new()))
///     .limit(100)
///     .window(Duration::from_secs(60))
///     .per_ip()
///     .build();
/// ```
pub struct RateLimitHandler {
    store: Arc<dyn Store>,
    limit: u64,
    window: Duration,
    key: RateKey,
}

/// Builder for [`RateLimitHandler`].
pub struct RateLimitBuilder {
    store: Arc<dyn Store>,
    limit: u64,
    window: Duration,
    key: RateKey,
}

impl RateLimitBuilder {
    /// Sets the maximum number of requests per window. Default: 100.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the window length. Default: 60 seconds.
    #[must_use]
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Keys counters by client address.
    #[must_use]
    pub fn per_ip(mut self) -> Self {
        self.key = RateKey::Ip;
        self
    }

    /// Keys counters by a header value.
    #[must_use]
    pub fn per_header(mut self, name: impl Into<String>) -> Self {
        self.key = RateKey::Header(name.into());
        self
    }

    /// Uses one global counter.
    #[must_use]
    pub fn global(mut self) -> Self {
        self.key = RateKey::Global;
        self
    }

    /// Builds the handler.
    #[must_use]
    pub fn build(self) -> RateLimitHandler {
        RateLimitHandler {
            store: self.store,
            limit: self.limit,
            window: self.window,
            key: self.key,
        }
    }
}

impl RateLimitHandler {
    /// Creates a builder over the given store.
    #[must_use]
    pub fn builder(store: Arc<dyn Store>) -> RateLimitBuilder {
        RateLimitBuilder {
            store,
            limit: 100,
            window: Duration::from_secs(60),
            key: RateKey::default(),
        }
    }

    fn extract_key(&self, ctx: &Context) -> Option<String> {
        match &self.key {
            RateKey::Ip => Some(
                ctx.meta()
                    .ip()
                    .map_or_else(|| "unknown-ip".to_string(), |ip| ip.to_string()),
            ),
            RateKey::Header(name) => ctx.request().header(name).map(ToString::to_string),
            RateKey::Global => Some("global".to_string()),
        }
    }

    fn window_bucket(&self) -> (u64, u64) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let secs = self.window.as_secs().max(1);
        let bucket = now / secs;
        let reset_after = secs - (now % secs);
        (bucket, reset_after)
    }

    fn limited_reply(&self, reset_after: u64) -> TrestleResult<Outcome> {
        let mut reply = ReplyBuilder::new();
        reply.status(StatusCode::TOO_MANY_REQUESTS).json(&serde_json::json!({
            "error": {
                "code": "RATE_LIMITED",
                "message": "too many requests, try again later",
            }
        }))?;
        reply.header(headers::LIMIT, self.limit.to_string().as_str())?;
        reply.header(headers::REMAINING, "0")?;
        reply.header(headers::RESET_AFTER, reset_after.to_string().as_str())?;
        reply.header(headers::RETRY_AFTER, reset_after.max(1).to_string().as_str())?;
        Ok(Outcome::Stop(reply.build()))
    }
}

impl Handler for RateLimitHandler {
    fn name(&self) -> &'static str {
        "rate-limit"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            // No derivable key means no limiting for this request.
            let Some(key) = self.extract_key(ctx) else {
                next.run(ctx).await?;
                return Ok(Outcome::Continue);
            };

            let (bucket, reset_after) = self.window_bucket();
            let store_key = format!("ratelimit:{key}:{bucket}");

            let count = self
                .store
                .get(&store_key)
                .await
                .and_then(|v| v.as_u64())
                .unwrap_or(0);

            if count >= self.limit {
                tracing::warn!(key = %key, limit = self.limit, "rate limit exceeded");
                return self.limited_reply(reset_after);
            }

            self.store
                .set(&store_key, Value::from(count + 1), Some(self.window))
                .await;

            next.run(ctx).await?;

            let remaining = self.limit.saturating_sub(count + 1);
            ctx.reply_mut()
                .header(headers::LIMIT, self.limit.to_string().as_str())?;
            ctx.reply_mut()
                .header(headers::REMAINING, remaining.to_string().as_str())?;
            Ok(Outcome::Continue)
        })
    }
}

impl std::fmt::Debug for RateLimitHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitHandler")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
