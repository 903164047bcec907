//! Response cache handler.
//!
//! GET-only response caching over the [`Store`] contract. A hit stops the
//! pipeline with the rehydrated reply; a miss runs downstream and stores
//! the accumulated reply when it is worth keeping (200, with a body).
//! Replies produced by a deeper short-circuit bypass the reply builder
//! and are never cached.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use trestle_core::{BoxFuture, CanonicalReply, ReplyBuilder, Store, TrestleResult};
use trestle_pipeline::{Context, Handler, Next, Outcome};

/// Header reporting a cache hit.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Store-backed response cache for GET requests.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use trestle_handlers::{CacheHandler, MemoryStore};
///
/// let cache = CacheHandler::new(Arc::new(MemoryStore::new()), Duration::from_secs(30));
/// ```
pub struct CacheHandler {
    store: Arc<dyn Store>,
    ttl: Duration,
}

/// Serialized reply shape stored per cache key.
#[derive(Debug, Serialize, Deserialize)]
struct CachedReply {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl CachedReply {
    fn capture(reply: &CanonicalReply) -> Self {
        let headers = reply
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        Self {
            status: reply.status().as_u16(),
            headers,
            body: reply
                .body()
                .map(|bytes| BASE64.encode(bytes))
                .unwrap_or_default(),
        }
    }

    fn rehydrate(&self) -> TrestleResult<CanonicalReply> {
        let mut reply = ReplyBuilder::new();
        reply.status(StatusCode::from_u16(self.status).map_err(http::Error::from)?);
        for (name, value) in &self.headers {
            reply.append_header(name.as_str(), value.as_str())?;
        }
        if !self.body.is_empty() {
            let bytes = BASE64.decode(&self.body).map_err(|error| {
                trestle_core::TrestleError::handler_with_source(
                    "cache",
                    "stored body failed to decode",
                    error,
                )
            })?;
            reply.body(Bytes::from(bytes));
        }
        reply.header(CACHE_STATUS_HEADER, "hit")?;
        Ok(reply.build())
    }
}

impl CacheHandler {
    /// Creates a cache over the given store with a fixed TTL.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn cache_key(ctx: &Context) -> String {
        format!("cache:{}", ctx.request().uri())
    }

    fn worth_caching(reply: &CanonicalReply) -> bool {
        reply.status() == StatusCode::OK && reply.body().is_some()
    }
}

impl Handler for CacheHandler {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            if ctx.request().method() != Method::GET {
                next.run(ctx).await?;
                return Ok(Outcome::Continue);
            }

            let key = Self::cache_key(ctx);
            if let Some(value) = self.store.get(&key).await {
                match serde_json::from_value::<CachedReply>(value) {
                    Ok(cached) => {
                        tracing::debug!(key = %key, "cache hit");
                        return Ok(Outcome::Stop(cached.rehydrate()?));
                    }
                    Err(error) => {
                        // A corrupt entry is dropped, not served.
                        tracing::warn!(key = %key, %error, "evicting undecodable cache entry");
                        self.store.delete(&key).await;
                    }
                }
            }

            next.run(ctx).await?;

            let reply = ctx.reply().build();
            if Self::worth_caching(&reply) {
                let cached = serde_json::to_value(CachedReply::capture(&reply))?;
                self.store.set(&key, cached, Some(self.ttl)).await;
            }
            Ok(Outcome::Continue)
        })
    }
}

impl std::fmt::Debug for CacheHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandler")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
