//! # Trestle
//!
//! Write request-handling logic once as an ordered sequence of handlers,
//! run it unmodified across host web frameworks.
//!
//! Trestle is three layers:
//!
//! - A **canonical message model** (`trestle-core`): a framework-neutral
//!   request, a mutable reply builder, per-request metadata, and a JSON
//!   state bag.
//! - An **execution engine** (`trestle-pipeline`): an onion-model handler
//!   chain with an explicit continuation and value-based short-circuit.
//! - An **adapter layer** (`trestle-adapters`): per-host translations
//!   (hyper, axum, tower, or direct canonical messages) plus the
//!   pass-through heuristic for hosts that can resume their own stack.
//!
//! Built-in collaborator handlers (correlation ids, logging, CORS,
//! security headers, timeouts, rate limiting, caching, compression, body
//! parsing, bearer auth) live in `trestle-handlers`.
//!
//! ## Quick start
//!
//! ```
//! use trestle::prelude::*;
//!
//! fn app<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
//!     Box::pin(async move {
//!         next.run(ctx).await?;
//!         ctx.reply_mut().text("hello from any host");
//!         Ok(Outcome::Continue)
//!     })
//! }
//!
//! let pipeline = Pipeline::new()
//!     .with(LoggingHandler::new())
//!     .with(FnHandler::new("app", app));
//! assert_eq!(pipeline.handler_names(), vec!["logging", "app"]);
//! ```
//!
//! ```text
//! native request → adapter → [h1 → h2 → ... → hn] → adapter → native reply
//! ```

#![doc(html_root_url = "https://docs.rs/trestle/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export the canonical message model
pub use trestle_core as core;

// Re-export the execution engine
pub use trestle_pipeline as pipeline;

// Re-export the host adapters
pub use trestle_adapters as adapters;

// Re-export the built-in handlers
pub use trestle_handlers as handlers;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use trestle::prelude::*;
/// ```
pub mod prelude {
    pub use trestle_core::{
        BoxFuture, CanonicalReply, CanonicalRequest, ReplyBuilder, RequestMeta, State, Store,
        TrestleError, TrestleResult,
    };

    pub use trestle_pipeline::{Context, FnHandler, Handler, Next, Outcome, Pipeline};

    pub use trestle_adapters::{produced_reply, Adapter, DirectAdapter};

    pub use trestle_handlers::{
        BearerAuthHandler, CacheHandler, CompressionHandler, CorrelationHandler, CorsHandler,
        JsonBodyHandler, LoggingHandler, MemoryStore, RateLimitHandler, SecurityHeadersHandler,
        TimeoutHandler,
    };
}
