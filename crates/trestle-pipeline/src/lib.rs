//! # Trestle Pipeline
//!
//! The execution engine: an ordered, appendable list of named handlers
//! driven by an explicit continuation, with early exit ("short-circuit")
//! and a mutable reply accumulator.
//!
//! ## Onion model
//!
//! Handlers run in registration order. Each handler receives the mutable
//! per-request [`Context`] and a [`Next`] continuation; invoking
//! `next.run(ctx)` executes every downstream handler before returning, so
//! code placed after that call runs in exact reverse registration order:
//!
//! ```text
//! enter h1 → enter h2 → enter h3 → exit h3 → exit h2 → exit h1
//! ```
//!
//! ## Short-circuit
//!
//! A handler returns [`Outcome::Stop`] with a finished reply to bypass
//! every handler not yet run. The signal travels as a plain value recorded
//! in the context, never through `Err`, so ordinary error handling can
//! neither intercept nor fabricate it. `Pipeline::run` returns the stopped
//! reply directly, bypassing the context's own reply builder.
//!
//! ## Example
//!
//! ```
//! use trestle_core::{CanonicalRequest, State, TrestleResult};
//! use trestle_pipeline::{BoxFuture, Context, FnHandler, Next, Outcome, Pipeline};
//!
//! fn hello<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
//!     Box::pin(async move {
//!         next.run(ctx).await?;
//!         ctx.reply_mut().text("hello");
//!         Ok(Outcome::Continue)
//!     })
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> TrestleResult<()> {
//! let pipeline = Pipeline::new().with(FnHandler::new("hello", hello));
//!
//! let request = CanonicalRequest::builder()
//!     .uri("https://example.com/")
//!     .build()?;
//! let reply = pipeline.run(request, &State::new()).await?;
//! assert_eq!(reply.body().unwrap().as_ref(), b"hello");
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/trestle-pipeline/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod handler;
pub mod pipeline;

pub use context::Context;
pub use handler::{FnHandler, Handler, Next, Outcome};
pub use pipeline::Pipeline;

pub use trestle_core::BoxFuture;
