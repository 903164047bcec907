//! # Trestle Adapters
//!
//! Translation layers between host web frameworks and the canonical
//! message model driven by `trestle-pipeline`.
//!
//! Every adapter does three things: translate the host's native request
//! into a [`CanonicalRequest`](trestle_core::CanonicalRequest), run a
//! [`Pipeline`](trestle_pipeline::Pipeline), and translate the resulting
//! [`CanonicalReply`](trestle_core::CanonicalReply) back into whatever the
//! host expects. Adapters hold no per-request state.
//!
//! Hosts that can hand control back to a further native step (axum
//! middleware, tower stacks) additionally apply the pass-through
//! heuristic [`produced_reply`]: a reply with default status, no content
//! type, and no location header is treated as "the pipeline produced
//! nothing" and the host's own continuation runs instead.
//!
//! ## Available adapters
//!
//! - [`direct`]: no translation; for callers already speaking canonical
//!   messages.
//! - [`hyper`] (feature `hyper`): a `hyper::service::Service`.
//! - [`axum`] (feature `axum`): a terminal route handler and a
//!   `from_fn_with_state` middleware.
//! - [`tower`] (feature `tower`): a `Layer`/`Service` pair.

#![doc(html_root_url = "https://docs.rs/trestle-adapters/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod direct;
pub mod protocol;

#[cfg(feature = "axum")]
pub mod axum;
#[cfg(feature = "hyper")]
pub mod hyper;
#[cfg(feature = "tower")]
pub mod tower;

pub use direct::DirectAdapter;
pub use protocol::{produced_reply, Adapter};
