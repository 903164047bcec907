//! # Trestle Core
//!
//! Canonical, transport-neutral message types and shared contracts for the
//! Trestle handler pipeline.
//!
//! Host frameworks all carry their own request/response representations.
//! Trestle translates each of them into one canonical shape so that handler
//! logic can be written once:
//!
//! - [`CanonicalRequest`]: an immutable inbound message (method, absolute
//!   URI, header multimap, optional body).
//! - [`ReplyBuilder`] / [`CanonicalReply`]: a mutable reply accumulator and
//!   the immutable snapshot it produces.
//! - [`RequestMeta`]: per-request metadata derived once (correlation id,
//!   start time, best-effort client IP).
//! - [`State`]: a free-form JSON state bag handlers use to communicate.
//! - [`Store`]: the key/value contract consumed by caching and
//!   rate-limiting collaborators.
//!
//! The execution engine lives in `trestle-pipeline`; the host framework
//! translations live in `trestle-adapters`.

#![doc(html_root_url = "https://docs.rs/trestle-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod meta;
pub mod reply;
pub mod request;
pub mod state;
pub mod store;

pub use error::{TrestleError, TrestleResult};
pub use meta::{RequestMeta, CLIENT_IP_HEADERS, CORRELATION_HEADERS};
pub use reply::{CanonicalReply, ReplyBuilder};
pub use request::CanonicalRequest;
pub use state::State;
pub use store::{BoxFuture, Store};
