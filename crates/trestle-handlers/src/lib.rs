//! # Trestle Handlers
//!
//! Built-in handlers for the Trestle pipeline, plus the in-memory TTL
//! store the stateful ones default to.
//!
//! Every type here implements the ordinary
//! [`Handler`](trestle_pipeline::Handler) contract; none adds execution
//! semantics of its own. Registration order is the caller's choice, but a
//! typical stack reads:
//!
//! ```text
//! correlation → logging → cors → security → timeout → rate_limit
//!     → cache → compression → json_body → bearer_auth → application
//! ```

#![doc(html_root_url = "https://docs.rs/trestle-handlers/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bearer_auth;
pub mod cache;
#[cfg(feature = "compression")]
pub mod compression;
pub mod correlation;
pub mod cors;
pub mod json_body;
pub mod logging;
pub mod rate_limit;
pub mod security;
pub mod store;
pub mod timeout;

pub use bearer_auth::BearerAuthHandler;
pub use cache::CacheHandler;
#[cfg(feature = "compression")]
pub use compression::CompressionHandler;
pub use correlation::CorrelationHandler;
pub use cors::CorsHandler;
pub use json_body::JsonBodyHandler;
pub use logging::LoggingHandler;
pub use rate_limit::RateLimitHandler;
pub use security::SecurityHeadersHandler;
pub use store::MemoryStore;
pub use timeout::TimeoutHandler;
