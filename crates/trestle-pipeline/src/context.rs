//! Per-request context.
//!
//! One [`Context`] is created for every pipeline run and discarded once the
//! reply is produced; contexts are never shared across requests. The
//! context bundles the read-only canonical request, the mutable reply
//! builder, the inter-handler state bag, and derived request metadata.

use std::sync::Arc;
use std::time::Duration;
use trestle_core::{
    CanonicalReply, CanonicalRequest, ReplyBuilder, RequestMeta, State, TrestleResult,
};

/// The per-request bundle handlers operate on.
///
/// # Example
///
/// ```
/// use trestle_core::{CanonicalRequest, State};
/// use trestle_pipeline::Context;
///
/// let request = CanonicalRequest::builder()
///     .uri("https://example.com/users")
///     .header("x-request-id", "abc-123")
///     .build()
///     .unwrap();
///
/// let ctx = Context::new(request, &State::new()).unwrap();
/// assert_eq!(ctx.meta().id(), "abc-123");
/// ```
pub struct Context {
    /// The inbound message, shared read-only across all handlers.
    request: Arc<CanonicalRequest>,
    /// The reply accumulator, owned exclusively by this context.
    reply: ReplyBuilder,
    /// Free-form inter-handler state.
    state: State,
    /// Metadata derived once at creation.
    meta: RequestMeta,
    /// First short-circuit reply recorded during this run, if any.
    short_circuit: Option<CanonicalReply>,
}

impl Context {
    /// Builds a context from a canonical request and the caller-supplied
    /// initial state (copied, so the caller's bag is never mutated).
    ///
    /// # Errors
    ///
    /// Propagates [`TrestleError::RelativeUrl`](trestle_core::TrestleError::RelativeUrl)
    /// when the request URI is not absolute.
    pub fn new(request: CanonicalRequest, initial_state: &State) -> TrestleResult<Self> {
        let meta = RequestMeta::derive(&request)?;
        Ok(Self {
            request: Arc::new(request),
            reply: ReplyBuilder::new(),
            state: initial_state.clone(),
            meta,
            short_circuit: None,
        })
    }

    /// Returns the inbound request.
    #[must_use]
    pub fn request(&self) -> &CanonicalRequest {
        &self.request
    }

    /// Returns a shared handle to the inbound request.
    #[must_use]
    pub fn shared_request(&self) -> Arc<CanonicalRequest> {
        Arc::clone(&self.request)
    }

    /// Returns the reply accumulator.
    #[must_use]
    pub fn reply(&self) -> &ReplyBuilder {
        &self.reply
    }

    /// Returns the reply accumulator mutably.
    pub fn reply_mut(&mut self) -> &mut ReplyBuilder {
        &mut self.reply
    }

    /// Returns the state bag.
    #[must_use]
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Returns the state bag mutably.
    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    /// Returns the derived request metadata.
    #[must_use]
    pub fn meta(&self) -> &RequestMeta {
        &self.meta
    }

    /// Returns the metadata mutably.
    ///
    /// The only mutation metadata supports is
    /// [`RequestMeta::set_id`]; everything else is read-only after
    /// derivation.
    pub fn meta_mut(&mut self) -> &mut RequestMeta {
        &mut self.meta
    }

    /// Returns the elapsed time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.meta.elapsed()
    }

    /// Records a short-circuit reply. The first recorded reply (the
    /// deepest stopping handler) wins.
    pub(crate) fn record_short_circuit(&mut self, reply: CanonicalReply) {
        if self.short_circuit.is_none() {
            self.short_circuit = Some(reply);
        }
    }

    /// Returns `true` once a short-circuit reply was recorded.
    pub(crate) fn is_short_circuited(&self) -> bool {
        self.short_circuit.is_some()
    }

    /// Consumes the context, yielding the short-circuit reply when one was
    /// recorded, or a snapshot of the reply builder otherwise.
    pub(crate) fn into_reply(self) -> CanonicalReply {
        match self.short_circuit {
            Some(reply) => reply,
            None => self.reply.build(),
        }
    }
}
