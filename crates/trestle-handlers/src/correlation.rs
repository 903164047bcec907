//! Correlation-id handler.
//!
//! Re-derives the request id under explicit trust rules and echoes it on
//! the reply. Metadata derivation already picked up an inbound
//! `x-request-id` when the context was built; this handler exists for
//! deployments that must *not* trust client-supplied ids (the default
//! here) or that want the id echoed back to callers.
//!
//! This is the one collaborator that overwrites `meta.id` after context
//! creation; the rest of the metadata stays read-only.

use trestle_core::{BoxFuture, TrestleResult};
use trestle_pipeline::{Context, Handler, Next, Outcome};
use uuid::Uuid;

/// The header used for request-id propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Handler that assigns the request id and echoes it on the reply.
///
/// # Behavior
///
/// 1. With trust enabled and a non-empty `x-request-id` header, the
///    incoming id is kept.
/// 2. Otherwise a fresh UUID v7 replaces whatever metadata derivation
///    produced.
/// 3. After downstream handlers finish, the reply carries the id in
///    `x-request-id`.
#[derive(Debug, Clone, Default)]
pub struct CorrelationHandler {
    /// Whether to trust incoming request-id headers.
    ///
    /// Leave disabled for external traffic; enable for internal
    /// service-to-service calls that already assign ids.
    trust_incoming: bool,
}

impl CorrelationHandler {
    /// Creates a handler that always generates fresh ids.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handler that keeps ids supplied by the caller.
    #[must_use]
    pub fn trust_incoming() -> Self {
        Self {
            trust_incoming: true,
        }
    }
}

impl Handler for CorrelationHandler {
    fn name(&self) -> &'static str {
        "correlation"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            let incoming = if self.trust_incoming {
                ctx.request()
                    .header(REQUEST_ID_HEADER)
                    .filter(|value| !value.is_empty())
                    .map(ToString::to_string)
            } else {
                None
            };
            let id = incoming.unwrap_or_else(|| Uuid::now_v7().to_string());
            ctx.meta_mut().set_id(id.clone());

            next.run(ctx).await?;

            ctx.reply_mut().header(REQUEST_ID_HEADER, id.as_str())?;
            Ok(Outcome::Continue)
        })
    }
}
