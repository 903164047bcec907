//! The direct adapter: canonical messages in, canonical messages out.
//!
//! For hosts (or tests) that already speak the canonical message model
//! there is nothing to translate; binding a pipeline yields a plain
//! request-to-reply function.

use crate::protocol::Adapter;
use std::sync::Arc;
use trestle_core::{BoxFuture, CanonicalReply, CanonicalRequest, State, TrestleResult};
use trestle_pipeline::Pipeline;

/// Adapter with identity translations.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trestle_adapters::DirectAdapter;
/// use trestle_core::{CanonicalRequest, State};
/// use trestle_pipeline::Pipeline;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> trestle_core::TrestleResult<()> {
/// let handle = DirectAdapter::bind(Arc::new(Pipeline::new()), State::new());
///
/// let request = CanonicalRequest::builder()
///     .uri("https://example.com/")
///     .build()?;
/// let reply = handle(request).await?;
/// assert_eq!(reply.status(), http::StatusCode::OK);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectAdapter;

impl DirectAdapter {
    /// Binds a pipeline into a canonical request-to-reply function.
    pub fn bind(
        pipeline: Arc<Pipeline>,
        initial_state: State,
    ) -> impl Fn(CanonicalRequest) -> BoxFuture<'static, TrestleResult<CanonicalReply>> + Clone {
        move |request| {
            let pipeline = Arc::clone(&pipeline);
            let state = initial_state.clone();
            Box::pin(async move { pipeline.run(request, &state).await })
        }
    }
}

impl Adapter for DirectAdapter {
    type NativeRequest = CanonicalRequest;
    type NativeReply = CanonicalReply;

    fn name(&self) -> &'static str {
        "direct"
    }

    fn to_canonical(
        &self,
        native: Self::NativeRequest,
    ) -> BoxFuture<'_, TrestleResult<CanonicalRequest>> {
        Box::pin(async move { Ok(native) })
    }

    fn to_native(&self, reply: CanonicalReply) -> BoxFuture<'_, TrestleResult<Self::NativeReply>> {
        Box::pin(async move { Ok(reply) })
    }
}
