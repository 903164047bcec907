//! Tower adapter.
//!
//! [`PipelineLayer`] wraps any canonical-message-shaped service
//! (`http::Request<Full<Bytes>>` → `http::Response<Full<Bytes>>`) with a
//! pipeline. The pass-through heuristic decides per request: real output
//! finalizes the pipeline's reply, a silent run calls the inner service
//! with the original request.

use crate::protocol::{absolutize_uri, canonical_to_http, produced_reply};
use bytes::Bytes;
use http::Method;
use http_body_util::{BodyExt, Full};
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use trestle_core::{BoxFuture, CanonicalRequest, State, TrestleResult};
use trestle_pipeline::Pipeline;

/// The request type this adapter serves.
pub type NativeRequest = http::Request<Full<Bytes>>;
/// The response type this adapter produces.
pub type NativeResponse = http::Response<Full<Bytes>>;

/// A `tower::Layer` installing a pipeline in front of a service.
///
/// ```ignore
/// let service = tower::ServiceBuilder::new()
///     .layer(PipelineLayer::new(Arc::new(pipeline), State::new()))
///     .service(origin);
/// ```
#[derive(Clone)]
pub struct PipelineLayer {
    pipeline: Arc<Pipeline>,
    initial_state: State,
}

impl PipelineLayer {
    /// Creates the layer.
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>, initial_state: State) -> Self {
        Self {
            pipeline,
            initial_state,
        }
    }
}

impl<S> ::tower::Layer<S> for PipelineLayer {
    type Service = PipelineMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PipelineMiddleware {
            inner,
            pipeline: Arc::clone(&self.pipeline),
            initial_state: self.initial_state.clone(),
        }
    }
}

/// The service produced by [`PipelineLayer`].
#[derive(Clone)]
pub struct PipelineMiddleware<S> {
    inner: S,
    pipeline: Arc<Pipeline>,
    initial_state: State,
}

impl<S> ::tower::Service<NativeRequest> for PipelineMiddleware<S>
where
    S: ::tower::Service<NativeRequest, Response = NativeResponse> + Clone + Send + 'static,
    S::Error: Into<::tower::BoxError>,
    S::Future: Send,
{
    type Response = NativeResponse;
    type Error = ::tower::BoxError;
    type Future = BoxFuture<'static, Result<NativeResponse, ::tower::BoxError>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, request: NativeRequest) -> Self::Future {
        let pipeline = Arc::clone(&self.pipeline);
        let state = self.initial_state.clone();
        // The cloned service takes over; the original stays ready.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(never) => match never {},
            };

            let canonical = canonical_from_parts(&parts, &bytes)?;
            let reply = pipeline.run(canonical, &state).await?;

            if produced_reply(&reply) {
                Ok(canonical_to_http(&reply))
            } else {
                let request = http::Request::from_parts(parts, Full::new(bytes));
                inner.call(request).await.map_err(Into::into)
            }
        })
    }
}

fn canonical_from_parts(
    parts: &http::request::Parts,
    bytes: &Bytes,
) -> TrestleResult<CanonicalRequest> {
    let body = if parts.method == Method::GET || parts.method == Method::HEAD || bytes.is_empty() {
        None
    } else {
        Some(bytes.clone())
    };
    let uri = absolutize_uri(parts, "tower")?;
    Ok(CanonicalRequest::from_parts(
        parts.method.clone(),
        uri,
        parts.headers.clone(),
        body,
    ))
}
