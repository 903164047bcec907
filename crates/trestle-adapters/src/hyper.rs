//! Hyper adapter.
//!
//! Binds a pipeline as a `hyper::service::Service`, the shape hyper's
//! connection builders expect. Hyper is a terminal host: there is no
//! further native step to fall back to, so every pipeline reply is
//! finalized and pipeline errors surface as the service's error type,
//! never converted into a success reply.
//!
//! ```ignore
//! use std::sync::Arc;
//! use trestle_adapters::hyper::PipelineService;
//! use trestle_core::State;
//!
//! let service = PipelineService::new(Arc::new(pipeline), State::new());
//! // hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
//! //     .serve_connection(io, service)
//! ```

use crate::protocol::{absolutize_uri, canonical_to_http, Adapter};
use ::hyper::body::Body;
use bytes::Bytes;
use http::Method;
use http_body_util::{BodyExt, Full};
use std::marker::PhantomData;
use std::sync::Arc;
use trestle_core::{BoxFuture, CanonicalReply, CanonicalRequest, State, TrestleError, TrestleResult};
use trestle_pipeline::Pipeline;

/// Translation half of the hyper binding, generic over the request body.
///
/// Production connections carry `hyper::body::Incoming`; tests use
/// `Full<Bytes>`. Both satisfy the same `Body` bound.
pub struct HyperAdapter<B = Full<Bytes>> {
    _body: PhantomData<fn(B) -> B>,
}

impl<B> HyperAdapter<B> {
    /// Creates the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self { _body: PhantomData }
    }
}

impl<B> Default for HyperAdapter<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> Adapter for HyperAdapter<B>
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type NativeRequest = http::Request<B>;
    type NativeReply = http::Response<Full<Bytes>>;

    fn name(&self) -> &'static str {
        "hyper"
    }

    fn to_canonical(
        &self,
        native: Self::NativeRequest,
    ) -> BoxFuture<'_, TrestleResult<CanonicalRequest>> {
        Box::pin(async move {
            let (parts, body) = native.into_parts();

            let bytes = if parts.method == Method::GET || parts.method == Method::HEAD {
                None
            } else {
                let collected = body.collect().await.map_err(|error| {
                    let error = error.into();
                    TrestleError::adapter("hyper", format!("failed to read request body: {error}"))
                })?;
                let bytes = collected.to_bytes();
                if bytes.is_empty() { None } else { Some(bytes) }
            };

            let uri = absolutize_uri(&parts, "hyper")?;
            Ok(CanonicalRequest::from_parts(
                parts.method,
                uri,
                parts.headers,
                bytes,
            ))
        })
    }

    fn to_native(&self, reply: CanonicalReply) -> BoxFuture<'_, TrestleResult<Self::NativeReply>> {
        Box::pin(async move { Ok(canonical_to_http(&reply)) })
    }
}

/// A hyper service driving one pipeline.
///
/// Cloning is cheap; the pipeline is shared and the initial state is
/// copied per request by the engine.
#[derive(Clone)]
pub struct PipelineService {
    pipeline: Arc<Pipeline>,
    initial_state: State,
}

impl PipelineService {
    /// Creates a service around a shared pipeline and initial state.
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>, initial_state: State) -> Self {
        Self {
            pipeline,
            initial_state,
        }
    }
}

impl std::fmt::Debug for PipelineService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineService")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl<B> ::hyper::service::Service<http::Request<B>> for PipelineService
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = http::Response<Full<Bytes>>;
    type Error = TrestleError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn call(&self, request: http::Request<B>) -> Self::Future {
        let pipeline = Arc::clone(&self.pipeline);
        let state = self.initial_state.clone();
        Box::pin(async move {
            let adapter = HyperAdapter::<B>::new();
            adapter.dispatch(&pipeline, &state, request).await
        })
    }
}
