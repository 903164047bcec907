//! Axum adapter.
//!
//! Two surfaces bind a pipeline into an axum application:
//!
//! - [`pipeline_handler`]: a terminal route handler; every pipeline reply
//!   is finalized.
//! - [`pipeline_middleware`]: for `axum::middleware::from_fn_with_state`;
//!   the pass-through heuristic decides between finalizing the pipeline's
//!   reply and handing the (rebuilt) request to the host's own `Next`.
//!
//! Reply translation is content-type-driven: JSON replies are decoded and
//! re-emitted through `axum::Json`, text replies become strings, anything
//! else is raw bytes. Pipeline errors become 500 replies with an error
//! record: a visible failure, never a silent 200.
//!
//! ```ignore
//! let shared = PipelineState::new(Arc::new(pipeline), State::new());
//! let app = Router::new()
//!     .route("/api/{*rest}", any(pipeline_handler))
//!     .layer(middleware::from_fn_with_state(shared.clone(), pipeline_middleware))
//!     .with_state(shared);
//! ```

use crate::protocol::{absolutize_uri, produced_reply};
use ::axum::body::Body;
use ::axum::extract::{Request, State as AxumState};
use ::axum::middleware::Next as AxumNext;
use ::axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{Method, StatusCode};
use std::sync::Arc;
use trestle_core::{CanonicalReply, CanonicalRequest, State, TrestleError, TrestleResult};
use trestle_pipeline::Pipeline;

/// Shared state handed to the axum surfaces: the pipeline plus the
/// initial state every request's bag is copied from.
#[derive(Clone)]
pub struct PipelineState {
    pipeline: Arc<Pipeline>,
    initial_state: State,
}

impl PipelineState {
    /// Creates the shared state.
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>, initial_state: State) -> Self {
        Self {
            pipeline,
            initial_state,
        }
    }
}

impl std::fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineState")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

/// Terminal route handler: runs the pipeline and always finalizes.
pub async fn pipeline_handler(
    AxumState(shared): AxumState<PipelineState>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();

    let body_bytes = match buffer_body(&parts.method, body).await {
        Ok((bytes, _)) => bytes,
        Err(error) => return failure_reply(&error),
    };

    let canonical = match canonical_from_parts(&parts, body_bytes) {
        Ok(canonical) => canonical,
        Err(error) => return failure_reply(&error),
    };

    match shared.pipeline.run(canonical, &shared.initial_state).await {
        Ok(reply) => finalize(&reply),
        Err(error) => failure_reply(&error),
    }
}

/// Middleware surface: finalize real output, otherwise hand the request
/// to the host's own continuation.
pub async fn pipeline_middleware(
    AxumState(shared): AxumState<PipelineState>,
    request: Request,
    next: AxumNext,
) -> Response {
    let (parts, body) = request.into_parts();

    let (body_bytes, native_body) = match buffer_body(&parts.method, body).await {
        Ok(buffered) => buffered,
        Err(error) => return failure_reply(&error),
    };

    let canonical = match canonical_from_parts(&parts, body_bytes) {
        Ok(canonical) => canonical,
        Err(error) => return failure_reply(&error),
    };

    match shared.pipeline.run(canonical, &shared.initial_state).await {
        Ok(reply) if produced_reply(&reply) => finalize(&reply),
        Ok(_) => next.run(Request::from_parts(parts, native_body)).await,
        Err(error) => failure_reply(&error),
    }
}

/// Buffers the body for methods that carry one, returning both the
/// canonical bytes and a native body suitable for pass-through.
async fn buffer_body(method: &Method, body: Body) -> TrestleResult<(Option<Bytes>, Body)> {
    if method == Method::GET || method == Method::HEAD {
        return Ok((None, body));
    }

    let bytes = ::axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|error| {
            TrestleError::adapter_with_source("axum", "failed to buffer request body", error)
        })?;

    let canonical = if bytes.is_empty() {
        None
    } else {
        Some(bytes.clone())
    };
    Ok((canonical, Body::from(bytes)))
}

fn canonical_from_parts(
    parts: &http::request::Parts,
    body: Option<Bytes>,
) -> TrestleResult<CanonicalRequest> {
    let uri = absolutize_uri(parts, "axum")?;
    Ok(CanonicalRequest::from_parts(
        parts.method.clone(),
        uri,
        parts.headers.clone(),
        body,
    ))
}

/// Translates a canonical reply into a native axum response using the
/// content type to pick the host's own body mechanism.
fn finalize(reply: &CanonicalReply) -> Response {
    let body = reply.body().cloned().unwrap_or_else(Bytes::new);

    let mut response = match reply.content_type() {
        Some(ct) if ct.starts_with("application/json") => {
            match serde_json::from_slice::<serde_json::Value>(&body) {
                Ok(value) => ::axum::Json(value).into_response(),
                Err(error) => {
                    tracing::error!(%error, "json reply body failed to decode");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
        }
        Some(ct) if ct.starts_with("text/") => {
            String::from_utf8_lossy(&body).into_owned().into_response()
        }
        _ => body.into_response(),
    };

    *response.status_mut() = reply.status();
    for name in reply.headers().keys() {
        if name == CONTENT_LENGTH {
            continue;
        }
        response.headers_mut().remove(name);
    }
    for (name, value) in reply.headers() {
        if name == CONTENT_LENGTH {
            continue;
        }
        response.headers_mut().append(name.clone(), value.clone());
    }
    response
}

fn failure_reply(error: &TrestleError) -> Response {
    tracing::error!(%error, "pipeline execution failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::axum::routing::{any, get};
    use ::axum::{middleware, Router};
    use http::header::CONTENT_TYPE;
    use ::tower::ServiceExt;
    use trestle_core::BoxFuture;
    use trestle_pipeline::{Context, FnHandler, Next, Outcome};

    fn noop<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            next.run(ctx).await?;
            Ok(Outcome::Continue)
        })
    }

    fn json_ok<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            next.run(ctx).await?;
            ctx.reply_mut().json(&serde_json::json!({"ok": true}))?;
            Ok(Outcome::Continue)
        })
    }

    fn shared_with(pipeline: Pipeline) -> PipelineState {
        PipelineState::new(Arc::new(pipeline), State::new())
    }

    fn native_get(path: &str) -> http::Request<Body> {
        http::Request::builder()
            .uri(path)
            .header("host", "example.com")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = ::axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[tokio::test]
    async fn test_handler_finalizes_json_reply() {
        let shared = shared_with(Pipeline::new().with(FnHandler::new("json", json_ok)));
        let app = Router::new()
            .route("/", any(pipeline_handler))
            .with_state(shared);

        let response = app.oneshot(native_get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(body_string(response).await, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_middleware_passes_through_when_pipeline_is_silent() {
        let shared = shared_with(Pipeline::new().with(FnHandler::new("noop", noop)));
        let app = Router::new()
            .route("/", get(|| async { "native route" }))
            .layer(middleware::from_fn_with_state(shared, pipeline_middleware));

        let response = app.oneshot(native_get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "native route");
    }

    #[tokio::test]
    async fn test_middleware_finalizes_real_output() {
        let shared = shared_with(Pipeline::new().with(FnHandler::new("json", json_ok)));
        let app = Router::new()
            .route("/", get(|| async { "never reached" }))
            .layer(middleware::from_fn_with_state(shared, pipeline_middleware));

        let response = app.oneshot(native_get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(body_string(response).await, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_finalize_copies_headers_and_strips_content_length() {
        let mut builder = trestle_core::ReplyBuilder::new();
        builder.status(StatusCode::CREATED);
        builder.text("made");
        builder.header("x-extra", "1").unwrap();
        builder.header("content-length", "999").unwrap();

        let response = finalize(&builder.build());
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-extra").unwrap(), "1");
        assert_ne!(
            response.headers().get(CONTENT_LENGTH).map(|v| v.as_bytes()),
            Some(b"999".as_ref())
        );
        assert_eq!(body_string(response).await, "made");
    }

    #[tokio::test]
    async fn test_pipeline_error_is_a_visible_failure() {
        fn fail<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
            let _ = (ctx, next);
            Box::pin(async move { Err(TrestleError::handler("fail", "boom")) })
        }

        let shared = shared_with(Pipeline::new().with(FnHandler::new("fail", fail)));
        let app = Router::new()
            .route("/", any(pipeline_handler))
            .with_state(shared);

        let response = app.oneshot(native_get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
