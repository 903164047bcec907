//! The adapter protocol.
//!
//! An adapter supplies two translations (native request to canonical
//! request, canonical reply to native reply) and gets request dispatch
//! for free. Host-specific constructors (a hyper service, an axum
//! middleware function, a tower layer) wrap [`Adapter::dispatch`] into
//! whatever calling convention the host expects.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION};
use http::{StatusCode, Uri};
use http_body_util::Full;
use trestle_core::{BoxFuture, CanonicalReply, CanonicalRequest, State, TrestleError, TrestleResult};
use trestle_pipeline::Pipeline;

/// Translation contract between one host framework and the canonical
/// message model.
///
/// Implementations are stateless pure mappings; any translation failure
/// (malformed native request, unreadable body) surfaces as an ordinary
/// [`TrestleError::Adapter`] error before the pipeline runs.
pub trait Adapter: Send + Sync + 'static {
    /// The host framework's inbound request type.
    type NativeRequest: Send + 'static;
    /// The host framework's outbound reply type.
    type NativeReply: Send + 'static;

    /// Returns the adapter's diagnostic name.
    fn name(&self) -> &'static str;

    /// Translates a native request into the canonical representation,
    /// preserving method, absolute URL, all header values, and the body
    /// for any method that carries one.
    fn to_canonical(
        &self,
        native: Self::NativeRequest,
    ) -> BoxFuture<'_, TrestleResult<CanonicalRequest>>;

    /// Translates a canonical reply into the host's native reply.
    fn to_native(&self, reply: CanonicalReply) -> BoxFuture<'_, TrestleResult<Self::NativeReply>>;

    /// Translates, runs the pipeline, and translates back.
    ///
    /// This is the core every host-shaped handler wraps.
    fn dispatch<'a>(
        &'a self,
        pipeline: &'a Pipeline,
        initial_state: &'a State,
        native: Self::NativeRequest,
    ) -> BoxFuture<'a, TrestleResult<Self::NativeReply>> {
        Box::pin(async move {
            let request = self.to_canonical(native).await?;
            let reply = pipeline.run(request, initial_state).await?;
            self.to_native(reply).await
        })
    }
}

/// The pass-through heuristic: did the pipeline produce real output?
///
/// A reply counts as real output when its status differs from `200 OK`,
/// or it carries a `content-type` header, or it carries a `location`
/// header. Anything else is indistinguishable from an untouched reply
/// builder, and pass-through-capable hosts hand control to their own next
/// step instead of finalizing.
///
/// This is a heuristic, not a guarantee: a handler that deliberately
/// produces a plain empty 200 looks identical to "nothing happened".
#[must_use]
pub fn produced_reply(reply: &CanonicalReply) -> bool {
    reply.status() != StatusCode::OK
        || reply.headers().contains_key(CONTENT_TYPE)
        || reply.headers().contains_key(LOCATION)
}

/// Rebuilds an absolute URI from request parts.
///
/// Origin-form URIs (the usual shape on server transports) are expanded
/// with the `host` header and an `http` scheme; the adapter layer has no
/// TLS knowledge. A relative URI without a `host` header is a translation
/// error.
pub fn absolutize_uri(parts: &http::request::Parts, adapter: &'static str) -> TrestleResult<Uri> {
    if parts.uri.scheme().is_some() && parts.uri.authority().is_some() {
        return Ok(parts.uri.clone());
    }

    let host = parts
        .headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            TrestleError::adapter(adapter, "origin-form uri without a host header")
        })?;

    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or("/", |pq| pq.as_str());

    Uri::try_from(format!("http://{host}{path_and_query}")).map_err(|error| {
        TrestleError::adapter_with_source(adapter, "could not rebuild absolute uri", error)
    })
}

/// Translates a canonical reply into a plain `http` response.
///
/// Every header is copied except `content-length`, which the transport
/// recomputes from the body it actually writes.
#[must_use]
pub fn canonical_to_http(reply: &CanonicalReply) -> http::Response<Full<Bytes>> {
    let body = reply.body().cloned().unwrap_or_else(Bytes::new);
    let mut response = http::Response::new(Full::new(body));
    *response.status_mut() = reply.status();
    for (name, value) in reply.headers() {
        if name == CONTENT_LENGTH {
            continue;
        }
        response.headers_mut().append(name.clone(), value.clone());
    }
    response
}
