//! Canonical inbound request.
//!
//! [`CanonicalRequest`] is the transport-neutral representation every host
//! adapter translates into. It is created once per inbound call, never
//! mutated afterward, and shared by reference across all handlers in a
//! pipeline run.

use crate::error::TrestleResult;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};

/// Canonical, transport-neutral inbound request.
///
/// The method is normalized to upper-case at construction. The URI is
/// expected to be absolute (scheme and authority present); absoluteness is
/// enforced when request metadata is derived, so adapters that cannot
/// supply an absolute URI fail loudly before any handler runs.
///
/// # Example
///
/// ```
/// use trestle_core::CanonicalRequest;
///
/// let request = CanonicalRequest::builder()
///     .method("get")
///     .uri("https://api.example.com/users?page=2")
///     .header("accept", "application/json")
///     .build()
///     .unwrap();
///
/// assert_eq!(request.method(), &http::Method::GET);
/// assert_eq!(request.path(), "/users");
/// assert_eq!(request.query(), Some("page=2"));
/// ```
#[derive(Debug, Clone)]
pub struct CanonicalRequest {
    /// Normalized request method.
    method: Method,
    /// Request URI; absolute for any request that reaches a pipeline.
    uri: Uri,
    /// Header multimap; multi-value headers are preserved.
    headers: HeaderMap,
    /// Request body, when the method carries one.
    body: Option<Bytes>,
}

impl CanonicalRequest {
    /// Creates a request builder.
    #[must_use]
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Creates a request directly from already-typed parts.
    ///
    /// This is the constructor adapters use: their host framework has
    /// already parsed method, URI, and headers into typed values.
    #[must_use]
    pub fn from_parts(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Self {
        Self {
            method: normalize_method(method),
            uri,
            headers,
            body,
        }
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the header multimap.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the first value of a header as a string, if present and
    /// valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the request body, if one was supplied.
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns the URI path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Returns the URI query string, if present.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Returns `true` when the URI carries both a scheme and an authority.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.uri.scheme().is_some() && self.uri.authority().is_some()
    }
}

/// Upper-cases non-standard methods; standard methods already are.
fn normalize_method(method: Method) -> Method {
    let name = method.as_str();
    if name.bytes().any(|b| b.is_ascii_lowercase()) {
        Method::from_bytes(name.to_ascii_uppercase().as_bytes()).unwrap_or(method)
    } else {
        method
    }
}

/// Builder for [`CanonicalRequest`].
///
/// Conversion errors (invalid method, URI, or header) are deferred and
/// surfaced by [`Builder::build`], mirroring the `http` crate's builders.
#[derive(Debug)]
pub struct Builder {
    inner: TrestleResult<Parts>,
}

#[derive(Debug)]
struct Parts {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Builder {
    fn new() -> Self {
        Self {
            inner: Ok(Parts {
                method: Method::GET,
                uri: Uri::from_static("/"),
                headers: HeaderMap::new(),
                body: None,
            }),
        }
    }

    fn and_then<F>(self, f: F) -> Self
    where
        F: FnOnce(Parts) -> TrestleResult<Parts>,
    {
        Self {
            inner: self.inner.and_then(f),
        }
    }

    /// Sets the request method. Lower-case input is normalized.
    #[must_use]
    pub fn method<M>(self, method: M) -> Self
    where
        Method: TryFrom<M>,
        <Method as TryFrom<M>>::Error: Into<http::Error>,
    {
        self.and_then(|mut parts| {
            let method = Method::try_from(method).map_err(Into::<http::Error>::into)?;
            parts.method = normalize_method(method);
            Ok(parts)
        })
    }

    /// Sets the request URI.
    #[must_use]
    pub fn uri<U>(self, uri: U) -> Self
    where
        Uri: TryFrom<U>,
        <Uri as TryFrom<U>>::Error: Into<http::Error>,
    {
        self.and_then(|mut parts| {
            parts.uri = Uri::try_from(uri).map_err(Into::<http::Error>::into)?;
            Ok(parts)
        })
    }

    /// Appends a header. Repeated names accumulate as a multimap.
    #[must_use]
    pub fn header<K, V>(self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.and_then(|mut parts| {
            let name = HeaderName::try_from(name).map_err(Into::<http::Error>::into)?;
            let value = HeaderValue::try_from(value).map_err(Into::<http::Error>::into)?;
            parts.headers.append(name, value);
            Ok(parts)
        })
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(self, body: impl Into<Bytes>) -> Self {
        self.and_then(|mut parts| {
            parts.body = Some(body.into());
            Ok(parts)
        })
    }

    /// Builds the request, surfacing any deferred conversion error.
    pub fn build(self) -> TrestleResult<CanonicalRequest> {
        let parts = self.inner?;
        Ok(CanonicalRequest {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body: parts.body,
        })
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
