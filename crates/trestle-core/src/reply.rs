//! Reply accumulator and snapshot.
//!
//! [`ReplyBuilder`] is the mutable response surface handlers write to; one
//! builder is owned by each per-request context. [`CanonicalReply`] is the
//! immutable snapshot the adapter consumes. `build()` is idempotent and
//! side-effect-free: the engine may snapshot once for a short-circuit
//! capture and again on the normal end-of-pipeline path, and both snapshots
//! compare equal while the builder is unmutated.

use crate::error::TrestleResult;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, StatusCode};
use serde::Serialize;

/// Mutable reply accumulator with a fluent surface.
///
/// All setters return the builder for chaining; setters that convert
/// caller-supplied names or values are fallible and surface conversion
/// errors as [`TrestleError::Http`](crate::TrestleError::Http). No
/// validation is applied beyond what the `http` types require; callers are
/// trusted.
///
/// # Example
///
/// ```
/// use trestle_core::ReplyBuilder;
/// use http::StatusCode;
///
/// let mut reply = ReplyBuilder::new();
/// reply.status(StatusCode::CREATED);
/// reply.json(&serde_json::json!({"ok": true})).unwrap();
///
/// let snapshot = reply.build();
/// assert_eq!(snapshot.status(), StatusCode::CREATED);
/// assert_eq!(snapshot.content_type(), Some("application/json"));
/// ```
#[derive(Debug, Clone)]
pub struct ReplyBuilder {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl ReplyBuilder {
    /// Creates an empty builder: status `200 OK`, no headers, no body.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Sets the status code.
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Sets a header, replacing any existing values for the name.
    pub fn header<K, V>(&mut self, name: K, value: V) -> TrestleResult<&mut Self>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let name = HeaderName::try_from(name).map_err(Into::<http::Error>::into)?;
        let value = HeaderValue::try_from(value).map_err(Into::<http::Error>::into)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Appends a header value without removing existing ones.
    pub fn append_header<K, V>(&mut self, name: K, value: V) -> TrestleResult<&mut Self>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let name = HeaderName::try_from(name).map_err(Into::<http::Error>::into)?;
        let value = HeaderValue::try_from(value).map_err(Into::<http::Error>::into)?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Removes every value of a header.
    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.remove(name);
        self
    }

    /// Serializes a JSON body and sets the matching content type.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> TrestleResult<&mut Self> {
        let body = serde_json::to_vec(value)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    /// Sets a raw body without touching the content type.
    pub fn body(&mut self, body: impl Into<Bytes>) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a plain-text body and the matching content type.
    pub fn text(&mut self, body: impl Into<String>) -> &mut Self {
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.body = Some(Bytes::from(body.into()));
        self
    }

    /// Sets an HTML body and the matching content type.
    pub fn html(&mut self, body: impl Into<String>) -> &mut Self {
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        self.body = Some(Bytes::from(body.into()));
        self
    }

    /// Sets a redirect: status plus `location` header, clearing the body.
    pub fn redirect<V>(&mut self, status: StatusCode, location: V) -> TrestleResult<&mut Self>
    where
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let location = HeaderValue::try_from(location).map_err(Into::<http::Error>::into)?;
        self.status = status;
        self.headers.insert(LOCATION, location);
        self.body = None;
        Ok(self)
    }

    /// Returns the current status code.
    #[must_use]
    pub fn current_status(&self) -> StatusCode {
        self.status
    }

    /// Returns the accumulated headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the accumulated body, if one was set.
    #[must_use]
    pub fn current_body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Produces an immutable snapshot of the accumulated reply.
    ///
    /// Idempotent: calling `build` repeatedly on an unmutated builder
    /// yields equal snapshots.
    #[must_use]
    pub fn build(&self) -> CanonicalReply {
        CanonicalReply {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

impl Default for ReplyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable reply snapshot consumed by adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalReply {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl CanonicalReply {
    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the header multimap.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the body, if one was set.
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns the `content-type` header value, if present and valid UTF-8.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let reply = ReplyBuilder::new().build();
        assert_eq!(reply.status(), StatusCode::OK);
        assert!(reply.headers().is_empty());
        assert!(reply.body().is_none());
    }

    #[test]
    fn test_build_is_idempotent() {
        let mut builder = ReplyBuilder::new();
        builder.status(StatusCode::ACCEPTED);
        builder.text("queued");

        let first = builder.build();
        let second = builder.build();
        assert_eq!(first, second);
    }

    #[test]
    fn test_json_sets_content_type() {
        let mut builder = ReplyBuilder::new();
        builder.json(&serde_json::json!({"ok": true})).unwrap();

        let reply = builder.build();
        assert_eq!(reply.content_type(), Some("application/json"));
        assert_eq!(reply.body().unwrap().as_ref(), br#"{"ok":true}"#);
    }

    #[test]
    fn test_text_and_html_content_types() {
        let mut builder = ReplyBuilder::new();
        builder.text("hello");
        assert_eq!(
            builder.build().content_type(),
            Some("text/plain; charset=utf-8")
        );

        builder.html("<p>hello</p>");
        assert_eq!(
            builder.build().content_type(),
            Some("text/html; charset=utf-8")
        );
    }

    #[test]
    fn test_redirect_clears_body() {
        let mut builder = ReplyBuilder::new();
        builder.text("will be discarded");
        builder
            .redirect(StatusCode::SEE_OTHER, "https://example.com/next")
            .unwrap();

        let reply = builder.build();
        assert_eq!(reply.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            reply.headers().get(LOCATION).unwrap(),
            "https://example.com/next"
        );
        assert!(reply.body().is_none());
    }

    #[test]
    fn test_header_insert_and_append() {
        let mut builder = ReplyBuilder::new();
        builder.header("x-tag", "one").unwrap();
        builder.header("x-tag", "two").unwrap();
        assert_eq!(builder.build().headers().get_all("x-tag").iter().count(), 1);

        builder.append_header("x-tag", "three").unwrap();
        assert_eq!(builder.build().headers().get_all("x-tag").iter().count(), 2);

        builder.remove_header("x-tag");
        assert!(builder.build().headers().get("x-tag").is_none());
    }

    #[test]
    fn test_invalid_header_value_is_an_error() {
        let mut builder = ReplyBuilder::new();
        assert!(builder.header("x-bad", "line\nbreak").is_err());
    }
}
