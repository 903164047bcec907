//! Error types for Trestle.
//!
//! [`TrestleError`] is the standard error type used throughout the
//! workspace. The pipeline engine recovers nothing on its own: every
//! ordinary failure propagates out of `Pipeline::run` through each pending
//! continuation, exactly like an unhandled error in nested calls. Adapters
//! surface translation failures with the [`TrestleError::Adapter`] variant
//! before the pipeline ever runs.
//!
//! Short-circuiting a pipeline is *not* an error: it travels as an
//! `Outcome` value, never through `Err`, so user error handling can neither
//! intercept nor fabricate it.

use http::Uri;
use thiserror::Error;

/// Result type alias using [`TrestleError`].
pub type TrestleResult<T> = Result<T, TrestleError>;

/// Standard error type for Trestle.
///
/// # Example
///
/// ```
/// use trestle_core::{TrestleError, TrestleResult};
///
/// fn require_token(header: Option<&str>) -> TrestleResult<&str> {
///     header.ok_or_else(|| TrestleError::handler("auth", "missing token"))
/// }
/// ```
#[derive(Error, Debug)]
pub enum TrestleError {
    /// Request metadata derivation requires an absolute URI.
    #[error("request uri must be absolute, got '{uri}'")]
    RelativeUrl {
        /// The offending URI.
        uri: Uri,
    },

    /// Header name/value or status construction failed.
    #[error(transparent)]
    Http(#[from] http::Error),

    /// JSON body (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure (body encoding, compression).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A host adapter could not translate a native message.
    ///
    /// Surfaced at the boundary, before the pipeline runs.
    #[error("adapter '{adapter}': {message}")]
    Adapter {
        /// Name of the adapter that failed.
        adapter: &'static str,
        /// Human-readable description of the failure.
        message: String,
        /// The underlying error, when one exists.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A handler surfaced a failure of its own.
    #[error("handler '{name}': {message}")]
    Handler {
        /// Name of the failing handler.
        name: String,
        /// Human-readable description of the failure.
        message: String,
        /// The underlying error, when one exists.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl TrestleError {
    /// Creates an adapter translation error.
    #[must_use]
    pub fn adapter(adapter: &'static str, message: impl Into<String>) -> Self {
        Self::Adapter {
            adapter,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an adapter translation error wrapping a source error.
    pub fn adapter_with_source(
        adapter: &'static str,
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Adapter {
            adapter,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a handler error.
    #[must_use]
    pub fn handler(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            name: name.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a handler error wrapping a source error.
    pub fn handler_with_source(
        name: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Handler {
            name: name.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_url_message() {
        let uri: Uri = "/orders?page=2".parse().unwrap();
        let error = TrestleError::RelativeUrl { uri };
        assert!(error.to_string().contains("/orders?page=2"));
    }

    #[test]
    fn test_adapter_error() {
        let error = TrestleError::adapter("hyper", "missing host header");
        assert_eq!(
            error.to_string(),
            "adapter 'hyper': missing host header"
        );
    }

    #[test]
    fn test_adapter_error_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let error = TrestleError::adapter_with_source("hyper", "body read failed", io);
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_handler_error() {
        let error = TrestleError::handler("rate-limit", "store unavailable");
        assert!(error.to_string().contains("rate-limit"));
        assert!(error.to_string().contains("store unavailable"));
    }

    #[test]
    fn test_json_error_conversion() {
        let bad = serde_json::from_str::<serde_json::Value>("{nope");
        let error: TrestleError = bad.unwrap_err().into();
        assert!(matches!(error, TrestleError::Json(_)));
    }
}
