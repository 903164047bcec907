//! Per-request metadata derivation.
//!
//! [`RequestMeta`] is derived exactly once when a context is created:
//! correlation id, start time, parsed URI, method, and a best-effort
//! client IP taken from proxy headers.
//!
//! ## Correlation id sources
//!
//! 1. The first present header among [`CORRELATION_HEADERS`], in order.
//! 2. A freshly generated UUID v7 otherwise. UUID v7 is time-ordered,
//!    which keeps generated ids naturally sortable in logs.
//!
//! ## Client IP
//!
//! The proxy headers in [`CLIENT_IP_HEADERS`] are checked in order. For a
//! forwarded-for chain only the first entry is considered. A candidate is
//! accepted only if it parses as a syntactically valid IPv4 or IPv6
//! address; otherwise the remaining headers are consulted. When nothing
//! validates the field stays absent.

use crate::error::{TrestleError, TrestleResult};
use crate::request::CanonicalRequest;
use http::{Method, Uri};
use std::net::IpAddr;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Correlation-id headers, checked in priority order.
pub const CORRELATION_HEADERS: [&str; 2] = ["x-request-id", "x-correlation-id"];

/// Proxy headers that may carry the client address, in priority order.
pub const CLIENT_IP_HEADERS: [&str; 4] = [
    "x-forwarded-for",
    "x-real-ip",
    "cf-connecting-ip",
    "true-client-ip",
];

/// Metadata derived once per request.
///
/// Every field is read-only after derivation with one documented
/// exception: [`RequestMeta::set_id`] lets a correlation handler overwrite
/// the id from a header value post hoc. Mutability does not extend to any
/// other field.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    /// Correlation id: existing header value or a generated UUID v7.
    id: String,
    /// When the context was created.
    started_at: Instant,
    /// The request method.
    method: Method,
    /// The absolute request URI.
    uri: Uri,
    /// Best-effort client address; absent when no proxy header validates.
    ip: Option<IpAddr>,
}

impl RequestMeta {
    /// Derives metadata from a canonical request.
    ///
    /// # Errors
    ///
    /// Returns [`TrestleError::RelativeUrl`] when the request URI lacks a
    /// scheme or authority. This is an ordinary error, not a
    /// short-circuit: it propagates to the caller of `run`.
    pub fn derive(request: &CanonicalRequest) -> TrestleResult<Self> {
        if !request.is_absolute() {
            return Err(TrestleError::RelativeUrl {
                uri: request.uri().clone(),
            });
        }

        Ok(Self {
            id: derive_id(request),
            started_at: Instant::now(),
            method: request.method().clone(),
            uri: request.uri().clone(),
            ip: derive_ip(request),
        })
    }

    /// Returns the correlation id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Overwrites the correlation id.
    ///
    /// Metadata is otherwise read-only; this single mutation exists so a
    /// correlation handler can re-derive the id under its own trust rules
    /// after the context was created.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Returns when the request started processing.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the absolute request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the URI path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Returns the validated client address, if one was derived.
    #[must_use]
    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }
}

fn derive_id(request: &CanonicalRequest) -> String {
    for name in CORRELATION_HEADERS {
        if let Some(value) = request.header(name) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    Uuid::now_v7().to_string()
}

fn derive_ip(request: &CanonicalRequest) -> Option<IpAddr> {
    for name in CLIENT_IP_HEADERS {
        let Some(value) = request.header(name) else {
            continue;
        };
        // Forwarded-for chains list the client first.
        let Some(candidate) = value.split(',').next().map(str::trim) else {
            continue;
        };
        if let Ok(ip) = candidate.parse::<IpAddr>() {
            return Some(ip);
        }
    }
    None
}
