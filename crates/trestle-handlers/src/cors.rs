//! CORS handler.
//!
//! Answers preflight `OPTIONS` requests directly (short-circuit, no
//! downstream handler runs) and decorates ordinary replies with the
//! response headers browsers require for cross-origin access.

use http::{Method, StatusCode};
use std::collections::HashSet;
use std::time::Duration;
use trestle_core::{BoxFuture, ReplyBuilder, TrestleResult};
use trestle_pipeline::{Context, Handler, Next, Outcome};

/// CORS header names.
pub mod headers {
    /// `Access-Control-Allow-Origin` header.
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Methods` header.
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Allow-Headers` header.
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    /// `Access-Control-Allow-Credentials` header.
    pub const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
    /// `Access-Control-Max-Age` header.
    pub const MAX_AGE: &str = "access-control-max-age";
    /// `Access-Control-Request-Method` header (preflight).
    pub const REQUEST_METHOD: &str = "access-control-request-method";
    /// `Origin` header.
    pub const ORIGIN: &str = "origin";
    /// `Vary` header.
    pub const VARY: &str = "vary";
}

/// Allowed origins.
#[derive(Debug, Clone)]
enum AllowedOrigins {
    /// Any origin (`*`).
    Any,
    /// An explicit allow list.
    List(HashSet<String>),
}

/// CORS handler with a builder surface.
///
/// # Example
///
/// ```
/// use trestle_handlers::CorsHandler;
/// use http::Method;
/// use std::time::Duration;
///
/// let cors = CorsHandler::builder()
///     .allow_origin("https://app.example.com")
///     .allow_methods([Method::GET, Method::POST])
///     .allow_headers(["content-type", "authorization"])
///     .max_age(Duration::from_secs(3600))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct CorsHandler {
    allowed_origins: AllowedOrigins,
    allowed_methods: Vec<Method>,
    allowed_headers: Vec<String>,
    allow_credentials: bool,
    max_age: Option<Duration>,
}

/// Builder for [`CorsHandler`].
#[derive(Debug, Clone)]
pub struct CorsBuilder {
    origins: HashSet<String>,
    any_origin: bool,
    methods: Vec<Method>,
    headers: Vec<String>,
    credentials: bool,
    max_age: Option<Duration>,
}

impl Default for CorsBuilder {
    fn default() -> Self {
        Self {
            origins: HashSet::new(),
            any_origin: false,
            methods: vec![Method::GET, Method::POST, Method::PUT, Method::DELETE],
            headers: vec!["content-type".to_string()],
            credentials: false,
            max_age: None,
        }
    }
}

impl CorsBuilder {
    /// Allows any origin (`*`). Incompatible with credentials.
    #[must_use]
    pub fn allow_any_origin(mut self) -> Self {
        self.any_origin = true;
        self
    }

    /// Adds an allowed origin.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.origins.insert(origin.into());
        self
    }

    /// Replaces the allowed method set.
    #[must_use]
    pub fn allow_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Replaces the allowed request-header set.
    #[must_use]
    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Allows credentials (cookies, authorization headers).
    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.credentials = allow;
        self
    }

    /// Sets the preflight cache duration.
    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Builds the handler.
    #[must_use]
    pub fn build(self) -> CorsHandler {
        CorsHandler {
            allowed_origins: if self.any_origin {
                AllowedOrigins::Any
            } else {
                AllowedOrigins::List(self.origins)
            },
            allowed_methods: self.methods,
            allowed_headers: self.headers,
            allow_credentials: self.credentials,
            max_age: self.max_age,
        }
    }
}

impl CorsHandler {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> CorsBuilder {
        CorsBuilder::default()
    }

    /// Creates a permissive handler allowing any origin.
    #[must_use]
    pub fn permissive() -> Self {
        Self::builder().allow_any_origin().build()
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        match &self.allowed_origins {
            AllowedOrigins::Any => true,
            AllowedOrigins::List(origins) => origins.contains(origin),
        }
    }

    fn allow_origin_value(&self, origin: &str) -> String {
        match &self.allowed_origins {
            AllowedOrigins::Any if !self.allow_credentials => "*".to_string(),
            _ => origin.to_string(),
        }
    }

    fn preflight_reply(&self, origin: &str) -> TrestleResult<Outcome> {
        let mut reply = ReplyBuilder::new();
        reply.status(StatusCode::NO_CONTENT);
        reply.header(headers::ALLOW_ORIGIN, self.allow_origin_value(origin).as_str())?;
        reply.header(
            headers::ALLOW_METHODS,
            self.allowed_methods
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ")
                .as_str(),
        )?;
        reply.header(
            headers::ALLOW_HEADERS,
            self.allowed_headers.join(", ").as_str(),
        )?;
        if self.allow_credentials {
            reply.header(headers::ALLOW_CREDENTIALS, "true")?;
        }
        if let Some(max_age) = self.max_age {
            reply.header(headers::MAX_AGE, max_age.as_secs().to_string().as_str())?;
        }
        reply.header(headers::VARY, "origin")?;
        Ok(Outcome::Stop(reply.build()))
    }
}

impl Handler for CorsHandler {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            let origin = ctx.request().header(headers::ORIGIN).map(ToString::to_string);

            // Preflight: OPTIONS with a requested method, answered here.
            if ctx.request().method() == Method::OPTIONS
                && ctx.request().header(headers::REQUEST_METHOD).is_some()
            {
                if let Some(origin) = origin.as_deref() {
                    if self.origin_allowed(origin) {
                        return self.preflight_reply(origin);
                    }
                }
                let mut reply = ReplyBuilder::new();
                reply.status(StatusCode::FORBIDDEN).text("origin not allowed");
                return Ok(Outcome::Stop(reply.build()));
            }

            next.run(ctx).await?;

            if let Some(origin) = origin.as_deref() {
                if self.origin_allowed(origin) {
                    let allow = self.allow_origin_value(origin);
                    ctx.reply_mut()
                        .header(headers::ALLOW_ORIGIN, allow.as_str())?;
                    if self.allow_credentials {
                        ctx.reply_mut().header(headers::ALLOW_CREDENTIALS, "true")?;
                    }
                    ctx.reply_mut().append_header(headers::VARY, "origin")?;
                }
            }
            Ok(Outcome::Continue)
        })
    }
}
