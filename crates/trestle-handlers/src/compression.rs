//! Response compression handler.
//!
//! Gzip-compresses reply bodies after downstream handlers finish, when
//! the client advertised `gzip` support, the body clears a minimum size,
//! and the content type is compressible. Sets `content-encoding` and
//! drops any stale `content-length`.

use flate2::write::GzEncoder;
use flate2::Compression;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
use std::io::Write;
use trestle_core::{BoxFuture, TrestleResult};
use trestle_pipeline::{Context, Handler, Next, Outcome};

/// Default minimum body size worth compressing, in bytes.
pub const DEFAULT_MIN_SIZE: usize = 1024;

/// Handler gzip-compressing suitable reply bodies.
///
/// # Example
///
/// ```
/// use trestle_handlers::CompressionHandler;
///
/// let compression = CompressionHandler::new().min_size(512);
/// ```
#[derive(Debug, Clone)]
pub struct CompressionHandler {
    min_size: usize,
    level: Compression,
}

impl Default for CompressionHandler {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            level: Compression::default(),
        }
    }
}

impl CompressionHandler {
    /// Creates the handler with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum body size worth compressing.
    #[must_use]
    pub fn min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    /// Uses the fastest compression level.
    #[must_use]
    pub fn fast(mut self) -> Self {
        self.level = Compression::fast();
        self
    }

    /// Uses the best compression ratio.
    #[must_use]
    pub fn best(mut self) -> Self {
        self.level = Compression::best();
        self
    }

    fn client_accepts_gzip(ctx: &Context) -> bool {
        ctx.request()
            .header(ACCEPT_ENCODING.as_str())
            .is_some_and(|value| {
                value
                    .split(',')
                    .any(|token| token.trim().starts_with("gzip"))
            })
    }

    fn compressible(content_type: Option<&str>) -> bool {
        content_type.is_some_and(|ct| {
            ct.starts_with("text/")
                || ct.starts_with("application/json")
                || ct.starts_with("application/javascript")
                || ct.starts_with("application/xml")
        })
    }

    fn gzip(&self, body: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        encoder.write_all(body)?;
        encoder.finish()
    }
}

impl Handler for CompressionHandler {
    fn name(&self) -> &'static str {
        "compression"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            let accepts = Self::client_accepts_gzip(ctx);

            next.run(ctx).await?;

            if !accepts {
                return Ok(Outcome::Continue);
            }
            if ctx.reply().headers().get(CONTENT_ENCODING).is_some() {
                return Ok(Outcome::Continue);
            }

            let content_type = ctx
                .reply()
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            if !Self::compressible(content_type.as_deref()) {
                return Ok(Outcome::Continue);
            }

            let Some(body) = ctx.reply().current_body().cloned() else {
                return Ok(Outcome::Continue);
            };
            if body.len() < self.min_size {
                return Ok(Outcome::Continue);
            }

            let compressed = self.gzip(&body)?;
            ctx.reply_mut().body(compressed);
            ctx.reply_mut().header(CONTENT_ENCODING.as_str(), "gzip")?;
            ctx.reply_mut().remove_header("content-length");
            Ok(Outcome::Continue)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use trestle_core::{CanonicalRequest, State};
    use trestle_pipeline::{FnHandler, Pipeline};

    fn request(accept_encoding: Option<&str>) -> CanonicalRequest {
        let mut builder = CanonicalRequest::builder().uri("https://example.com/big");
        if let Some(encoding) = accept_encoding {
            builder = builder.header(ACCEPT_ENCODING.as_str(), encoding);
        }
        builder.build().unwrap()
    }

    fn big_text<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            next.run(ctx).await?;
            ctx.reply_mut().text("x".repeat(4096));
            Ok(Outcome::Continue)
        })
    }

    fn tiny_text<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            next.run(ctx).await?;
            ctx.reply_mut().text("small");
            Ok(Outcome::Continue)
        })
    }

    fn big_pipeline() -> Pipeline {
        Pipeline::new()
            .with(CompressionHandler::new())
            .with(FnHandler::new("big", big_text))
    }

    fn tiny_pipeline() -> Pipeline {
        Pipeline::new()
            .with(CompressionHandler::new())
            .with(FnHandler::new("tiny", tiny_text))
    }

    #[tokio::test]
    async fn test_large_text_reply_is_gzipped() {
        let pipeline = big_pipeline();
        let reply = pipeline
            .run(request(Some("gzip, deflate")), &State::new())
            .await
            .unwrap();

        assert_eq!(reply.headers().get(CONTENT_ENCODING).unwrap(), "gzip");
        let mut decoder = GzDecoder::new(reply.body().unwrap().as_ref());
        let mut decompressed = String::new();
        decoder.read_to_string(&mut decompressed).unwrap();
        assert_eq!(decompressed, "x".repeat(4096));
    }

    #[tokio::test]
    async fn test_client_without_gzip_gets_identity() {
        let pipeline = big_pipeline();
        let reply = pipeline.run(request(None), &State::new()).await.unwrap();
        assert!(reply.headers().get(CONTENT_ENCODING).is_none());
        assert_eq!(reply.body().unwrap().len(), 4096);
    }

    #[tokio::test]
    async fn test_small_bodies_are_left_alone() {
        let pipeline = tiny_pipeline();
        let reply = pipeline
            .run(request(Some("gzip")), &State::new())
            .await
            .unwrap();
        assert!(reply.headers().get(CONTENT_ENCODING).is_none());
        assert_eq!(reply.body().unwrap().as_ref(), b"small");
    }
}
