//! JSON body-parsing handler.
//!
//! Parses a JSON request body into the state bag under the `body` key so
//! downstream handlers read structured data instead of raw bytes. A body
//! whose content type claims JSON but fails to parse stops the pipeline
//! with `400 Bad Request`.

use http::header::CONTENT_TYPE;
use http::StatusCode;
use trestle_core::{BoxFuture, ReplyBuilder, TrestleResult};
use trestle_pipeline::{Context, Handler, Next, Outcome};

/// The state key the parsed body is stored under.
pub const BODY_STATE_KEY: &str = "body";

/// Handler parsing JSON request bodies into `state["body"]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBodyHandler;

impl JsonBodyHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn claims_json(ctx: &Context) -> bool {
        ctx.request()
            .header(CONTENT_TYPE.as_str())
            .is_some_and(|ct| ct.starts_with("application/json"))
    }
}

impl Handler for JsonBodyHandler {
    fn name(&self) -> &'static str {
        "json-body"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            if Self::claims_json(ctx) {
                if let Some(body) = ctx.request().body() {
                    match serde_json::from_slice::<serde_json::Value>(body) {
                        Ok(value) => ctx.state_mut().insert_value(BODY_STATE_KEY, value),
                        Err(error) => {
                            tracing::debug!(%error, "rejecting malformed json body");
                            let mut reply = ReplyBuilder::new();
                            reply.status(StatusCode::BAD_REQUEST).json(&serde_json::json!({
                                "error": {
                                    "code": "MALFORMED_BODY",
                                    "message": "request body is not valid json",
                                }
                            }))?;
                            return Ok(Outcome::Stop(reply.build()));
                        }
                    }
                }
            }

            next.run(ctx).await?;
            Ok(Outcome::Continue)
        })
    }
}
