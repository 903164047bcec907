//! Bearer-token authentication handler.
//!
//! Gates downstream handlers behind a static bearer token. Requests with
//! a missing or wrong token stop with `401 Unauthorized`; accepted
//! requests get `state["authenticated"] = true` for downstream use.

use http::header::AUTHORIZATION;
use http::StatusCode;
use trestle_core::{BoxFuture, ReplyBuilder, TrestleResult};
use trestle_pipeline::{Context, Handler, Next, Outcome};

/// The state key marking an authenticated request.
pub const AUTHENTICATED_STATE_KEY: &str = "authenticated";

/// Handler enforcing a static bearer token.
///
/// # Example
///
/// ```
/// use trestle_handlers::BearerAuthHandler;
///
/// let auth = BearerAuthHandler::new("s3cret");
/// ```
#[derive(Debug, Clone)]
pub struct BearerAuthHandler {
    token: String,
}

impl BearerAuthHandler {
    /// Creates a handler accepting the given token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    fn unauthorized() -> TrestleResult<Outcome> {
        let mut reply = ReplyBuilder::new();
        reply.status(StatusCode::UNAUTHORIZED).json(&serde_json::json!({
            "error": {
                "code": "UNAUTHORIZED",
                "message": "missing or invalid bearer token",
            }
        }))?;
        reply.header("www-authenticate", "Bearer")?;
        Ok(Outcome::Stop(reply.build()))
    }
}

impl Handler for BearerAuthHandler {
    fn name(&self) -> &'static str {
        "bearer-auth"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            let authorized = ctx
                .request()
                .header(AUTHORIZATION.as_str())
                .and_then(|value| value.strip_prefix("Bearer "))
                .is_some_and(|candidate| candidate == self.token);

            if !authorized {
                return Self::unauthorized();
            }

            ctx.state_mut().insert(AUTHENTICATED_STATE_KEY, true)?;
            next.run(ctx).await?;
            Ok(Outcome::Continue)
        })
    }
}
