//! Security headers handler.
//!
//! Applies a small set of static response headers after downstream
//! handlers finish. Headers a downstream handler already set are left
//! alone.

use trestle_core::{BoxFuture, TrestleResult};
use trestle_pipeline::{Context, Handler, Next, Outcome};

/// Handler adding standard security headers to every reply.
///
/// Defaults: `x-content-type-options: nosniff`, `x-frame-options: DENY`,
/// `referrer-policy: no-referrer`. HSTS is opt-in since it only makes
/// sense behind TLS.
#[derive(Debug, Clone)]
pub struct SecurityHeadersHandler {
    frame_options: &'static str,
    referrer_policy: &'static str,
    hsts: Option<String>,
}

impl Default for SecurityHeadersHandler {
    fn default() -> Self {
        Self {
            frame_options: "DENY",
            referrer_policy: "no-referrer",
            hsts: None,
        }
    }
}

impl SecurityHeadersHandler {
    /// Creates the handler with default policies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows same-origin framing instead of denying all framing.
    #[must_use]
    pub fn same_origin_frames(mut self) -> Self {
        self.frame_options = "SAMEORIGIN";
        self
    }

    /// Sets the referrer policy value.
    #[must_use]
    pub fn referrer_policy(mut self, policy: &'static str) -> Self {
        self.referrer_policy = policy;
        self
    }

    /// Enables `strict-transport-security` with the given max age.
    #[must_use]
    pub fn hsts(mut self, max_age_secs: u64) -> Self {
        self.hsts = Some(format!("max-age={max_age_secs}"));
        self
    }
}

impl Handler for SecurityHeadersHandler {
    fn name(&self) -> &'static str {
        "security-headers"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            next.run(ctx).await?;

            let pairs = [
                ("x-content-type-options", "nosniff"),
                ("x-frame-options", self.frame_options),
                ("referrer-policy", self.referrer_policy),
            ];
            for (name, value) in pairs {
                if ctx.reply().headers().get(name).is_none() {
                    ctx.reply_mut().header(name, value)?;
                }
            }
            if let Some(hsts) = &self.hsts {
                if ctx.reply().headers().get("strict-transport-security").is_none() {
                    ctx.reply_mut()
                        .header("strict-transport-security", hsts.as_str())?;
                }
            }
            Ok(Outcome::Continue)
        })
    }
}
