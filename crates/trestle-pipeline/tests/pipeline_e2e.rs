//! End-to-end pipeline behavior tests.
//!
//! These cover the engine's observable contract: onion ordering,
//! short-circuit capture, lifecycle hooks, the no-continuation edge case,
//! and error propagation through the continuation chain.

use http::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use trestle_core::{BoxFuture, CanonicalRequest, ReplyBuilder, State, TrestleError, TrestleResult};
use trestle_pipeline::{Context, FnHandler, Handler, Next, Outcome, Pipeline};

fn get_request() -> CanonicalRequest {
    CanonicalRequest::builder()
        .uri("https://example.com/orders")
        .build()
        .unwrap()
}

/// Records entry/exit events around its continuation.
struct Tracer {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Handler for Tracer {
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(format!("enter:{}", self.name));
            next.run(ctx).await?;
            self.log.lock().unwrap().push(format!("exit:{}", self.name));
            Ok(Outcome::Continue)
        })
    }
}

/// Counts lifecycle hook invocations.
struct Probe {
    started: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
}

impl Handler for Probe {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            next.run(ctx).await?;
            Ok(Outcome::Continue)
        })
    }

    fn on_start(&self) -> BoxFuture<'_, TrestleResult<()>> {
        Box::pin(async {
            // Widen the race window for the concurrent-first-run test.
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn on_stop(&self) -> BoxFuture<'_, TrestleResult<()>> {
        Box::pin(async {
            self.stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[tokio::test]
async fn entry_order_is_registration_order_and_resumption_is_reversed() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut pipeline = Pipeline::new();
    for name in ["h1", "h2", "h3"] {
        pipeline.append(Tracer {
            name,
            log: log.clone(),
        });
    }

    pipeline.run(get_request(), &State::new()).await.unwrap();

    let events = log.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "enter:h1", "enter:h2", "enter:h3", "exit:h3", "exit:h2", "exit:h1"
        ]
    );
}

#[tokio::test]
async fn stop_returns_exactly_that_reply_and_skips_downstream() {
    fn noop<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            next.run(ctx).await?;
            Ok(Outcome::Continue)
        })
    }

    struct Stopper(trestle_core::CanonicalReply);
    impl Handler for Stopper {
        fn name(&self) -> &'static str {
            "stopper"
        }
        fn handle<'a>(
            &'a self,
            _ctx: &'a mut Context,
            _next: Next<'a>,
        ) -> BoxFuture<'a, TrestleResult<Outcome>> {
            Box::pin(async move { Ok(Outcome::Stop(self.0.clone())) })
        }
    }

    struct Unreachable(Arc<AtomicUsize>);
    impl Handler for Unreachable {
        fn name(&self) -> &'static str {
            "unreachable"
        }
        fn handle<'a>(
            &'a self,
            ctx: &'a mut Context,
            next: Next<'a>,
        ) -> BoxFuture<'a, TrestleResult<Outcome>> {
            Box::pin(async move {
                self.0.fetch_add(1, Ordering::SeqCst);
                next.run(ctx).await?;
                Ok(Outcome::Continue)
            })
        }
    }

    let reached = Arc::new(AtomicUsize::new(0));
    let reached_probe = reached.clone();

    let mut expected = ReplyBuilder::new();
    expected
        .status(StatusCode::TOO_MANY_REQUESTS)
        .json(&serde_json::json!({"error": "slow down"}))
        .unwrap();
    let expected = expected.build();
    let stop_reply = expected.clone();

    let pipeline = Pipeline::new()
        .with(FnHandler::new("noop", noop))
        .with(Stopper(stop_reply))
        .with(Unreachable(reached_probe));

    let reply = pipeline.run(get_request(), &State::new()).await.unwrap();

    assert_eq!(reply, expected);
    assert_eq!(reached.load(Ordering::SeqCst), 0, "downstream handler ran");
}

#[tokio::test]
async fn on_start_runs_once_across_sequential_runs() {
    let started = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new().with(Probe {
        started: started.clone(),
        stopped: stopped.clone(),
    });

    for _ in 0..3 {
        pipeline.run(get_request(), &State::new()).await.unwrap();
    }

    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(stopped.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_first_runs_share_one_initialization() {
    let started = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicUsize::new(0));
    let pipeline = Arc::new(Pipeline::new().with(Probe {
        started: started.clone(),
        stopped: stopped.clone(),
    }));

    let state = State::new();
    let a = pipeline.run(get_request(), &state);
    let b = pipeline.run(get_request(), &state);
    let (ra, rb) = tokio::join!(a, b);
    ra.unwrap();
    rb.unwrap();

    assert_eq!(started.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn shutdown_runs_on_stop_hooks() {
    let started = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new().with(Probe {
        started: started.clone(),
        stopped: stopped.clone(),
    });

    pipeline.shutdown().await.unwrap();
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn handler_without_continuation_ends_the_run_with_builder_contents() {
    fn eager<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        let _ = next;
        Box::pin(async move {
            ctx.reply_mut().status(StatusCode::ACCEPTED).text("queued");
            Ok(Outcome::Continue)
        })
    }

    struct Counter(Arc<AtomicUsize>);
    impl Handler for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }
        fn handle<'a>(
            &'a self,
            ctx: &'a mut Context,
            next: Next<'a>,
        ) -> BoxFuture<'a, TrestleResult<Outcome>> {
            Box::pin(async move {
                self.0.fetch_add(1, Ordering::SeqCst);
                next.run(ctx).await?;
                Ok(Outcome::Continue)
            })
        }
    }

    let never = Arc::new(AtomicUsize::new(0));
    let never_probe = never.clone();

    let pipeline = Pipeline::new()
        .with(FnHandler::new("eager", eager))
        .with(Counter(never_probe));

    let reply = pipeline.run(get_request(), &State::new()).await.unwrap();

    assert_eq!(reply.status(), StatusCode::ACCEPTED);
    assert_eq!(reply.body().unwrap().as_ref(), b"queued");
    assert_eq!(never.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn after_phase_header_lands_on_the_final_reply() {
    // h1 continues, then appends a header once downstream has finished;
    // h2 sets status and a JSON body.
    fn decorate<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            next.run(ctx).await?;
            ctx.reply_mut().append_header("x-post", "1")?;
            Ok(Outcome::Continue)
        })
    }

    fn produce<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            next.run(ctx).await?;
            ctx.reply_mut().status(StatusCode::CREATED);
            ctx.reply_mut().json(&serde_json::json!({"ok": true}))?;
            Ok(Outcome::Continue)
        })
    }

    let pipeline = Pipeline::new()
        .with(FnHandler::new("decorate", decorate))
        .with(FnHandler::new("produce", produce));

    let reply = pipeline.run(get_request(), &State::new()).await.unwrap();

    assert_eq!(reply.status(), StatusCode::CREATED);
    assert_eq!(reply.body().unwrap().as_ref(), br#"{"ok":true}"#);
    assert_eq!(reply.headers().get("x-post").unwrap(), "1");
}

#[tokio::test]
async fn ordinary_errors_propagate_out_of_run() {
    fn fail<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        let _ = (ctx, next);
        Box::pin(async move { Err(TrestleError::handler("fail", "boom")) })
    }

    let pipeline = Pipeline::new().with(FnHandler::new("fail", fail));
    let result = pipeline.run(get_request(), &State::new()).await;
    assert!(matches!(result, Err(TrestleError::Handler { .. })));
}

#[tokio::test]
async fn earlier_handler_can_centralize_error_handling() {
    fn catcher<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            if let Err(error) = next.run(ctx).await {
                ctx.reply_mut()
                    .status(StatusCode::BAD_GATEWAY)
                    .json(&serde_json::json!({"error": error.to_string()}))?;
            }
            Ok(Outcome::Continue)
        })
    }

    fn fail<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        let _ = (ctx, next);
        Box::pin(async move { Err(TrestleError::handler("fail", "downstream broke")) })
    }

    let pipeline = Pipeline::new()
        .with(FnHandler::new("catcher", catcher))
        .with(FnHandler::new("fail", fail));

    let reply = pipeline.run(get_request(), &State::new()).await.unwrap();
    assert_eq!(reply.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(reply.content_type(), Some("application/json"));
}

#[tokio::test]
async fn state_flows_between_handlers() {
    fn writer<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            ctx.state_mut().insert("user", "alice")?;
            next.run(ctx).await?;
            Ok(Outcome::Continue)
        })
    }

    fn reader<'a>(ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, TrestleResult<Outcome>> {
        Box::pin(async move {
            next.run(ctx).await?;
            let user: String = ctx
                .state()
                .get_as("user")
                .ok_or_else(|| TrestleError::handler("reader", "missing user"))?;
            ctx.reply_mut().text(format!("hello {user}"));
            Ok(Outcome::Continue)
        })
    }

    let pipeline = Pipeline::new()
        .with(FnHandler::new("writer", writer))
        .with(FnHandler::new("reader", reader));

    let mut initial = State::new();
    initial.insert("env", "test").unwrap();

    let reply = pipeline.run(get_request(), &initial).await.unwrap();
    assert_eq!(reply.body().unwrap().as_ref(), b"hello alice");
    // The caller's bag was copied, not shared.
    assert!(!initial.contains("user"));
}
