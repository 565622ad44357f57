//! End-to-end behaviour of composed pipelines.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use interpose::interceptors::CancelGuard;
use interpose::{compose, from_fn, Context, Error, ExecContext, Next, Result, SharedInterceptor};

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone, Default)]
struct Meta {
    user: String,
}

fn ctx(user: &str) -> Context<Meta> {
    Context::new("test", "users.Get", Meta { user: user.to_owned() })
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Terminal handler that records itself and answers `"result"`.
fn handler(log: &Log) -> impl Fn(Context<Meta>) -> std::future::Ready<Result<String>> + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |_ctx| {
        log.lock().unwrap().push("handler".to_owned());
        std::future::ready(Ok("result".to_owned()))
    }
}

/// Records `enter-{name}` before and `exit-{name}` after calling next.
fn passthrough(name: &'static str, log: &Log) -> SharedInterceptor<Meta, String> {
    let log = Arc::clone(log);
    Arc::new(from_fn(name, move |ctx: Context<Meta>, next: Next<Meta, String>| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(format!("enter-{name}"));
            let out = next.run(ctx).await;
            log.lock().unwrap().push(format!("exit-{name}"));
            out
        }
    }))
}

/// Records `enter-{name}` and returns `err` without calling next.
fn blocker(name: &'static str, log: &Log) -> SharedInterceptor<Meta, String> {
    let log = Arc::clone(log);
    Arc::new(from_fn(name, move |_ctx: Context<Meta>, _next: Next<Meta, String>| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(format!("enter-{name}"));
            Err::<String, _>(Error::new(format!("{name} refused")))
        }
    }))
}

fn auth(log: &Log) -> SharedInterceptor<Meta, String> {
    let log = Arc::clone(log);
    Arc::new(from_fn("auth", move |ctx: Context<Meta>, next: Next<Meta, String>| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push("enter-auth".to_owned());
            if ctx.meta().user.is_empty() {
                return Err(Error::new(Unauthorized));
            }
            let out = next.run(ctx).await;
            log.lock().unwrap().push("exit-auth".to_owned());
            out
        }
    }))
}

fn suffix(tag: &'static str) -> SharedInterceptor<Meta, String> {
    Arc::new(from_fn(tag, move |ctx: Context<Meta>, next: Next<Meta, String>| async move {
        Ok::<_, Error>(format!("{}{tag}", next.run(ctx).await?))
    }))
}

#[derive(Debug)]
struct Unauthorized;

impl fmt::Display for Unauthorized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unauthorized")
    }
}

impl std::error::Error for Unauthorized {}

// ── Properties ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_chain_behaves_like_handler() {
    let direct_log: Log = Arc::default();
    let direct = handler(&direct_log)(ctx("ana")).await.unwrap();

    let piped_log: Log = Arc::default();
    let pipeline = compose(handler(&piped_log), []);
    let piped = pipeline.call(ctx("ana")).await.unwrap();

    assert_eq!(pipeline.depth(), 0);
    assert_eq!(direct, piped);
    assert_eq!(entries(&direct_log), entries(&piped_log));
}

#[tokio::test]
async fn interceptors_nest_in_declaration_order() {
    let log: Log = Arc::default();
    let pipeline = compose(
        handler(&log),
        [passthrough("I0", &log), passthrough("I1", &log), passthrough("I2", &log)],
    );

    assert_eq!(pipeline.call(ctx("ana")).await.unwrap(), "result");
    assert_eq!(
        entries(&log),
        ["enter-I0", "enter-I1", "enter-I2", "handler", "exit-I2", "exit-I1", "exit-I0"],
    );
}

#[tokio::test]
async fn short_circuit_stops_inner_layers() {
    let log: Log = Arc::default();
    let pipeline = compose(
        handler(&log),
        [passthrough("I0", &log), passthrough("I1", &log), blocker("I2", &log), passthrough("I3", &log)],
    );

    let err = pipeline.call(ctx("ana")).await.unwrap_err();

    assert_eq!(err.to_string(), "I2 refused");
    assert_eq!(entries(&log), ["enter-I0", "enter-I1", "enter-I2", "exit-I1", "exit-I0"]);
}

#[tokio::test]
async fn handler_error_reaches_caller_unchanged() {
    let pipeline = compose(
        |_ctx: Context<Meta>| async { Err::<String, _>(Error::new(Unauthorized)) },
        [suffix("-a"), suffix("-b")],
    );

    let err = pipeline.call(ctx("ana")).await.unwrap_err();

    assert!(err.downcast_ref::<Unauthorized>().is_some());
    assert!(err.interceptor_name().is_none());
}

#[tokio::test]
async fn annotated_error_unwraps_to_cause() {
    let annotate: SharedInterceptor<Meta, String> = Arc::new(from_fn(
        "annotate",
        |ctx: Context<Meta>, next: Next<Meta, String>| async move {
            next.run(ctx).await.map_err(|e| Error::interceptor("annotate", e))
        },
    ));
    let pipeline = compose(
        |_ctx: Context<Meta>| async { Err::<String, _>(Error::new(Unauthorized)) },
        [annotate],
    );

    let err = pipeline.call(ctx("ana")).await.unwrap_err();

    assert_eq!(err.to_string(), "interceptor[annotate]: unauthorized");
    assert!(err.downcast_ref::<Unauthorized>().is_some());
}

#[tokio::test]
async fn result_transforms_apply_innermost_first() {
    let log: Log = Arc::default();
    let pipeline = compose(handler(&log), [suffix("-outer"), suffix("-inner")]);

    assert_eq!(pipeline.call(ctx("ana")).await.unwrap(), "result-inner-outer");
}

#[tokio::test]
async fn interceptor_may_replace_error() {
    let recover: SharedInterceptor<Meta, String> = Arc::new(from_fn(
        "recover",
        |ctx: Context<Meta>, next: Next<Meta, String>| async move {
            match next.run(ctx).await {
                Err(err) if err.downcast_ref::<Unauthorized>().is_some() => Ok("guest".to_owned()),
                other => other,
            }
        },
    ));
    let log: Log = Arc::default();
    let pipeline = compose(handler(&log), [recover, auth(&log)]);

    assert_eq!(pipeline.call(ctx("")).await.unwrap(), "guest");
    assert_eq!(pipeline.call(ctx("ana")).await.unwrap(), "result");
}

#[tokio::test]
async fn auth_outermost_rejects_before_logging() {
    let log: Log = Arc::default();
    let pipeline = compose(handler(&log), [auth(&log), passthrough("logging", &log)]);

    let err = pipeline.call(ctx("")).await.unwrap_err();

    assert!(err.downcast_ref::<Unauthorized>().is_some());
    assert_eq!(entries(&log), ["enter-auth"]);
}

#[tokio::test]
async fn logging_outermost_observes_rejection() {
    let log: Log = Arc::default();
    let pipeline = compose(handler(&log), [passthrough("logging", &log), auth(&log)]);

    let err = pipeline.call(ctx("")).await.unwrap_err();

    assert_eq!(err.to_string(), "unauthorized");
    assert_eq!(entries(&log), ["enter-logging", "enter-auth", "exit-logging"]);
}

#[tokio::test]
async fn cancelled_context_never_reaches_handler() {
    let log: Log = Arc::default();
    let guard: SharedInterceptor<Meta, String> = Arc::new(CancelGuard);
    let pipeline = compose(handler(&log), [passthrough("outer", &log), guard]);

    let exec = ExecContext::background();
    exec.cancel();
    let err = pipeline
        .call(Context::with_exec(exec, "test", "users.Get", Meta::default()))
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(entries(&log), ["enter-outer", "exit-outer"]);
}

#[tokio::test]
async fn values_flow_downstream() {
    #[derive(Clone)]
    struct RequestId(u32);

    let stamp: SharedInterceptor<Meta, String> = Arc::new(from_fn(
        "stamp",
        |mut ctx: Context<Meta>, next: Next<Meta, String>| async move {
            ctx.insert(RequestId(99));
            next.run(ctx).await
        },
    ));
    let pipeline = compose(
        |ctx: Context<Meta>| async move {
            let id = ctx.get::<RequestId>().map(|id| id.0);
            Ok::<_, Error>(format!("{}:{:?}", ctx.meta().user, id))
        },
        [stamp],
    );

    assert_eq!(pipeline.call(ctx("ana")).await.unwrap(), "ana:Some(99)");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_pipeline_serves_concurrent_calls() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let count: SharedInterceptor<Meta, String> = Arc::new(from_fn(
        "count",
        move |ctx: Context<Meta>, next: Next<Meta, String>| {
            counter.fetch_add(1, Ordering::SeqCst);
            next.run(ctx)
        },
    ));
    let pipeline = compose(
        |ctx: Context<Meta>| async move { Ok::<_, Error>(ctx.meta().user.clone()) },
        [count],
    );

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.call(ctx(&format!("user{i}"))).await })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap().unwrap(), format!("user{i}"));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 32);
}
