//! A small service: global tracing, panic recovery and a request deadline,
//! plus a token check on the write route.
//!
//! ```text
//! cargo run --example basic
//! curl localhost:3000/users/7
//! curl -X POST localhost:3000/users -H 'authorization: Bearer demo' -d '{"name":"ana"}'
//! ```

use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use interpose::http::{health, HttpError, HttpInterceptor, HttpMeta, Response, Router, Server};
use interpose::interceptors::{CatchPanic, Timeout, Trace};
use interpose::{from_fn, Context, Error, Next, Result, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::load()?;

    let app = Router::new()
        .intercept(Trace::new().slow_threshold(Duration::from_millis(250)))
        .intercept(CatchPanic)
        .intercept(Timeout::new(Duration::from_secs(5)))
        .on(Method::GET, "/healthz", health::liveness)
        .on(Method::GET, "/readyz", health::readiness)
        .on(Method::GET, "/users/{id}", get_user)
        .on_with(Method::POST, "/users", create_user, [bearer("demo")]);

    Server::new(config).serve(app).await
}

fn bearer(expected: &'static str) -> HttpInterceptor {
    Arc::new(from_fn("bearer", move |ctx: Context<HttpMeta>, next: Next<HttpMeta, Response>| async move {
        let token = ctx.meta().header("authorization").and_then(|v| v.strip_prefix("Bearer "));
        if token != Some(expected) {
            return Err(Error::interceptor("bearer", HttpError::unauthorized("invalid token").into()));
        }
        next.run(ctx).await
    }))
}

async fn get_user(ctx: Context<HttpMeta>) -> Result<Response> {
    let id = ctx.meta().param("id").unwrap_or("unknown");
    Ok(Response::json(format!(r#"{{"id":"{id}"}}"#)))
}

async fn create_user(ctx: Context<HttpMeta>) -> Result<Response> {
    if ctx.meta().body().is_empty() {
        return Err(HttpError::bad_request("empty body").into());
    }
    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(ctx.meta().body().clone()))
}
