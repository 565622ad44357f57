//! HTTP adapter.
//!
//! Connects `hyper` to interceptor pipelines:
//!
//! - [`Router`]: explicit route registry, one pipeline per route;
//! - [`HttpBridge`]: turns a request into a [`Context<HttpMeta>`];
//! - [`Server`]: accept loop and graceful shutdown;
//! - [`health`]: Kubernetes probe handlers.
//!
//! ```rust,no_run
//! use http::Method;
//! use interpose::http::{health, HttpMeta, Response, Router, Server};
//! use interpose::interceptors::{CatchPanic, Trace};
//! use interpose::{Context, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let app = Router::new()
//!         .intercept(Trace::new())
//!         .intercept(CatchPanic)
//!         .on(Method::GET, "/healthz", health::liveness)
//!         .on(Method::GET, "/users/{id}", get_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! async fn get_user(ctx: Context<HttpMeta>) -> Result<Response> {
//!     let id = ctx.meta().param("id").unwrap_or("unknown");
//!     Ok(Response::json(format!(r#"{{"id":"{id}"}}"#)))
//! }
//! ```

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bridge::Bridge;
use crate::context::{Context, ExecContext};
use crate::error::Error;

pub mod health;
mod meta;
mod response;
mod router;
mod server;

pub use meta::HttpMeta;
pub use response::{HttpError, IntoResponse, Response, ResponseBuilder};
pub use router::{HttpInterceptor, Router};
pub use server::Server;

/// Protocol tag on every HTTP context.
pub const PROTOCOL: &str = "http";

/// [`Bridge`] from routed requests to HTTP pipelines.
///
/// The context method is the route's handler key (`GET /users/{id}`) and the
/// metadata is the request itself. Each execution context gets a child of the
/// server's shutdown token and, when configured, the request timeout as its
/// deadline. [`Router`] enforces that deadline with an outermost
/// [`CancelGuard`](crate::interceptors::CancelGuard). Any guarded call still
/// running when shutdown begins ends with [`Error::Cancelled`] (503).
#[derive(Debug, Clone, Default)]
pub struct HttpBridge {
    request_timeout: Option<Duration>,
    shutdown: CancellationToken,
}

impl HttpBridge {
    pub fn new(request_timeout: Option<Duration>) -> Self {
        Self { request_timeout, shutdown: CancellationToken::new() }
    }

    /// Request contexts are cancelled when `shutdown` is.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }
}

impl Bridge<HttpMeta, Response> for HttpBridge {
    type Meta = HttpMeta;

    fn protocol(&self) -> &str {
        PROTOCOL
    }

    fn method(&self, native: &HttpMeta) -> String {
        native.route().to_owned()
    }

    fn extract_meta(&self, native: &HttpMeta) -> HttpMeta {
        native.clone()
    }

    fn create_context(&self, native: &HttpMeta) -> Context<HttpMeta> {
        let exec = ExecContext::background().with_token(self.shutdown.child_token());
        let exec = match self.request_timeout {
            Some(timeout) => exec.with_timeout(timeout),
            None => exec,
        };
        Context::with_exec(exec, PROTOCOL, self.method(native), self.extract_meta(native))
    }

    fn on_success(&self, native: &HttpMeta, result: &Response) {
        debug!(route = native.route(), status = %result.status_code(), "request handled");
    }

    fn on_error(&self, native: &HttpMeta, err: &Error) {
        debug!(route = native.route(), error = %err, "request failed");
    }
}
