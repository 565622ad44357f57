//! # interpose
//!
//! Interceptor pipelines around async handlers.
//!
//! A **pipeline** is a terminal handler wrapped in an ordered list of
//! **interceptors**. Calling it runs the interceptors in declaration order on
//! the way in and in reverse order on the way out, exactly like nested
//! function calls, because that is what it is:
//!
//! ```text
//! compose(handler, [auth, trace])
//!
//!   auth ─► trace ─► handler
//!   auth ◄─ trace ◄─┘
//! ```
//!
//! Any interceptor can stop the call by not running `next`; whatever it
//! returns becomes the pipeline's result. Nothing else is implicit: the
//! builder does not log, retry, recover or check for cancellation. Those are
//! interceptors too (see [`interceptors`]).
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use interpose::{compose, from_fn, Context, Error, Next, Result, SharedInterceptor};
//!
//! struct Caller { user: String }
//!
//! async fn greet(ctx: Context<Caller>) -> Result<String> {
//!     Ok(format!("hello, {}", ctx.meta().user))
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let auth: SharedInterceptor<Caller, String> = Arc::new(from_fn(
//!     "auth",
//!     |ctx: Context<Caller>, next: Next<Caller, String>| async move {
//!         if ctx.meta().user.is_empty() {
//!             return Err(Error::new("unauthorized"));
//!         }
//!         next.run(ctx).await
//!     },
//! ));
//!
//! let pipeline = compose(greet, [auth]);
//!
//! let ok = pipeline.call(Context::new("rpc", "greet", Caller { user: "ana".into() })).await?;
//! assert_eq!(ok, "hello, ana");
//!
//! let denied = pipeline.call(Context::new("rpc", "greet", Caller { user: String::new() })).await;
//! assert_eq!(denied.unwrap_err().to_string(), "unauthorized");
//! # Ok(())
//! # }
//! ```
//!
//! ## Layout
//!
//! - [`Context`] / [`ExecContext`]: per-call carrier with cancellation and deadline.
//! - [`Interceptor`], [`Next`], [`from_fn`]: the interception contract.
//! - [`compose`], [`Chain`], [`Pipeline`]: composition.
//! - [`bridge`]: connecting a transport to pipelines.
//! - [`http`]: router and server built on `hyper`.
//! - [`ServerConfig`]: layered server configuration.

mod chain;
mod context;
mod error;
mod handler;
mod interceptor;

pub mod bridge;
pub mod config;
pub mod http;
pub mod interceptors;

pub use crate::chain::{compose, Chain, Pipeline};
pub use crate::config::ServerConfig;
pub use crate::context::{Context, ExecContext};
pub use crate::error::{BoxError, Error, Result};
pub use crate::handler::{BoxFuture, Handler};
pub use crate::interceptor::{from_fn, Interceptor, InterceptorFn, Next, SharedInterceptor};
