//! The [`Interceptor`] trait and the [`Next`] continuation.
//!
//! An interceptor sits around everything after it in a pipeline. It gets the
//! call's [`Context`] and a [`Next`] and decides:
//!
//! - **continue**: `next.run(ctx).await`, optionally inspecting or replacing
//!   what comes back;
//! - **short-circuit**: return its own result or error without running
//!   `next`. Nothing further down the chain executes.
//!
//! `Next::run` takes `self`, so an interceptor continues the chain at most
//! once per call.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Result;
use crate::handler::{BoxFuture, BoxedHandler};

/// Cross-cutting behaviour wrapped around a handler.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use interpose::{Context, Error, Interceptor, Next, Result};
///
/// struct Auth;
///
/// #[async_trait]
/// impl Interceptor<String, String> for Auth {
///     async fn intercept(&self, ctx: Context<String>, next: Next<String, String>) -> Result<String> {
///         if ctx.meta().is_empty() {
///             return Err(Error::new("unauthorized"));
///         }
///         next.run(ctx).await
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor<M, T>: Send + Sync + 'static {
    /// Name used in error annotations and tracing output.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn intercept(&self, ctx: Context<M>, next: Next<M, T>) -> Result<T>;
}

/// An interceptor shared between pipelines.
pub type SharedInterceptor<M, T> = Arc<dyn Interceptor<M, T>>;

// ── Next ──────────────────────────────────────────────────────────────────────

/// The rest of the chain: the following interceptor, or the terminal handler.
pub struct Next<M, T> {
    inner: BoxedHandler<M, T>,
}

impl<M, T> Next<M, T> {
    pub(crate) fn new(inner: BoxedHandler<M, T>) -> Self {
        Self { inner }
    }

    /// Continues the chain with `ctx`.
    pub fn run(self, ctx: Context<M>) -> BoxFuture<T> {
        self.inner.call(ctx)
    }
}

// ── Closure interceptors ──────────────────────────────────────────────────────

/// An interceptor built from a closure. See [`from_fn`].
pub struct InterceptorFn<F> {
    name: Cow<'static, str>,
    f: F,
}

/// Turns an async closure into an [`Interceptor`].
///
/// ```rust
/// use interpose::{from_fn, Context, Next};
///
/// let tag = from_fn("tag", |ctx: Context<()>, next: Next<(), String>| async move {
///     let inner = next.run(ctx).await?;
///     Ok::<_, interpose::Error>(format!("[{inner}]"))
/// });
/// ```
pub fn from_fn<F, Fut, M, T>(name: impl Into<Cow<'static, str>>, f: F) -> InterceptorFn<F>
where
    F: Fn(Context<M>, Next<M, T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    M: Send + 'static,
    T: Send + 'static,
{
    InterceptorFn { name: name.into(), f }
}

#[async_trait]
impl<F, Fut, M, T> Interceptor<M, T> for InterceptorFn<F>
where
    F: Fn(Context<M>, Next<M, T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    M: Send + 'static,
    T: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn intercept(&self, ctx: Context<M>, next: Next<M, T>) -> Result<T> {
        (self.f)(ctx, next).await
    }
}
