//! Pipeline composition.
//!
//! ```text
//! compose(handler, [I0, I1, I2])
//!
//!   call ─► I0 ─► I1 ─► I2 ─► handler
//!   ret  ◄─ I0 ◄─ I1 ◄─ I2 ◄─┘
//! ```
//!
//! The pipeline is built from the inside out: the terminal handler first,
//! then each interceptor wrapped around what is already there, last one
//! first. Every layer implements the same erased handler interface, so a pipeline is just the
//! outermost layer. With no interceptors it is the terminal handler itself.
//!
//! Composition does no I/O, never fails, and never looks at results.

use std::sync::Arc;

use crate::context::Context;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::interceptor::{Interceptor, Next, SharedInterceptor};

/// Composes `handler` and `interceptors` into a [`Pipeline`].
///
/// `interceptors[0]` runs first on the way in and last on the way out.
///
/// ```rust
/// use std::sync::Arc;
/// use interpose::{compose, from_fn, Context, Next, Result, SharedInterceptor};
///
/// async fn hello(_ctx: Context<()>) -> Result<String> {
///     Ok("hello".to_owned())
/// }
///
/// # #[tokio::main]
/// # async fn main() -> Result<()> {
/// let shout: SharedInterceptor<(), String> = Arc::new(from_fn(
///     "shout",
///     |ctx: Context<()>, next: Next<(), String>| async move {
///         Ok::<_, interpose::Error>(next.run(ctx).await?.to_uppercase())
///     },
/// ));
///
/// let pipeline = compose(hello, [shout]);
/// assert_eq!(pipeline.call(Context::new("test", "hello", ())).await?, "HELLO");
/// # Ok(())
/// # }
/// ```
pub fn compose<M, T>(
    handler: impl Handler<M, T>,
    interceptors: impl IntoIterator<Item = SharedInterceptor<M, T>>,
) -> Pipeline<M, T>
where
    M: Send + 'static,
    T: Send + 'static,
{
    Pipeline::new(handler).layer(interceptors)
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// A composed, callable chain.
///
/// Cloning is one `Arc` increment. A pipeline is immutable once built and
/// can serve any number of concurrent calls.
pub struct Pipeline<M, T> {
    inner: BoxedHandler<M, T>,
    depth: usize,
}

impl<M, T> Pipeline<M, T>
where
    M: Send + 'static,
    T: Send + 'static,
{
    /// A pipeline with no interceptors.
    pub fn new(handler: impl Handler<M, T>) -> Self {
        Self { inner: handler.into_boxed_handler(), depth: 0 }
    }

    /// Wraps this pipeline with `interceptors`, which become the outermost
    /// layers in the given order.
    pub fn layer(self, interceptors: impl IntoIterator<Item = SharedInterceptor<M, T>>) -> Self {
        let interceptors: Vec<_> = interceptors.into_iter().collect();
        let depth = self.depth + interceptors.len();

        let mut inner = self.inner;
        for interceptor in interceptors.into_iter().rev() {
            inner = Arc::new(Layer { interceptor, next: inner });
        }

        Self { inner, depth }
    }

    /// Runs the pipeline for one call.
    pub fn call(&self, ctx: Context<M>) -> BoxFuture<T> {
        self.inner.call(ctx)
    }

    /// Number of interceptor layers around the terminal handler.
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[cfg(test)]
    pub(crate) fn ptr_eq_handler(&self, other: &BoxedHandler<M, T>) -> bool {
        Arc::ptr_eq(&self.inner, other)
    }

    #[cfg(test)]
    pub(crate) fn from_boxed(inner: BoxedHandler<M, T>) -> Self {
        Self { inner, depth: 0 }
    }
}

impl<M, T> Clone for Pipeline<M, T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner), depth: self.depth }
    }
}

/// One interceptor bound to the rest of the chain.
struct Layer<M, T> {
    interceptor: SharedInterceptor<M, T>,
    next: BoxedHandler<M, T>,
}

impl<M, T> ErasedHandler<M, T> for Layer<M, T>
where
    M: Send + 'static,
    T: Send + 'static,
{
    fn call(&self, ctx: Context<M>) -> BoxFuture<T> {
        let interceptor = Arc::clone(&self.interceptor);
        let next = Next::new(Arc::clone(&self.next));
        Box::pin(async move { interceptor.intercept(ctx, next).await })
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Ordered interceptor list, reusable across handlers.
///
/// ```rust
/// use interpose::{Chain, Context, Result};
/// use interpose::interceptors::{CancelGuard, Trace};
///
/// async fn ping(_ctx: Context<()>) -> Result<&'static str> { Ok("pong") }
///
/// let chain = Chain::new().with(Trace::new()).with(CancelGuard);
/// let pipeline = chain.build(ping);
/// assert_eq!(pipeline.depth(), 2);
/// ```
pub struct Chain<M, T> {
    interceptors: Vec<SharedInterceptor<M, T>>,
}

impl<M, T> Chain<M, T>
where
    M: Send + 'static,
    T: Send + 'static,
{
    pub fn new() -> Self {
        Self { interceptors: Vec::new() }
    }

    /// Appends an interceptor. Returns `self` for chaining.
    pub fn with(self, interceptor: impl Interceptor<M, T>) -> Self {
        self.with_shared(Arc::new(interceptor))
    }

    pub fn with_shared(mut self, interceptor: SharedInterceptor<M, T>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Composes the chain around `handler`. The chain stays reusable.
    pub fn build(&self, handler: impl Handler<M, T>) -> Pipeline<M, T> {
        compose(handler, self.interceptors.iter().cloned())
    }
}

impl<M, T> Clone for Chain<M, T> {
    fn clone(&self) -> Self {
        Self { interceptors: self.interceptors.clone() }
    }
}

impl<M, T> Default for Chain<M, T>
where
    M: Send + 'static,
    T: Send + 'static,
{
    fn default() -> Self { Self::new() }
}
