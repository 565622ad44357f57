//! Handler trait and type erasure.
//!
//! # How terminal handlers are stored
//!
//! A pipeline stores its terminal handler and every interceptor layer behind
//! one common interface, so handlers of *different* concrete types can sit in
//! the same router table or the same chain. We use **trait objects**
//! (`dyn ErasedHandler<M, T>`) to hide the concrete type.
//!
//! ```text
//! async fn get_user(ctx: Context<Meta>) -> Result<User> { … }   ← user writes this
//!        ↓ compose(get_user, interceptors)
//! get_user.into_boxed_handler()                                 ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(get_user))                                 ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler<M, T> = Arc<dyn ErasedHandler<M, T>>
//! handler.call(ctx)  at call time                               ← one vtable dispatch
//!        ↓
//! Box::pin(get_user(ctx))                                       ← BoxFuture<T>
//! ```
//!
//! Interceptor layers implement the same [`ErasedHandler`] interface, which
//! is what lets a pipeline with no interceptors be the handler itself.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Result;

/// A heap-allocated, type-erased future resolving to a handler outcome.
///
/// `Send + 'static` lets tokio move the future across worker threads.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'static>>;

/// Internal dispatch interface shared by terminal handlers and interceptor
/// layers.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler<M, T> {
    fn call(&self, ctx: Context<M>) -> BoxFuture<T>;
}

/// A type-erased handler shared across concurrent calls.
#[doc(hidden)]
pub type BoxedHandler<M, T> = Arc<dyn ErasedHandler<M, T> + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid terminal handler.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure with the shape:
///
/// ```text
/// async fn name(ctx: Context<M>) -> Result<T>
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler<M, T>: private::Sealed<M, T> + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler<M, T>;
}

mod private {
    pub trait Sealed<M, T> {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, M, T> private::Sealed<M, T> for F
where
    F: Fn(Context<M>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
}

impl<F, Fut, M, T> Handler<M, T> for F
where
    F: Fn(Context<M>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    M: 'static,
    T: 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler<M, T> {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype wrapper bridging a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, M, T> ErasedHandler<M, T> for FnHandler<F>
where
    F: Fn(Context<M>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    fn call(&self, ctx: Context<M>) -> BoxFuture<T> {
        Box::pin((self.0)(ctx))
    }
}
