//! Connecting a framework to the interceptor chain.
//!
//! Each transport (an HTTP server, a gRPC service, a queue consumer) has its
//! own native request type. A [`Bridge`] turns that native value into a
//! [`Context`], a [`Resolver`] decides which interceptors apply, and
//! [`execute`] runs the standard flow:
//!
//! ```text
//! native ─► create_context ─► resolve ─► compose ─► call ─► on_success / on_error
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::chain::Pipeline;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::interceptor::{Interceptor, SharedInterceptor};

/// Adapts a native request type `N` to pipelines producing `T`.
pub trait Bridge<N, T>: Send + Sync {
    type Meta: Send + 'static;

    /// Protocol tag placed on every context this bridge creates.
    fn protocol(&self) -> &str;

    /// Method or route identifier for `native`.
    fn method(&self, native: &N) -> String;

    fn extract_meta(&self, native: &N) -> Self::Meta;

    /// Builds the call's context. The default uses a background execution
    /// context.
    fn create_context(&self, native: &N) -> Context<Self::Meta> {
        Context::new(self.protocol(), self.method(native), self.extract_meta(native))
    }

    /// Called once when the pipeline returns `Ok`.
    fn on_success(&self, _native: &N, _result: &T) {}

    /// Called once when the pipeline returns `Err`.
    fn on_error(&self, _native: &N, _err: &Error) {}
}

// ── Resolvers ─────────────────────────────────────────────────────────────────

/// Chooses the interceptors for one call.
pub trait Resolver<M, T>: Send + Sync {
    fn resolve(&self, ctx: &Context<M>, handler_key: &str) -> Vec<SharedInterceptor<M, T>>;
}

/// The same interceptors for every call.
pub struct StaticResolver<M, T> {
    interceptors: Vec<SharedInterceptor<M, T>>,
}

impl<M, T> StaticResolver<M, T> {
    pub fn new(interceptors: impl IntoIterator<Item = SharedInterceptor<M, T>>) -> Self {
        Self { interceptors: interceptors.into_iter().collect() }
    }
}

impl<M, T> Resolver<M, T> for StaticResolver<M, T> {
    fn resolve(&self, _ctx: &Context<M>, _handler_key: &str) -> Vec<SharedInterceptor<M, T>> {
        self.interceptors.clone()
    }
}

/// Global interceptors plus interceptors scoped to a handler key.
///
/// Resolution order is every global interceptor in registration order,
/// followed by the key's own interceptors in registration order.
///
/// ```rust
/// use interpose::bridge::Registry;
/// use interpose::interceptors::{CancelGuard, Trace};
///
/// let registry: Registry<(), String> = Registry::new()
///     .global(Trace::new())
///     .scoped("users.Delete", CancelGuard);
///
/// assert_eq!(registry.len_for("users.Delete"), 2);
/// assert_eq!(registry.len_for("users.Get"), 1);
/// ```
pub struct Registry<M, T> {
    global: Vec<SharedInterceptor<M, T>>,
    scoped: HashMap<String, Vec<SharedInterceptor<M, T>>>,
}

impl<M, T> Registry<M, T> {
    pub fn new() -> Self {
        Self { global: Vec::new(), scoped: HashMap::new() }
    }

    pub fn global(self, interceptor: impl Interceptor<M, T>) -> Self {
        self.global_shared(Arc::new(interceptor))
    }

    pub fn global_shared(mut self, interceptor: SharedInterceptor<M, T>) -> Self {
        self.global.push(interceptor);
        self
    }

    pub fn scoped(self, key: impl Into<String>, interceptor: impl Interceptor<M, T>) -> Self {
        self.scoped_shared(key, Arc::new(interceptor))
    }

    pub fn scoped_shared(mut self, key: impl Into<String>, interceptor: SharedInterceptor<M, T>) -> Self {
        self.scoped.entry(key.into()).or_default().push(interceptor);
        self
    }

    pub(crate) fn push_global(&mut self, interceptor: SharedInterceptor<M, T>) {
        self.global.push(interceptor);
    }

    pub(crate) fn extend_scoped(
        &mut self,
        key: impl Into<String>,
        interceptors: impl IntoIterator<Item = SharedInterceptor<M, T>>,
    ) {
        self.scoped.entry(key.into()).or_default().extend(interceptors);
    }

    /// Number of interceptors a call with `handler_key` would get.
    pub fn len_for(&self, handler_key: &str) -> usize {
        self.global.len() + self.scoped.get(handler_key).map_or(0, Vec::len)
    }
}

impl<M, T> Default for Registry<M, T> {
    fn default() -> Self { Self::new() }
}

impl<M, T> Registry<M, T> {
    /// The interceptors for `handler_key`, global first.
    pub fn for_key(&self, handler_key: &str) -> Vec<SharedInterceptor<M, T>> {
        let scoped = self.scoped.get(handler_key).into_iter().flatten();
        self.global.iter().chain(scoped).cloned().collect()
    }
}

impl<M, T> Resolver<M, T> for Registry<M, T> {
    fn resolve(&self, _ctx: &Context<M>, handler_key: &str) -> Vec<SharedInterceptor<M, T>> {
        self.for_key(handler_key)
    }
}

// ── Execution ─────────────────────────────────────────────────────────────────

/// Runs one native request through `terminal`, wrapped with the interceptors
/// `resolver` picks for `handler_key`.
///
/// Exactly one of [`Bridge::on_success`] or [`Bridge::on_error`] is called,
/// and the pipeline's outcome is returned unchanged.
pub async fn execute<N, T, B, R>(
    bridge: &B,
    resolver: &R,
    native: &N,
    handler_key: &str,
    terminal: &Pipeline<B::Meta, T>,
) -> Result<T>
where
    B: Bridge<N, T>,
    R: Resolver<B::Meta, T> + ?Sized,
    T: Send + 'static,
{
    let ctx = bridge.create_context(native);
    let interceptors = resolver.resolve(&ctx, handler_key);
    let pipeline = terminal.clone().layer(interceptors);
    run(bridge, native, ctx, &pipeline).await
}

/// Like [`execute`], for a pipeline whose interceptors are already in place.
///
/// Callers whose interceptor set does not depend on the context compose once
/// up front and skip per-call resolution.
pub async fn execute_composed<N, T, B>(bridge: &B, native: &N, pipeline: &Pipeline<B::Meta, T>) -> Result<T>
where
    B: Bridge<N, T>,
    T: Send + 'static,
{
    let ctx = bridge.create_context(native);
    run(bridge, native, ctx, pipeline).await
}

async fn run<N, T, B>(bridge: &B, native: &N, ctx: Context<B::Meta>, pipeline: &Pipeline<B::Meta, T>) -> Result<T>
where
    B: Bridge<N, T>,
    T: Send + 'static,
{
    debug!(
        protocol = ctx.protocol(),
        method = ctx.method(),
        interceptors = pipeline.depth(),
        "executing pipeline"
    );

    let result = pipeline.call(ctx).await;

    match &result {
        Ok(value) => bridge.on_success(native, value),
        Err(err) => bridge.on_error(native, err),
    }
    result
}
