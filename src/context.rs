//! Per-call request context.
//!
//! A [`Context`] is created once per inbound call and handed down the chain
//! by value. It carries:
//!
//! - an [`ExecContext`]: cancellation token plus optional deadline,
//! - a protocol tag (`"http"`, `"grpc"`, `"kafka"`, …),
//! - a method or route identifier,
//! - caller-defined metadata of type `M`,
//! - a type-keyed extension map interceptors use to pass values downstream.
//!
//! Protocol, method and metadata are fixed at construction. A participant
//! may add extensions or narrow the execution context, and what it changes
//! is seen by everything it calls through `next`.

use std::time::Duration;

use http::Extensions;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

// ── Execution context ─────────────────────────────────────────────────────────

/// Cancellation and deadline state for one call.
///
/// Cloning is cheap and clones observe the same cancellation. An interceptor
/// that needs to watch the call after handing the [`Context`] to `next`
/// clones this first.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ExecContext {
    /// Never cancelled, no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Uses `token` as the cancellation source.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Sets a deadline. An earlier deadline already in place wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A context whose token is cancelled when this one's is, but which can
    /// also be cancelled on its own.
    pub fn child(&self) -> Self {
        Self { token: self.token.child_token(), deadline: self.deadline }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Why the context is done, if it is. Explicit cancellation wins over an
    /// expired deadline.
    pub fn err(&self) -> Option<Error> {
        if self.token.is_cancelled() {
            return Some(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.token.cancelled() => {}
                () = tokio::time::sleep_until(deadline) => {}
            },
            None => self.token.cancelled().await,
        }
    }
}

// ── Request context ───────────────────────────────────────────────────────────

/// The per-call carrier passed through a pipeline.
///
/// ```rust
/// use interpose::Context;
///
/// #[derive(Clone)]
/// struct RequestId(u64);
///
/// let mut ctx = Context::new("grpc", "users.Get", ());
/// ctx.insert(RequestId(7));
///
/// assert_eq!(ctx.protocol(), "grpc");
/// assert_eq!(ctx.get::<RequestId>().map(|id| id.0), Some(7));
/// ```
#[derive(Debug)]
pub struct Context<M> {
    exec: ExecContext,
    protocol: String,
    method: String,
    meta: M,
    extensions: Extensions,
}

impl<M> Context<M> {
    /// Creates a context with a background execution context.
    pub fn new(protocol: impl Into<String>, method: impl Into<String>, meta: M) -> Self {
        Self::with_exec(ExecContext::background(), protocol, method, meta)
    }

    pub fn with_exec(
        exec: ExecContext,
        protocol: impl Into<String>,
        method: impl Into<String>,
        meta: M,
    ) -> Self {
        Self {
            exec,
            protocol: protocol.into(),
            method: method.into(),
            meta,
            extensions: Extensions::new(),
        }
    }

    pub fn protocol(&self) -> &str { &self.protocol }
    pub fn method(&self) -> &str { &self.method }
    pub fn meta(&self) -> &M { &self.meta }
    pub fn exec(&self) -> &ExecContext { &self.exec }

    /// Tightens the deadline to `now + timeout` for everything downstream.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.exec = self.exec.with_timeout(timeout);
        self
    }

    /// Replaces the execution context for everything downstream.
    ///
    /// Used to hand inner layers a [`child`](ExecContext::child) that the
    /// caller can cancel without touching its own token:
    ///
    /// ```rust
    /// use interpose::Context;
    ///
    /// let mut ctx = Context::new("grpc", "users.Get", ());
    /// let child = ctx.exec().child();
    /// ctx.set_exec(child.clone());
    ///
    /// child.cancel();
    /// assert!(ctx.is_done());
    /// ```
    pub fn set_exec(&mut self, exec: ExecContext) {
        self.exec = exec;
    }

    /// Shorthand for `self.exec().err()`.
    pub fn err(&self) -> Option<Error> {
        self.exec.err()
    }

    pub fn is_done(&self) -> bool {
        self.exec.is_done()
    }

    /// Attaches a value for downstream participants, returning the previous
    /// value of the same type.
    pub fn insert<V: Clone + Send + Sync + 'static>(&mut self, value: V) -> Option<V> {
        self.extensions.insert(value)
    }

    pub fn get<V: Send + Sync + 'static>(&self) -> Option<&V> {
        self.extensions.get::<V>()
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }
}
