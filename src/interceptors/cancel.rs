use std::time::Duration;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::interceptor::{Interceptor, Next};

/// Short-circuits calls whose execution context is done.
///
/// Before continuing, an already cancelled or expired context ends the call
/// with [`Error::Cancelled`] / [`Error::DeadlineExceeded`]. While the rest of
/// the chain runs, the same error is returned as soon as the context becomes
/// done, and the inner future is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelGuard;

#[async_trait]
impl<M, T> Interceptor<M, T> for CancelGuard
where
    M: Send + 'static,
    T: Send + 'static,
{
    fn name(&self) -> &str {
        "cancel_guard"
    }

    async fn intercept(&self, ctx: Context<M>, next: Next<M, T>) -> Result<T> {
        guarded(ctx, next).await
    }
}

/// Bounds everything after it to `duration`.
///
/// The deadline only ever tightens: a caller deadline earlier than
/// `now + duration` stays in force.
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl<M, T> Interceptor<M, T> for Timeout
where
    M: Send + 'static,
    T: Send + 'static,
{
    fn name(&self) -> &str {
        "timeout"
    }

    async fn intercept(&self, ctx: Context<M>, next: Next<M, T>) -> Result<T> {
        guarded(ctx.with_timeout(self.duration), next).await
    }
}

async fn guarded<M, T>(ctx: Context<M>, next: Next<M, T>) -> Result<T> {
    if let Some(err) = ctx.err() {
        return Err(err);
    }

    let exec = ctx.exec().clone();
    tokio::select! {
        biased;

        result = next.run(ctx) => result,
        () = exec.done() => Err(exec.err().unwrap_or(Error::Cancelled)),
    }
}
