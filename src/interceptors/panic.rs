use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::error;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::interceptor::{Interceptor, Next};

/// Converts a panic anywhere further down the chain into
/// [`Error::Panicked`], so one bad handler fails its call instead of the
/// task serving it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatchPanic;

#[async_trait]
impl<M, T> Interceptor<M, T> for CatchPanic
where
    M: Send + 'static,
    T: Send + 'static,
{
    fn name(&self) -> &str {
        "catch_panic"
    }

    async fn intercept(&self, ctx: Context<M>, next: Next<M, T>) -> Result<T> {
        let method = ctx.method().to_owned();
        match AssertUnwindSafe(next.run(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(method = %method, panic = %message, "handler panicked");
                Err(Error::Panicked(message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
