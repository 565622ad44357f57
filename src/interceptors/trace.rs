use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

use crate::context::Context;
use crate::error::Result;
use crate::interceptor::{Interceptor, Next};

/// Per-call span with protocol and method, plus a completion event carrying
/// the latency.
///
/// Successful calls log at `debug`; failures, and calls slower than the
/// optional threshold, log at `warn`. Results pass through untouched.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    slow_threshold: Option<Duration>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls that take longer than `threshold` are logged at `warn` even
    /// when they succeed.
    pub fn slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }
}

#[async_trait]
impl<M, T> Interceptor<M, T> for Trace
where
    M: Send + 'static,
    T: Send + 'static,
{
    fn name(&self) -> &str {
        "trace"
    }

    async fn intercept(&self, ctx: Context<M>, next: Next<M, T>) -> Result<T> {
        let span = info_span!("call", protocol = ctx.protocol(), method = ctx.method());
        let start = Instant::now();
        let result = next.run(ctx).instrument(span.clone()).await;
        let elapsed = start.elapsed();
        let slow = self.slow_threshold.is_some_and(|threshold| elapsed > threshold);

        span.in_scope(|| match &result {
            Err(err) => warn!(elapsed = ?elapsed, error = %err, "call failed"),
            Ok(_) if slow => warn!(elapsed = ?elapsed, "slow call"),
            Ok(_) => debug!(elapsed = ?elapsed, "call completed"),
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing_test::traced_test;

    use super::*;
    use crate::chain::compose;
    use crate::error::Error;

    async fn ok(_ctx: Context<()>) -> Result<u32> {
        Ok(42)
    }

    async fn fail(_ctx: Context<()>) -> Result<u32> {
        Err(Error::new("boom"))
    }

    #[tokio::test]
    #[traced_test]
    async fn logs_completion_and_passes_result() {
        let pipeline = compose(ok, [Arc::new(Trace::new()) as Arc<dyn Interceptor<(), u32>>]);
        let out = pipeline.call(Context::new("grpc", "answers.Get", ())).await.unwrap();

        assert_eq!(out, 42);
        assert!(logs_contain("call completed"));
        assert!(logs_contain("answers.Get"));
    }

    #[tokio::test]
    #[traced_test]
    async fn logs_failure_and_passes_error() {
        let pipeline = compose(fail, [Arc::new(Trace::new()) as Arc<dyn Interceptor<(), u32>>]);
        let err = pipeline.call(Context::new("grpc", "answers.Get", ())).await.unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert!(logs_contain("call failed"));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn flags_slow_calls() {
        async fn sleepy(_ctx: Context<()>) -> Result<u32> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(1)
        }

        let trace = Trace::new().slow_threshold(Duration::from_millis(100));
        let pipeline = compose(sleepy, [Arc::new(trace) as Arc<dyn Interceptor<(), u32>>]);
        pipeline.call(Context::new("http", "/slow", ())).await.unwrap();

        assert!(logs_contain("slow call"));
    }
}
