use std::future::Future;
use std::time::{Duration, Instant};

use tracing::Span;

use super::TraceId;

/// Root span for a single poll tick of a pipeline.
pub fn tick_span(pipeline: &'static str, symbol: &str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "tick",
        pipeline = %pipeline,
        symbol = %symbol,
        trace_id = %trace_id
    )
}

/// Awaits `fut` and emits a `performance` warning when it took longer than `max`.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn warn_if_slow_passes_output_through() {
        let out = warn_if_slow("noop", Duration::from_secs(1), async { 7 }).await;
        assert_eq!(out, 7);
    }

    #[test]
    fn tick_span_builds_without_subscriber() {
        let id = TraceId::default();
        let span = tick_span("depth_ratio", "BTC-USD", &id);
        let _guard = span.enter();
    }
}
