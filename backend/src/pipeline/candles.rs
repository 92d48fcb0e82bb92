use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::logger::{TraceId, tick_span, warn_if_slow};
use market::{Candle, CandleAggregator};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use crate::exchange::MarketDataSource;
use crate::metrics::counters::PipelineCounters;
use crate::pipeline::{PollSchedule, SLOW_SINK_WRITE, TickOutcome};
use crate::sink::SeriesSink;

/// Last traded price → bucketed OHLC candles → sink.
///
/// Owns the only piece of cross-tick state in the system: the open candle
/// window. It is never shared, so no locking is involved.
pub struct CandlePipeline {
    symbol: String,
    source: Arc<dyn MarketDataSource>,
    sink: Arc<dyn SeriesSink>,
    aggregator: CandleAggregator,
    counters: PipelineCounters,
}

impl CandlePipeline {
    pub fn new(
        symbol: String,
        source: Arc<dyn MarketDataSource>,
        sink: Arc<dyn SeriesSink>,
        bucket: Duration,
    ) -> Self {
        Self {
            symbol,
            source,
            sink,
            aggregator: CandleAggregator::new(bucket),
            counters: PipelineCounters::default(),
        }
    }

    pub fn counters(&self) -> PipelineCounters {
        self.counters.clone()
    }

    /// Start of the bucket currently being accumulated, if any.
    pub fn open_bucket(&self) -> Option<DateTime<Utc>> {
        self.aggregator.current_bucket()
    }

    /// One fetch → accumulate → (maybe) persist pass.
    ///
    /// `now` only matters when the fetch fails: a window whose bucket has
    /// already ended is closed from it so a quiet minute still emits.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        PipelineCounters::incr(&self.counters.ticks);

        let (closed, idle) = match self.source.fetch_last_price(&self.symbol).await {
            Ok(sample) if self.aggregator.is_stale(&sample) => {
                warn!(
                    captured_at = %sample.captured_at,
                    open_bucket = ?self.aggregator.current_bucket(),
                    "price sample predates the open candle; dropping it"
                );
                (None, TickOutcome::Accumulated)
            }
            Ok(sample) => {
                debug!(price = %sample.price, "price sampled");
                (self.aggregator.push(sample), TickOutcome::Accumulated)
            }
            Err(e) => {
                PipelineCounters::incr(&self.counters.fetch_failures);
                warn!(error = %e, "price fetch failed; skipping sample");
                (self.aggregator.advance(now), TickOutcome::FetchFailed)
            }
        };

        match closed {
            Some(candle) => self.persist(candle).await,
            None => idle,
        }
    }

    async fn persist(&self, candle: Candle) -> TickOutcome {
        info!(
            bucket_start = %candle.bucket_start,
            open = %candle.open,
            high = %candle.high,
            low = %candle.low,
            close = %candle.close,
            "candle closed"
        );

        let write = self.sink.append_candle(&self.symbol, &candle);
        match warn_if_slow("append_candle", SLOW_SINK_WRITE, write).await {
            Ok(()) => {
                PipelineCounters::incr(&self.counters.records_written);
                TickOutcome::Written
            }
            Err(e) => {
                PipelineCounters::incr(&self.counters.sink_failures);
                error!(
                    error = %e,
                    bucket_start = %candle.bucket_start,
                    "failed to persist candle; dropping it"
                );
                TickOutcome::SinkFailed
            }
        }
    }

    /// Polls every `every` until `shutdown` is cancelled. The window still
    /// open at that point is dropped, not flushed.
    pub async fn run(mut self, every: Duration, shutdown: CancellationToken) {
        info!(
            symbol = %self.symbol,
            every_ms = every.as_millis() as u64,
            bucket_secs = self.aggregator.bucket().as_secs(),
            "candle pipeline started"
        );

        let mut schedule = PollSchedule::new(every, shutdown);
        while schedule.next_tick().await {
            let span = tick_span("candles", &self.symbol, &TraceId::new());
            self.tick(Utc::now()).instrument(span).await;
        }

        let dropped = self.aggregator.discard();
        if dropped > 0 {
            info!(samples = dropped, "discarded partial candle window on shutdown");
        }

        info!(
            symbol = %self.symbol,
            counters = ?self.counters.snapshot(),
            "candle pipeline stopped"
        );
    }
}
