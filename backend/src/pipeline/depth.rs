use std::sync::Arc;
use std::time::Duration;

use common::logger::{TraceId, tick_span, warn_if_slow};
use market::{BandRatio, DepthBand, DepthRatioAggregator};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use crate::exchange::MarketDataSource;
use crate::metrics::counters::PipelineCounters;
use crate::pipeline::{PollSchedule, SLOW_SINK_WRITE, TickOutcome};
use crate::sink::SeriesSink;

/// Order book → depth ratios → sink.
///
/// Stateless between ticks: every tick works only on the snapshot it
/// fetched.
pub struct DepthRatioPipeline {
    symbol: String,
    source: Arc<dyn MarketDataSource>,
    sink: Arc<dyn SeriesSink>,
    aggregator: DepthRatioAggregator,
    counters: PipelineCounters,
}

impl DepthRatioPipeline {
    pub fn new(
        symbol: String,
        source: Arc<dyn MarketDataSource>,
        sink: Arc<dyn SeriesSink>,
        bands: Vec<DepthBand>,
    ) -> Self {
        Self {
            symbol,
            source,
            sink,
            aggregator: DepthRatioAggregator::new(bands),
            counters: PipelineCounters::default(),
        }
    }

    pub fn counters(&self) -> PipelineCounters {
        self.counters.clone()
    }

    /// One fetch → aggregate → persist pass. Never fails; the outcome says
    /// which stage stopped it.
    pub async fn tick(&self) -> TickOutcome {
        PipelineCounters::incr(&self.counters.ticks);

        let snapshot = match self.source.fetch_order_book(&self.symbol).await {
            Ok(s) => s,
            Err(e) => {
                PipelineCounters::incr(&self.counters.fetch_failures);
                warn!(error = %e, "order book fetch failed; skipping tick");
                return TickOutcome::FetchFailed;
            }
        };

        let result = match self.aggregator.aggregate(&snapshot) {
            Ok(r) => r,
            Err(e) => {
                PipelineCounters::incr(&self.counters.degenerate_snapshots);
                warn!(
                    error = %e,
                    bids = snapshot.bids().len(),
                    asks = snapshot.asks().len(),
                    "order book unusable; skipping tick"
                );
                return TickOutcome::Degenerate;
            }
        };

        debug!(ratios = %format_ratios(&result.ratios), "depth ratios computed");

        let write = self.sink.append_depth_result(&self.symbol, &result);
        match warn_if_slow("append_depth_result", SLOW_SINK_WRITE, write).await {
            Ok(()) => {
                PipelineCounters::incr(&self.counters.records_written);
                TickOutcome::Written
            }
            Err(e) => {
                PipelineCounters::incr(&self.counters.sink_failures);
                error!(error = %e, "failed to persist depth ratios; dropping result");
                TickOutcome::SinkFailed
            }
        }
    }

    /// Polls every `every` until `shutdown` is cancelled.
    pub async fn run(self, every: Duration, shutdown: CancellationToken) {
        info!(
            symbol = %self.symbol,
            every_ms = every.as_millis() as u64,
            bands = %self.aggregator.bands().iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
            "depth ratio pipeline started"
        );

        let mut schedule = PollSchedule::new(every, shutdown);
        while schedule.next_tick().await {
            let span = tick_span("depth_ratio", &self.symbol, &TraceId::new());
            self.tick().instrument(span).await;
        }

        info!(
            symbol = %self.symbol,
            counters = ?self.counters.snapshot(),
            "depth ratio pipeline stopped"
        );
    }
}

/// `3%: 0.4286, 5%: n/a, ...`
pub fn format_ratios(ratios: &[BandRatio]) -> String {
    ratios
        .iter()
        .map(|r| match r.ratio {
            Some(v) => format!("{}: {:.4}", r.band, v),
            None => format!("{}: n/a", r.band),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
