use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal per-pipeline counters for operational visibility.
#[derive(Clone, Default, Debug)]
pub struct PipelineCounters {
    pub ticks: Arc<AtomicU64>,
    pub fetch_failures: Arc<AtomicU64>,
    pub degenerate_snapshots: Arc<AtomicU64>,
    pub records_written: Arc<AtomicU64>,
    pub sink_failures: Arc<AtomicU64>,
}

/// Point-in-time copy of [`PipelineCounters`].
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub ticks: u64,
    pub fetch_failures: u64,
    pub degenerate_snapshots: u64,
    pub records_written: u64,
    pub sink_failures: u64,
}

impl PipelineCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            degenerate_snapshots: self.degenerate_snapshots.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}
