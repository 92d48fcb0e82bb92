//! Sampler → Aggregator → Sink poll loops.
//!
//! Each pipeline runs as its own task with its own [`PollSchedule`]. Nothing
//! is shared between them except the sink handle, and a failed tick never
//! ends the loop: only cancellation does.

pub mod candles;
pub mod depth;
pub mod schedule;
pub mod supervisor;

use std::time::Duration;

pub use candles::CandlePipeline;
pub use depth::DepthRatioPipeline;
pub use schedule::PollSchedule;
pub use supervisor::supervise;

/// Sink writes slower than this are reported on the `performance` target.
pub(crate) const SLOW_SINK_WRITE: Duration = Duration::from_secs(2);

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A record reached the sink.
    Written,

    /// Data was fetched and folded into state, nothing to emit yet.
    Accumulated,

    /// The fetch failed; nothing was written this tick.
    FetchFailed,

    /// The order book had an empty side.
    Degenerate,

    /// The sink rejected the record; it was dropped.
    SinkFailed,
}
