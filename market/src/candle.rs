//! OHLC candle aggregation over wall-clock buckets.
//!
//! A [`CandleAggregator`] owns at most one open [`CandleWindow`]. Samples are
//! appended while they fall in the window's bucket; the first sample from a
//! different bucket closes the window into a [`Candle`] before opening the
//! next one. Buckets that never receive a sample produce nothing, so gaps in
//! the fetched data stay gaps in the output.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::PriceSample;

pub const ONE_MINUTE: Duration = Duration::from_secs(60);

/// Open/high/low/close summary of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub bucket_start: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::str")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub close: Decimal,
}

impl Candle {
    /// Reduces prices in arrival order. `None` for an empty slice.
    pub fn from_prices(bucket_start: DateTime<Utc>, prices: &[Decimal]) -> Option<Self> {
        let (&open, rest) = prices.split_first()?;
        let close = *prices.last()?;

        let (high, low) = rest
            .iter()
            .fold((open, open), |(hi, lo), &p| (hi.max(p), lo.min(p)));

        Some(Self {
            bucket_start,
            open,
            high,
            low,
            close,
        })
    }
}

/// Truncates `ts` to the start of its `bucket`-sized wall-clock window.
pub fn bucket_start(ts: DateTime<Utc>, bucket: Duration) -> DateTime<Utc> {
    let len = (bucket.as_millis() as i64).max(1);
    let ms = ts.timestamp_millis();
    DateTime::from_timestamp_millis(ms - ms.rem_euclid(len)).unwrap_or(ts)
}

/// Prices collected for one bucket, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleWindow {
    bucket_start: DateTime<Utc>,
    prices: Vec<Decimal>,
}

impl CandleWindow {
    pub fn open(bucket_start: DateTime<Utc>) -> Self {
        Self {
            bucket_start,
            prices: Vec::new(),
        }
    }

    pub fn bucket_start(&self) -> DateTime<Utc> {
        self.bucket_start
    }

    pub fn append(&mut self, price: Decimal) {
        self.prices.push(price);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Consumes the window. A window without samples yields no candle.
    pub fn close(self) -> Option<Candle> {
        Candle::from_prices(self.bucket_start, &self.prices)
    }
}

/// Single-symbol candle state machine: empty, or accumulating one window.
#[derive(Debug, Clone)]
pub struct CandleAggregator {
    bucket: Duration,
    window: Option<CandleWindow>,
    /// Start of the most recently closed bucket. Never reopened.
    last_closed: Option<DateTime<Utc>>,
}

impl CandleAggregator {
    /// `bucket` below one millisecond is treated as one millisecond.
    pub fn new(bucket: Duration) -> Self {
        Self {
            bucket,
            window: None,
            last_closed: None,
        }
    }

    pub fn one_minute() -> Self {
        Self::new(ONE_MINUTE)
    }

    pub fn bucket(&self) -> Duration {
        self.bucket
    }

    /// Bucket start of the open window, if any.
    pub fn current_bucket(&self) -> Option<DateTime<Utc>> {
        self.window.as_ref().map(CandleWindow::bucket_start)
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_none()
    }

    /// True when `sample` belongs to a bucket before the open one or to one
    /// already closed. [`push`](Self::push) drops such samples.
    pub fn is_stale(&self, sample: &PriceSample) -> bool {
        let bucket = bucket_start(sample.captured_at, self.bucket);
        self.window.as_ref().is_some_and(|w| bucket < w.bucket_start())
            || self.last_closed.is_some_and(|c| bucket <= c)
    }

    /// Feeds a sample. Returns the previous window's candle when the sample
    /// starts a later bucket. Stale samples (a clock stepping backwards) are
    /// dropped, so each bucket is emitted at most once.
    pub fn push(&mut self, sample: PriceSample) -> Option<Candle> {
        if self.is_stale(&sample) {
            return None;
        }
        let bucket = bucket_start(sample.captured_at, self.bucket);

        let rolled = self
            .window
            .as_ref()
            .is_some_and(|w| w.bucket_start() != bucket);
        let closed = if rolled { self.close_window() } else { None };

        self.window
            .get_or_insert_with(|| CandleWindow::open(bucket))
            .append(sample.price);

        closed
    }

    /// Closes the open window once `now` has moved past its bucket, without
    /// needing a new sample.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Option<Candle> {
        let now_bucket = bucket_start(now, self.bucket);

        let finished = self
            .window
            .as_ref()
            .is_some_and(|w| now_bucket > w.bucket_start());
        if finished { self.close_window() } else { None }
    }

    fn close_window(&mut self) -> Option<Candle> {
        let window = self.window.take()?;
        self.last_closed = Some(window.bucket_start());
        window.close()
    }

    /// Drops the open window without emitting it. Returns how many samples
    /// were discarded.
    pub fn discard(&mut self) -> usize {
        self.window.take().map_or(0, |w| w.len())
    }
}

impl Default for CandleAggregator {
    fn default() -> Self {
        Self::one_minute()
    }
}
