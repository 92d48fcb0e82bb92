use chrono::{DateTime, Utc};
use market::{BandRatio, Candle, DepthBand, DepthRatioResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Persisted depth ratios for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthRatioRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub ratios: Vec<BandRatio>,
}

impl DepthRatioRecord {
    pub fn new(symbol: &str, result: &DepthRatioResult) -> Self {
        Self {
            timestamp: result.captured_at,
            symbol: symbol.to_string(),
            ratios: result.ratios.clone(),
        }
    }

    /// Keeps only `band`'s entry.
    pub fn retain_band(&mut self, band: DepthBand) {
        self.ratios.retain(|r| r.band == band);
    }
}

/// Persisted candle for one closed bucket; `timestamp` is the bucket start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub close: Decimal,
}

impl CandleRecord {
    pub fn new(symbol: &str, candle: &Candle) -> Self {
        Self {
            timestamp: candle.bucket_start,
            symbol: symbol.to_string(),
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
        }
    }
}

/// Read filter for both series. Built per request by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesQuery {
    pub symbol: String,
    /// Inclusive lower bound on the record timestamp.
    pub start: Option<DateTime<Utc>>,
    /// Restricts depth records to a single band. Ignored for candles.
    pub band: Option<DepthBand>,
}

impl SeriesQuery {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            start: None,
            band: None,
        }
    }

    pub fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn band(mut self, band: DepthBand) -> Self {
        self.band = Some(band);
        self
    }

    pub fn admits(&self, ts: &DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| *ts >= s)
    }
}
