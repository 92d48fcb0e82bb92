//! Depth Ratio
//!
//! The depth ratio measures **order-book liquidity imbalance** around the
//! mid price.
//!
//! ## What this answers
//! > "Of all resting size within p% of mid, how much sits on the bid side?"
//!
//! ## Definition
//!
//! ```text
//! mid        = (best_bid + best_ask) / 2
//! lower      = mid * (1 - p/100)
//! upper      = mid * (1 + p/100)
//! bid_volume = sum(size of bids with price >= lower)
//! ask_volume = sum(size of asks with price <= upper)
//! ratio      = bid_volume / (bid_volume + ask_volume)
//! ```
//!
//! Both boundaries are inclusive. A band with no volume on either side has
//! an **undefined** ratio (`None`), which is never reported as zero.
//!
//! Ratios are rounded to four decimal places, half-up, after the division.
//! The volume sums themselves are never rounded.
//!
//! All arithmetic is checked. A book whose values overflow `Decimal` is
//! rejected as [`DegenerateSnapshot::Overflow`] instead of panicking.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{BookSide, OrderBookSnapshot, PriceLevel};

/// Decimal places kept on an emitted ratio.
pub const RATIO_DP: u32 = 4;

/// Percentage window around the mid price, e.g. `3` for ±3%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DepthBand(Decimal);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidBand {
    #[error("depth band is not a number: {0:?}")]
    NotANumber(String),

    #[error("depth band must be in (0, 100), got {0}")]
    OutOfRange(Decimal),
}

impl DepthBand {
    pub fn new(percent: Decimal) -> Result<Self, InvalidBand> {
        if percent <= Decimal::ZERO || percent >= Decimal::ONE_HUNDRED {
            return Err(InvalidBand::OutOfRange(percent));
        }
        Ok(Self(percent.normalize()))
    }

    pub fn percent(&self) -> Decimal {
        self.0
    }

    /// Inclusive price window `[lower, upper]` for this band around `mid`.
    /// `None` if the upper bound does not fit in a `Decimal`.
    pub fn bounds(&self, mid: Decimal) -> Option<(Decimal, Decimal)> {
        let frac = self.0 / Decimal::ONE_HUNDRED;
        let lower = mid.checked_mul(Decimal::ONE - frac)?;
        let upper = mid.checked_mul(Decimal::ONE + frac)?;
        Some((lower, upper))
    }
}

impl fmt::Display for DepthBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl FromStr for DepthBand {
    type Err = InvalidBand;

    /// Accepts `"3"`, `"2.5"` and `"3%"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let digits = raw.strip_suffix('%').unwrap_or(raw).trim();
        let percent =
            Decimal::from_str(digits).map_err(|_| InvalidBand::NotANumber(raw.to_string()))?;
        Self::new(percent)
    }
}

impl TryFrom<String> for DepthBand {
    type Error = InvalidBand;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DepthBand> for String {
    fn from(band: DepthBand) -> Self {
        band.0.to_string()
    }
}

/// Raw, unrounded volume sums for one band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BandVolume {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl BandVolume {
    /// Saturates instead of overflowing; [`band_volumes`] never produces a
    /// pair whose sum does not fit.
    pub fn total(&self) -> Decimal {
        self.bid.saturating_add(self.ask)
    }

    /// Bid share of the total, unrounded. `None` when the band is empty.
    pub fn ratio(&self) -> Option<Decimal> {
        let total = self.total();
        if total > Decimal::ZERO {
            Some(self.bid / total)
        } else {
            None
        }
    }
}

/// Ratio for a single band; `ratio` is `None` when the band held no volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandRatio {
    pub band: DepthBand,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub ratio: Option<Decimal>,
}

/// Depth ratios for every configured band at one capture instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthRatioResult {
    pub captured_at: DateTime<Utc>,
    pub ratios: Vec<BandRatio>,
}

impl DepthRatioResult {
    pub fn ratio_for(&self, band: DepthBand) -> Option<Decimal> {
        self.ratios
            .iter()
            .find(|r| r.band == band)
            .and_then(|r| r.ratio)
    }
}

/// The snapshot cannot be reduced to ratios.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DegenerateSnapshot {
    /// No reference price because one side is empty.
    #[error("degenerate order book: no {0} levels")]
    EmptySide(BookSide),

    /// Prices or sizes too large for exact decimal arithmetic.
    #[error("degenerate order book: level values overflow decimal arithmetic")]
    Overflow,
}

/// Sums the sizes that fall inside `band` around `mid`.
///
/// Bids are only filtered by the lower bound and asks only by the upper
/// bound. `None` when a bound, a side's sum or their total overflows.
pub fn band_volumes(
    snapshot: &OrderBookSnapshot,
    mid: Decimal,
    band: DepthBand,
) -> Option<BandVolume> {
    let (lower, upper) = band.bounds(mid)?;

    let bid = checked_sum(snapshot.bids().iter().filter(|l| l.price >= lower))?;
    let ask = checked_sum(snapshot.asks().iter().filter(|l| l.price <= upper))?;
    bid.checked_add(ask)?;

    Some(BandVolume { bid, ask })
}

fn checked_sum<'a>(mut levels: impl Iterator<Item = &'a PriceLevel>) -> Option<Decimal> {
    levels.try_fold(Decimal::ZERO, |acc, l| acc.checked_add(l.size))
}

/// Rounds a ratio to [`RATIO_DP`] places, midpoint away from zero.
pub fn round_ratio(ratio: Decimal) -> Decimal {
    ratio.round_dp_with_strategy(RATIO_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Computes one rounded ratio per band, in band order, against `mid`.
pub fn calculate_depth_ratio(
    snapshot: &OrderBookSnapshot,
    mid: Decimal,
    bands: &[DepthBand],
) -> Result<Vec<BandRatio>, DegenerateSnapshot> {
    bands
        .iter()
        .map(|&band| {
            let volume =
                band_volumes(snapshot, mid, band).ok_or(DegenerateSnapshot::Overflow)?;
            Ok(BandRatio {
                band,
                ratio: volume.ratio().map(round_ratio),
            })
        })
        .collect()
}

/// Stateless per-tick aggregator holding the configured bands.
#[derive(Debug, Clone)]
pub struct DepthRatioAggregator {
    bands: Vec<DepthBand>,
}

impl DepthRatioAggregator {
    pub fn new(bands: Vec<DepthBand>) -> Self {
        Self { bands }
    }

    pub fn bands(&self) -> &[DepthBand] {
        &self.bands
    }

    /// Reduces a snapshot to its depth ratios.
    ///
    /// Fails without partial output when either side of the book is empty.
    pub fn aggregate(
        &self,
        snapshot: &OrderBookSnapshot,
    ) -> Result<DepthRatioResult, DegenerateSnapshot> {
        if snapshot.bids().is_empty() {
            return Err(DegenerateSnapshot::EmptySide(BookSide::Bid));
        }
        if snapshot.asks().is_empty() {
            return Err(DegenerateSnapshot::EmptySide(BookSide::Ask));
        }

        // both sides are populated, so a missing mid can only be overflow
        let mid = snapshot.mid_price().ok_or(DegenerateSnapshot::Overflow)?;

        Ok(DepthRatioResult {
            captured_at: snapshot.captured_at(),
            ratios: calculate_depth_ratio(snapshot, mid, &self.bands)?,
        })
    }
}
