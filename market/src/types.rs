use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of an order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bid,
    Ask,
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookSide::Bid => f.write_str("bid"),
            BookSide::Ask => f.write_str("ask"),
        }
    }
}

/// Single resting level of an order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Point-in-time order book capture.
///
/// Bids are kept in descending price order and asks in ascending order,
/// whatever order the upstream payload used. Crossed or one-sided books
/// are representable; consumers decide how to treat them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBookSnapshot {
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
    captured_at: DateTime<Utc>,
}

impl OrderBookSnapshot {
    pub fn new(
        mut bids: Vec<PriceLevel>,
        mut asks: Vec<PriceLevel>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));

        Self {
            bids,
            asks,
            captured_at,
        }
    }

    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Highest bid price, if any.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Lowest ask price, if any.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Arithmetic mean of best bid and best ask.
    ///
    /// Undefined when either side of the book is empty, or when the two
    /// prices overflow when added.
    pub fn mid_price(&self) -> Option<Decimal> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some(bid.checked_add(ask)? / Decimal::TWO)
    }
}

/// Last traded price observed at `captured_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub captured_at: DateTime<Utc>,
}

impl PriceSample {
    pub fn new(price: Decimal, captured_at: DateTime<Utc>) -> Self {
        Self { price, captured_at }
    }
}
