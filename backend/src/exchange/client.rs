use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market::{OrderBookSnapshot, PriceLevel, PriceSample};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::exchange::MarketDataSource;
use crate::exchange::errors::FetchError;
use crate::exchange::types::{BookResponse, TickerResponse};

const USER_AGENT: &str = concat!("depthwatch/", env!("CARGO_PKG_VERSION"));

/// Largest price or size accepted on a book level. Keeps per-band sums of
/// thousands of levels far from `Decimal::MAX`.
const MAX_LEVEL_VALUE: i64 = 1_000_000_000_000_000_000;

/// REST client for a Coinbase-Exchange-shaped public API.
#[derive(Clone)]
pub struct ExchangeClient {
    http: Client,
    url: String,
    book_level: u8,
}

impl ExchangeClient {
    pub fn new(url: String, book_level: u8, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            book_level,
        })
    }

    #[instrument(skip(self), fields(level = self.book_level), level = "debug")]
    pub async fn fetch_order_book(&self, symbol: &str) -> Result<OrderBookSnapshot, FetchError> {
        let url = format!("{}/products/{}/book", self.url, symbol);

        let resp = self
            .http
            .get(&url)
            .query(&[("level", self.book_level)])
            .send()
            .await?
            .error_for_status()?;

        let body: BookResponse = resp.json().await?;

        debug!(
            bids = body.bids.len(),
            asks = body.asks.len(),
            sequence = ?body.sequence,
            "order book fetched"
        );

        parse_book(body, Utc::now())
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_last_price(&self, symbol: &str) -> Result<PriceSample, FetchError> {
        let url = format!("{}/products/{}/ticker", self.url, symbol);

        let resp = self.http.get(&url).send().await?.error_for_status()?;
        let body: TickerResponse = resp.json().await?;

        debug!(price = %body.price, trade_id = ?body.trade_id, "ticker fetched");

        parse_ticker(body, Utc::now())
    }
}

#[async_trait]
impl MarketDataSource for ExchangeClient {
    async fn fetch_order_book(&self, symbol: &str) -> Result<OrderBookSnapshot, FetchError> {
        ExchangeClient::fetch_order_book(self, symbol).await
    }

    async fn fetch_last_price(&self, symbol: &str) -> Result<PriceSample, FetchError> {
        ExchangeClient::fetch_last_price(self, symbol).await
    }
}

/// Converts a raw book payload into a snapshot captured at `captured_at`.
///
/// Every level must start with a non-negative price and size no larger than
/// 1e18; anything else rejects the whole payload so a half-parsed book is
/// never aggregated.
pub fn parse_book(
    body: BookResponse,
    captured_at: DateTime<Utc>,
) -> Result<OrderBookSnapshot, FetchError> {
    let bids = parse_levels(&body.bids, "bids")?;
    let asks = parse_levels(&body.asks, "asks")?;
    Ok(OrderBookSnapshot::new(bids, asks, captured_at))
}

pub fn parse_ticker(
    body: TickerResponse,
    captured_at: DateTime<Utc>,
) -> Result<PriceSample, FetchError> {
    let price = parse_decimal(&body.price)
        .ok_or_else(|| FetchError::malformed("ticker", format!("bad price {:?}", body.price)))?;

    if price <= Decimal::ZERO {
        return Err(FetchError::malformed(
            "ticker",
            format!("non-positive price {price}"),
        ));
    }

    Ok(PriceSample::new(price, captured_at))
}

fn parse_levels(raw: &[Vec<Value>], side: &'static str) -> Result<Vec<PriceLevel>, FetchError> {
    let max = Decimal::from(MAX_LEVEL_VALUE);
    raw.iter()
        .enumerate()
        .map(|(i, level)| -> Result<PriceLevel, FetchError> {
            let field = |idx: usize| {
                level
                    .get(idx)
                    .and_then(value_to_decimal)
                    .filter(|d| !d.is_sign_negative() && *d <= max)
                    .ok_or_else(|| {
                        FetchError::malformed("order book", format!("{side}[{i}] = {level:?}"))
                    })
            };
            Ok(PriceLevel::new(field(0)?, field(1)?))
        })
        .collect()
}

fn value_to_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s.trim())
        .or_else(|_| Decimal::from_scientific(s.trim()))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book(json: &str) -> BookResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_level2_payload_and_sorts_sides() {
        let body = book(
            r#"{
                "sequence": 42,
                "bids": [["99.00", "1.0", 3], ["100.00", "2.0", 1]],
                "asks": [["102.00", "3.0", 2], ["101.00", "1.0", 1]]
            }"#,
        );

        let snap = parse_book(body, Utc::now()).unwrap();
        assert_eq!(snap.best_bid(), Some(dec!(100)));
        assert_eq!(snap.best_ask(), Some(dec!(101)));
        assert_eq!(snap.mid_price(), Some(dec!(100.5)));
        assert_eq!(snap.bids().len(), 2);
    }

    #[test]
    fn level3_order_ids_are_ignored() {
        let body = book(
            r#"{"bids": [["100.0", "0.5", "b7f1c0c2-order"]], "asks": [["101.0", "0.25", "a1"]]}"#,
        );
        let snap = parse_book(body, Utc::now()).unwrap();
        assert_eq!(snap.bids()[0].size, dec!(0.5));
    }

    #[test]
    fn missing_sides_default_to_empty() {
        let snap = parse_book(book(r#"{"message": "ok"}"#), Utc::now()).unwrap();
        assert!(snap.bids().is_empty());
        assert!(snap.asks().is_empty());
        assert_eq!(snap.mid_price(), None);
    }

    #[test]
    fn malformed_levels_reject_the_payload() {
        for json in [
            r#"{"bids": [["abc", "1"]], "asks": []}"#,
            r#"{"bids": [["100"]], "asks": []}"#,
            r#"{"bids": [], "asks": [["100", "-1"]]}"#,
            r#"{"bids": [], "asks": [[null, "1"]]}"#,
            r#"{"bids": [["79228162514264337593543950335", "1"]], "asks": [["79228162514264337593543950335", "1"]]}"#,
            r#"{"bids": [["100", "1000000000000000001"]], "asks": []}"#,
        ] {
            let err = parse_book(book(json), Utc::now()).unwrap_err();
            assert!(
                matches!(err, FetchError::Malformed { .. }),
                "{json} -> {err:?}"
            );
        }
    }

    #[test]
    fn largest_accepted_level_still_aggregates() {
        let body = book(
            r#"{"bids": [["1000000000000000000", "1000000000000000000"]],
                "asks": [["1000000000000000000", "1000000000000000000"]]}"#,
        );
        let snap = parse_book(body, Utc::now()).unwrap();
        let out = market::DepthRatioAggregator::new(vec![
            market::DepthBand::new(dec!(99.99)).unwrap(),
        ])
        .aggregate(&snap)
        .unwrap();
        assert_eq!(out.ratios[0].ratio, Some(dec!(0.5)));
    }

    #[test]
    fn ticker_price_parses() {
        let now = Utc::now();
        let body: TickerResponse =
            serde_json::from_str(r#"{"trade_id": 7, "price": "97123.45", "size": "0.01"}"#)
                .unwrap();
        let s = parse_ticker(body, now).unwrap();
        assert_eq!(s.price, dec!(97123.45));
        assert_eq!(s.captured_at, now);
    }

    #[test]
    fn ticker_rejects_garbage_and_zero() {
        for price in ["", "n/a", "0", "-3"] {
            let body = TickerResponse {
                price: price.to_string(),
                trade_id: None,
            };
            assert!(parse_ticker(body, Utc::now()).is_err(), "{price:?}");
        }
    }

    #[test]
    fn client_normalizes_base_url() {
        let c = ExchangeClient::new("https://example.test/".into(), 2, Duration::from_secs(1))
            .unwrap();
        assert_eq!(c.url, "https://example.test");
    }
}
