use serde::Deserialize;
use serde_json::Value;

/// `GET /products/{id}/book` body.
///
/// Levels are `[price, size, ...]` arrays with string-encoded numbers. The
/// trailing entries depend on the requested level (order count or order id)
/// and are ignored.
#[derive(Debug, Deserialize)]
pub struct BookResponse {
    #[serde(default)]
    pub bids: Vec<Vec<Value>>,
    #[serde(default)]
    pub asks: Vec<Vec<Value>>,
    pub sequence: Option<u64>,
}

/// `GET /products/{id}/ticker` body.
#[derive(Debug, Deserialize)]
pub struct TickerResponse {
    pub price: String,
    pub trade_id: Option<u64>,
}
