pub mod client;
pub mod errors;
pub mod types;

use async_trait::async_trait;
use market::{OrderBookSnapshot, PriceSample};

pub use client::ExchangeClient;
pub use errors::FetchError;

/// Point-in-time market data consumed by the pipelines.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_order_book(&self, symbol: &str) -> Result<OrderBookSnapshot, FetchError>;

    async fn fetch_last_price(&self, symbol: &str) -> Result<PriceSample, FetchError>;
}
