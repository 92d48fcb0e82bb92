//! Persistence for the two output series.
//!
//! Writers only see [`SeriesSink`]; the dashboard side only sees
//! [`SeriesReader`]. Both backends implement both traits.

pub mod file_sink;
pub mod records;
pub mod sqlx_sink;

use async_trait::async_trait;
use market::{Candle, DepthRatioResult};

use crate::config::SinkConfig;
use crate::db::Db;
use crate::error::SinkError;

pub use file_sink::FileSink;
pub use records::{CandleRecord, DepthRatioRecord, SeriesQuery};
pub use sqlx_sink::SqlxSink;

#[async_trait]
pub trait SeriesSink: Send + Sync {
    async fn append_depth_result(
        &self,
        symbol: &str,
        result: &DepthRatioResult,
    ) -> Result<(), SinkError>;

    async fn append_candle(&self, symbol: &str, candle: &Candle) -> Result<(), SinkError>;
}

/// Read access ordered by timestamp, ascending.
#[async_trait]
pub trait SeriesReader: Send + Sync {
    async fn depth_series(&self, query: &SeriesQuery) -> Result<Vec<DepthRatioRecord>, SinkError>;

    async fn candle_series(&self, query: &SeriesQuery) -> Result<Vec<CandleRecord>, SinkError>;
}

/// Backend selected at startup from [`SinkConfig`].
pub enum SinkBackend {
    File(FileSink),
    Sqlx(SqlxSink),
}

impl SinkBackend {
    pub async fn connect(cfg: &SinkConfig) -> anyhow::Result<Self> {
        match cfg {
            SinkConfig::File { dir } => Ok(Self::File(FileSink::open(dir).await?)),
            SinkConfig::Database { url } => {
                let db = Db::connect(url).await?;
                db.migrate().await?;
                Ok(Self::Sqlx(SqlxSink::new(db.pool)))
            }
        }
    }
}

#[async_trait]
impl SeriesSink for SinkBackend {
    async fn append_depth_result(
        &self,
        symbol: &str,
        result: &DepthRatioResult,
    ) -> Result<(), SinkError> {
        match self {
            Self::File(s) => s.append_depth_result(symbol, result).await,
            Self::Sqlx(s) => s.append_depth_result(symbol, result).await,
        }
    }

    async fn append_candle(&self, symbol: &str, candle: &Candle) -> Result<(), SinkError> {
        match self {
            Self::File(s) => s.append_candle(symbol, candle).await,
            Self::Sqlx(s) => s.append_candle(symbol, candle).await,
        }
    }
}

#[async_trait]
impl SeriesReader for SinkBackend {
    async fn depth_series(&self, query: &SeriesQuery) -> Result<Vec<DepthRatioRecord>, SinkError> {
        match self {
            Self::File(s) => s.depth_series(query).await,
            Self::Sqlx(s) => s.depth_series(query).await,
        }
    }

    async fn candle_series(&self, query: &SeriesQuery) -> Result<Vec<CandleRecord>, SinkError> {
        match self {
            Self::File(s) => s.candle_series(query).await,
            Self::Sqlx(s) => s.candle_series(query).await,
        }
    }
}
