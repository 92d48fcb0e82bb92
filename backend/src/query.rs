//! Read side consumed by the dashboard.
//!
//! Selection state (start time, band, reference line) is carried by each
//! [`ChartRequest`]; the service itself only holds the configured bands.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use market::DepthBand;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::sink::{CandleRecord, SeriesQuery, SeriesReader};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChartRequest {
    /// Only records at or after this instant.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,

    /// Plot a single band instead of all configured ones.
    #[serde(default)]
    pub band: Option<DepthBand>,

    /// Horizontal line drawn across the depth panel.
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub reference_value: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepthPoint {
    pub timestamp: DateTime<Utc>,
    /// `None` where the band held no volume; plotted as a gap.
    #[serde(with = "rust_decimal::serde::str_option")]
    pub ratio: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepthSeries {
    pub band: DepthBand,
    pub points: Vec<DepthPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartData {
    pub symbol: String,
    pub candles: Vec<CandleRecord>,
    pub depth: Vec<DepthSeries>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub reference_value: Option<Decimal>,
}

pub struct ChartService {
    reader: Arc<dyn SeriesReader>,
    symbol: String,
    bands: Vec<DepthBand>,
}

impl ChartService {
    pub fn new(reader: Arc<dyn SeriesReader>, symbol: String, bands: Vec<DepthBand>) -> Self {
        Self {
            reader,
            symbol,
            bands,
        }
    }

    pub async fn chart(&self, req: &ChartRequest) -> Result<ChartData, QueryError> {
        let selected: Vec<DepthBand> = match req.band {
            Some(b) if !self.bands.contains(&b) => return Err(QueryError::UnknownBand(b)),
            Some(b) => vec![b],
            None => self.bands.clone(),
        };

        let mut query = SeriesQuery::new(self.symbol.clone());
        if let Some(start) = req.start {
            query = query.since(start);
        }

        let candles = self.reader.candle_series(&query).await?;

        if let Some(b) = req.band {
            query = query.band(b);
        }
        let records = self.reader.depth_series(&query).await?;

        // Pivot row-per-tick into series-per-band.
        let depth = selected
            .into_iter()
            .map(|band| DepthSeries {
                band,
                points: records
                    .iter()
                    .filter_map(|rec| {
                        rec.ratios.iter().find(|r| r.band == band).map(|r| DepthPoint {
                            timestamp: rec.timestamp,
                            ratio: r.ratio,
                        })
                    })
                    .collect(),
            })
            .collect();

        tracing::debug!(
            candles = candles.len(),
            depth_records = records.len(),
            "chart assembled"
        );

        Ok(ChartData {
            symbol: self.symbol.clone(),
            candles,
            depth,
            reference_value: req.reference_value,
        })
    }
}
