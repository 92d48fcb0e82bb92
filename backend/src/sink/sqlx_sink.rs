use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::time::{from_ms, to_ms};
use market::{BandRatio, Candle, DepthBand, DepthRatioResult};
use rust_decimal::Decimal;
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};

use crate::error::SinkError;
use crate::sink::records::{CandleRecord, DepthRatioRecord, SeriesQuery};
use crate::sink::{SeriesReader, SeriesSink};

/// SQLx-backed sink and reader.
/// Responsible only for persistence and row mapping; the schema lives in
/// [`crate::db::schema`].
///
/// Decimals are stored as text so the four-decimal ratios and exchange
/// prices round-trip exactly. An undefined ratio is stored as `NULL`.
#[derive(Clone)]
pub struct SqlxSink {
    pool: AnyPool,
}

impl SqlxSink {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SeriesSink for SqlxSink {
    async fn append_depth_result(
        &self,
        symbol: &str,
        result: &DepthRatioResult,
    ) -> Result<(), SinkError> {
        let ts_ms = to_ms(&result.captured_at);
        let mut tx = self.pool.begin().await?;

        for (idx, r) in result.ratios.iter().enumerate() {
            sqlx::query(
                r#"
INSERT INTO depth_ratios (symbol, ts_ms, band_index, band, ratio)
VALUES (?, ?, ?, ?, ?);
"#,
            )
            .bind(symbol)
            .bind(ts_ms)
            .bind(idx as i64)
            .bind(String::from(r.band))
            .bind(r.ratio.map(|v| v.to_string()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn append_candle(&self, symbol: &str, candle: &Candle) -> Result<(), SinkError> {
        sqlx::query(
            r#"
INSERT INTO candles (symbol, bucket_start_ms, open, high, low, close)
VALUES (?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(symbol)
        .bind(to_ms(&candle.bucket_start))
        .bind(candle.open.to_string())
        .bind(candle.high.to_string())
        .bind(candle.low.to_string())
        .bind(candle.close.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SeriesReader for SqlxSink {
    async fn depth_series(&self, query: &SeriesQuery) -> Result<Vec<DepthRatioRecord>, SinkError> {
        let start_ms = query.start.as_ref().map_or(i64::MIN, to_ms);

        let rows = match query.band {
            Some(band) => {
                sqlx::query(
                    r#"
SELECT ts_ms, band, ratio
FROM depth_ratios
WHERE symbol = ? AND ts_ms >= ? AND band = ?
ORDER BY ts_ms, band_index;
"#,
                )
                .bind(&query.symbol)
                .bind(start_ms)
                .bind(String::from(band))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
SELECT ts_ms, band, ratio
FROM depth_ratios
WHERE symbol = ? AND ts_ms >= ?
ORDER BY ts_ms, band_index;
"#,
                )
                .bind(&query.symbol)
                .bind(start_ms)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut out: Vec<DepthRatioRecord> = Vec::new();
        for r in rows {
            let (timestamp, ratio) = match row_to_band_ratio(&r) {
                Ok(v) => v,
                Err(e) => {
                    // poison-row resilience: skip but don't fail the series
                    tracing::warn!(error = %e, "skipping malformed depth ratio row");
                    continue;
                }
            };

            match out.last_mut() {
                Some(last) if last.timestamp == timestamp => last.ratios.push(ratio),
                _ => out.push(DepthRatioRecord {
                    timestamp,
                    symbol: query.symbol.clone(),
                    ratios: vec![ratio],
                }),
            }
        }

        Ok(out)
    }

    async fn candle_series(&self, query: &SeriesQuery) -> Result<Vec<CandleRecord>, SinkError> {
        let start_ms = query.start.as_ref().map_or(i64::MIN, to_ms);

        let rows = sqlx::query(
            r#"
SELECT bucket_start_ms, open, high, low, close
FROM candles
WHERE symbol = ? AND bucket_start_ms >= ?
ORDER BY bucket_start_ms;
"#,
        )
        .bind(&query.symbol)
        .bind(start_ms)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_candle(&r, &query.symbol) {
                Ok(c) => out.push(c),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed candle row");
                }
            }
        }

        Ok(out)
    }
}

/* =========================
Row mapping + conversions
========================= */

fn row_to_band_ratio(r: &AnyRow) -> Result<(DateTime<Utc>, BandRatio), SinkError> {
    let timestamp = ms_to_ts(r.try_get("ts_ms")?)?;

    let band_str: String = r.try_get("band")?;
    let band = DepthBand::from_str(&band_str)
        .map_err(|e| SinkError::Decode(format!("band {band_str:?}: {e}")))?;

    let ratio = r
        .try_get::<Option<String>, _>("ratio")?
        .map(|s| text_to_decimal(&s))
        .transpose()?;

    Ok((timestamp, BandRatio { band, ratio }))
}

fn row_to_candle(r: &AnyRow, symbol: &str) -> Result<CandleRecord, SinkError> {
    Ok(CandleRecord {
        timestamp: ms_to_ts(r.try_get("bucket_start_ms")?)?,
        symbol: symbol.to_string(),
        open: text_to_decimal(&r.try_get::<String, _>("open")?)?,
        high: text_to_decimal(&r.try_get::<String, _>("high")?)?,
        low: text_to_decimal(&r.try_get::<String, _>("low")?)?,
        close: text_to_decimal(&r.try_get::<String, _>("close")?)?,
    })
}

/* =========================
Numeric safety helpers
========================= */

fn ms_to_ts(v: i64) -> Result<DateTime<Utc>, SinkError> {
    from_ms(v).ok_or_else(|| SinkError::Decode(format!("timestamp out of range: {v}")))
}

fn text_to_decimal(s: &str) -> Result<Decimal, SinkError> {
    Decimal::from_str(s).map_err(|e| SinkError::Decode(format!("decimal {s:?}: {e}")))
}
