use std::path::{Path, PathBuf};

use async_trait::async_trait;
use market::{Candle, DepthRatioResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::SinkError;
use crate::sink::records::{CandleRecord, DepthRatioRecord, SeriesQuery};
use crate::sink::{SeriesReader, SeriesSink};

/// Append-only JSON-lines files, one pair per symbol:
/// `depth_ratio_{symbol}.jsonl` and `candles_{symbol}.jsonl`.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    /// Creates `dir` if needed.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, SinkError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn depth_path(&self, symbol: &str) -> PathBuf {
        self.dir
            .join(format!("depth_ratio_{}.jsonl", file_stem(symbol)))
    }

    pub fn candle_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("candles_{}.jsonl", file_stem(symbol)))
    }
}

#[async_trait]
impl SeriesSink for FileSink {
    async fn append_depth_result(
        &self,
        symbol: &str,
        result: &DepthRatioResult,
    ) -> Result<(), SinkError> {
        append_line(&self.depth_path(symbol), &DepthRatioRecord::new(symbol, result)).await
    }

    async fn append_candle(&self, symbol: &str, candle: &Candle) -> Result<(), SinkError> {
        append_line(&self.candle_path(symbol), &CandleRecord::new(symbol, candle)).await
    }
}

#[async_trait]
impl SeriesReader for FileSink {
    async fn depth_series(&self, query: &SeriesQuery) -> Result<Vec<DepthRatioRecord>, SinkError> {
        let mut records: Vec<DepthRatioRecord> = read_lines(&self.depth_path(&query.symbol)).await?;

        records.retain(|r| query.admits(&r.timestamp));
        if let Some(band) = query.band {
            for r in &mut records {
                r.retain_band(band);
            }
        }
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    async fn candle_series(&self, query: &SeriesQuery) -> Result<Vec<CandleRecord>, SinkError> {
        let mut records: Vec<CandleRecord> = read_lines(&self.candle_path(&query.symbol)).await?;

        records.retain(|r| query.admits(&r.timestamp));
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }
}

async fn append_line<T: Serialize>(path: &Path, record: &T) -> Result<(), SinkError> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}

/// Reads every well-formed record. A missing file is an empty series.
async fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SinkError> {
    let contents = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut out = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(r) => out.push(r),
            Err(e) => {
                // poison-line resilience: skip but keep the rest of the series
                warn!(path = %path.display(), line = idx + 1, error = %e, "skipping malformed record");
            }
        }
    }
    Ok(out)
}

/// `BTC-USD` -> `BTC-USD`, `BTC/USD` -> `BTC_USD`.
fn file_stem(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_map_to_safe_file_names() {
        assert_eq!(file_stem("BTC-USD"), "BTC-USD");
        assert_eq!(file_stem("BTC/USD"), "BTC_USD");
        assert_eq!(file_stem("../etc"), "___etc");
    }
}
