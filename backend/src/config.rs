use std::path::PathBuf;
use std::time::Duration;

use market::DepthBand;

use crate::error::ConfigError;

/// Where computed series are persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkConfig {
    /// JSON-lines files under `dir`.
    File { dir: PathBuf },

    /// Relational store reached through `sqlx::Any` (SQLite URLs).
    Database { url: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    // =========================
    // Exchange
    // =========================
    /// Base URL of the exchange REST API, without trailing slash.
    pub exchange_url: String,

    /// Trading pair, in the exchange's product id format (e.g. `BTC-USD`).
    pub symbol: String,

    /// Order book detail level requested from the exchange (1, 2 or 3).
    ///
    /// Level 1 only carries the best bid/ask, which makes every band see
    /// the same two levels; level 2 is the useful default.
    pub book_level: u8,

    /// Upper bound on a single HTTP request, connect to last body byte.
    ///
    /// A slow fetch delays the next tick of its own pipeline by at most
    /// this much; in-flight requests are never aborted on shutdown.
    pub fetch_timeout: Duration,

    // =========================
    // Depth ratio pipeline
    // =========================
    /// Percentage bands around mid price, in output order.
    pub depth_bands: Vec<DepthBand>,

    /// Order book poll cadence.
    pub depth_poll_interval: Duration,

    // =========================
    // Candle pipeline
    // =========================
    /// Ticker poll cadence.
    pub price_poll_interval: Duration,

    /// Candle bucket length. Buckets are aligned to the Unix epoch, so 60s
    /// buckets coincide with wall-clock minutes.
    pub candle_bucket: Duration,

    // =========================
    // Persistence
    // =========================
    pub sink: SinkConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unset or blank keys
    /// fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let exchange_url = get("EXCHANGE_URL")
            .unwrap_or_else(|| "https://api.exchange.coinbase.com".to_string())
            .trim_end_matches('/')
            .to_string();

        let symbol = get("SYMBOL")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "BTC-USD".to_string());

        let book_level = match get("BOOK_LEVEL") {
            None => 2,
            Some(v) => match v.trim().parse::<u8>() {
                Ok(l @ 1..=3) => l,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "BOOK_LEVEL",
                        value: v,
                        reason: "expected 1, 2 or 3".into(),
                    });
                }
            },
        };

        let depth_bands = match get("DEPTH_BANDS") {
            None => default_bands(),
            Some(v) => parse_bands(&v)?,
        };

        let sink = match get("SINK").as_deref().map(str::trim) {
            None | Some("file") => SinkConfig::File {
                dir: get("SINK_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./logs")),
            },
            Some("database") => SinkConfig::Database {
                url: get("DATABASE_URL")
                    .unwrap_or_else(|| "sqlite://depthwatch.db?mode=rwc".to_string()),
            },
            Some(other) => return Err(ConfigError::UnknownSink(other.to_string())),
        };

        Ok(Self {
            exchange_url,
            symbol,
            book_level,
            fetch_timeout: secs(get("FETCH_TIMEOUT_SECS"), "FETCH_TIMEOUT_SECS", 10)?,
            depth_bands,
            depth_poll_interval: secs(get("DEPTH_POLL_SECS"), "DEPTH_POLL_SECS", 5)?,
            price_poll_interval: secs(get("PRICE_POLL_SECS"), "PRICE_POLL_SECS", 5)?,
            candle_bucket: secs(get("CANDLE_BUCKET_SECS"), "CANDLE_BUCKET_SECS", 60)?,
            sink,
        })
    }
}

fn default_bands() -> Vec<DepthBand> {
    [3u32, 5, 8, 15, 30]
        .into_iter()
        .filter_map(|p| DepthBand::new(p.into()).ok())
        .collect()
}

/// Comma-separated percentages, e.g. `3,5,8` or `2.5%, 10%`. Duplicates are
/// dropped, first occurrence wins.
fn parse_bands(raw: &str) -> Result<Vec<DepthBand>, ConfigError> {
    let mut bands: Vec<DepthBand> = Vec::new();

    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let band = part.parse::<DepthBand>().map_err(|source| ConfigError::Band {
            value: part.to_string(),
            source,
        })?;
        if !bands.contains(&band) {
            bands.push(band);
        }
    }

    if bands.is_empty() {
        return Err(ConfigError::NoBands);
    }
    Ok(bands)
}

fn secs(raw: Option<String>, key: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let Some(v) = raw else {
        return Ok(Duration::from_secs(default));
    };

    match v.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(Duration::from_secs(n)),
        _ => Err(ConfigError::Invalid {
            key,
            value: v,
            reason: "expected a positive whole number of seconds".into(),
        }),
    }
}
