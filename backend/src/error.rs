use market::InvalidBand;
use thiserror::Error;

/// Persistence failure. Callers log it and drop the record.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("corrupt stored value: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("DEPTH_BANDS entry {value:?}: {source}")]
    Band {
        value: String,
        #[source]
        source: InvalidBand,
    },

    #[error("DEPTH_BANDS must name at least one band")]
    NoBands,

    #[error("unknown SINK kind {0:?} (expected \"file\" or \"database\")")]
    UnknownSink(String),
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("depth band {0} is not configured")]
    UnknownBand(market::DepthBand),

    #[error(transparent)]
    Sink(#[from] SinkError),
}
