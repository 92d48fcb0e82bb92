pub mod config;
pub mod db;
pub mod exchange;
pub mod metrics;
pub mod pipeline;
pub mod query;
pub mod sink;

pub mod error;
