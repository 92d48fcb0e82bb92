use std::sync::Arc;

use anyhow::Context;
use common::logger::init_logger;
use depthwatch::{
    config::AppConfig,
    exchange::{ExchangeClient, MarketDataSource},
    pipeline::{CandlePipeline, DepthRatioPipeline, supervise},
    sink::{SeriesSink, SinkBackend},
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Opens the configured sink. Database sinks are migrated before use.
async fn init_sink(cfg: &AppConfig) -> anyhow::Result<Arc<dyn SeriesSink>> {
    let backend = SinkBackend::connect(&cfg.sink)
        .await
        .with_context(|| format!("failed to open sink {:?}", cfg.sink))?;

    Ok(Arc::new(backend))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_logger("depthwatch", is_production);

    let cfg = AppConfig::from_env().context("invalid configuration")?;

    tracing::info!(
        symbol = %cfg.symbol,
        exchange = %cfg.exchange_url,
        sink = ?cfg.sink,
        "Starting depthwatch..."
    );

    let sink = init_sink(&cfg).await?;

    let source: Arc<dyn MarketDataSource> = Arc::new(
        ExchangeClient::new(cfg.exchange_url.clone(), cfg.book_level, cfg.fetch_timeout)
            .context("failed to build exchange client")?,
    );

    let shutdown = CancellationToken::new();
    let mut tasks = JoinSet::new();

    let depth = DepthRatioPipeline::new(
        cfg.symbol.clone(),
        source.clone(),
        sink.clone(),
        cfg.depth_bands.clone(),
    );
    let (every, token) = (cfg.depth_poll_interval, shutdown.clone());
    tasks.spawn(async move {
        depth.run(every, token).await;
        "depth_ratio"
    });

    let candles = CandlePipeline::new(cfg.symbol.clone(), source, sink, cfg.candle_bucket);
    let (every, token) = (cfg.price_poll_interval, shutdown.clone());
    tasks.spawn(async move {
        candles.run(every, token).await;
        "candles"
    });

    supervise(tasks, shutdown, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c; shutting down");
        }
    })
    .await;

    tracing::info!("depthwatch stopped");
    Ok(())
}
