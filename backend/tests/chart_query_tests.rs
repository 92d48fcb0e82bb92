use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;

use depthwatch::error::{QueryError, SinkError};
use depthwatch::query::{ChartRequest, ChartService};
use depthwatch::sink::{CandleRecord, DepthRatioRecord, SeriesQuery, SeriesReader};
use market::{BandRatio, DepthBand};

const SYMBOL: &str = "BTC-USD";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 20, 19, 16, 0).unwrap()
}

fn band(p: u32) -> DepthBand {
    DepthBand::new(p.into()).unwrap()
}

/// Reader over fixed in-memory series that applies the query like a real
/// backend would.
struct FixedSeries {
    depth: Vec<DepthRatioRecord>,
    candles: Vec<CandleRecord>,
}

#[async_trait]
impl SeriesReader for FixedSeries {
    async fn depth_series(&self, q: &SeriesQuery) -> Result<Vec<DepthRatioRecord>, SinkError> {
        Ok(self
            .depth
            .iter()
            .filter(|r| r.symbol == q.symbol && q.admits(&r.timestamp))
            .cloned()
            .map(|mut r| {
                if let Some(b) = q.band {
                    r.retain_band(b);
                }
                r
            })
            .collect())
    }

    async fn candle_series(&self, q: &SeriesQuery) -> Result<Vec<CandleRecord>, SinkError> {
        Ok(self
            .candles
            .iter()
            .filter(|r| r.symbol == q.symbol && q.admits(&r.timestamp))
            .cloned()
            .collect())
    }
}

fn service() -> ChartService {
    let depth = (0..3)
        .map(|i| DepthRatioRecord {
            timestamp: t0() + Duration::minutes(i),
            symbol: SYMBOL.into(),
            ratios: vec![
                BandRatio { band: band(3), ratio: Some(dec!(0.4286)) },
                BandRatio { band: band(5), ratio: if i == 1 { None } else { Some(dec!(0.5)) } },
            ],
        })
        .collect();

    let candles = (0..3)
        .map(|i| CandleRecord {
            timestamp: t0() + Duration::minutes(i),
            symbol: SYMBOL.into(),
            open: dec!(100),
            high: dec!(105),
            low: dec!(98),
            close: dec!(102),
        })
        .collect();

    ChartService::new(
        Arc::new(FixedSeries { depth, candles }),
        SYMBOL.into(),
        vec![band(3), band(5)],
    )
}

#[tokio::test]
async fn default_request_plots_every_configured_band() {
    let chart = service().chart(&ChartRequest::default()).await.unwrap();

    assert_eq!(chart.symbol, SYMBOL);
    assert_eq!(chart.candles.len(), 3);
    assert_eq!(chart.depth.len(), 2);
    assert_eq!(chart.depth[0].band, band(3));
    assert_eq!(chart.depth[1].band, band(5));

    // undefined points are kept as gaps, not dropped or zeroed
    let five: Vec<_> = chart.depth[1].points.iter().map(|p| p.ratio).collect();
    assert_eq!(five, vec![Some(dec!(0.5)), None, Some(dec!(0.5))]);
    assert_eq!(chart.reference_value, None);
}

#[tokio::test]
async fn selection_travels_with_the_request() {
    let svc = service();

    let req = ChartRequest {
        start: Some(t0() + Duration::minutes(1)),
        band: Some(band(5)),
        reference_value: Some(dec!(0.5)),
    };
    let chart = svc.chart(&req).await.unwrap();

    assert_eq!(chart.candles.len(), 2);
    assert_eq!(chart.depth.len(), 1);
    assert_eq!(chart.depth[0].band, band(5));
    assert_eq!(chart.depth[0].points.len(), 2);
    assert_eq!(chart.depth[0].points[0].timestamp, t0() + Duration::minutes(1));
    assert_eq!(chart.reference_value, Some(dec!(0.5)));

    // a second request sees none of the first one's selection
    let plain = svc.chart(&ChartRequest::default()).await.unwrap();
    assert_eq!(plain.depth.len(), 2);
    assert_eq!(plain.reference_value, None);
}

#[tokio::test]
async fn unconfigured_band_is_rejected() {
    let req = ChartRequest {
        band: Some(band(8)),
        ..Default::default()
    };

    let err = service().chart(&req).await.unwrap_err();
    assert!(matches!(err, QueryError::UnknownBand(b) if b == band(8)));
}

#[test]
fn request_parses_from_dashboard_json() {
    let req: ChartRequest = serde_json::from_str(
        r#"{"start":"2024-11-20T19:16:00Z","band":"3%","reference_value":"0.65"}"#,
    )
    .unwrap();

    assert_eq!(req.start, Some(t0()));
    assert_eq!(req.band, Some(band(3)));
    assert_eq!(req.reference_value, Some(dec!(0.65)));

    let empty: ChartRequest = serde_json::from_str("{}").unwrap();
    assert_eq!(empty, ChartRequest::default());
}
