use std::path::PathBuf;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use depthwatch::sink::{FileSink, SeriesQuery, SeriesReader, SeriesSink};
use market::{BandRatio, Candle, DepthBand, DepthRatioResult};

const SYMBOL: &str = "BTC-USD";

/// Fresh directory under the system temp dir; the sink creates it.
fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("depthwatch-test-{}", Uuid::new_v4()))
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 20, 19, 16, 0).unwrap()
}

fn band(p: u32) -> DepthBand {
    DepthBand::new(p.into()).unwrap()
}

#[tokio::test]
async fn depth_lines_are_appended_and_read_back() {
    let dir = scratch_dir();
    let sink = FileSink::open(&dir).await.unwrap();

    for i in 0..3 {
        let r = DepthRatioResult {
            captured_at: t0() + Duration::seconds(5 * i),
            ratios: vec![
                BandRatio { band: band(3), ratio: Some(dec!(0.4286)) },
                BandRatio { band: band(5), ratio: None },
            ],
        };
        sink.append_depth_result(SYMBOL, &r).await.unwrap();
    }

    let path = sink.depth_path(SYMBOL);
    assert_eq!(path, dir.join("depth_ratio_BTC-USD.jsonl"));

    let raw = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(raw.lines().count(), 3);

    let first: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
    assert_eq!(first["symbol"], "BTC-USD");
    assert_eq!(first["ratios"][0]["band"], "3");
    assert_eq!(first["ratios"][0]["ratio"], "0.4286");
    assert!(first["ratios"][1]["ratio"].is_null());

    let all = sink.depth_series(&SeriesQuery::new(SYMBOL)).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[2].timestamp, t0() + Duration::seconds(10));

    let filtered = sink
        .depth_series(&SeriesQuery::new(SYMBOL).since(t0() + Duration::seconds(5)).band(band(5)))
        .await
        .unwrap();
    assert_eq!(filtered.len(), 2);
    assert!(filtered.iter().all(|r| r.ratios == vec![BandRatio { band: band(5), ratio: None }]));

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn candles_survive_reopen_and_skip_torn_lines() {
    let dir = scratch_dir();
    let c = Candle {
        bucket_start: t0(),
        open: dec!(100),
        high: dec!(105),
        low: dec!(98),
        close: dec!(102),
    };

    {
        let sink = FileSink::open(&dir).await.unwrap();
        sink.append_candle(SYMBOL, &c).await.unwrap();
    }

    // half-written line from an interrupted process
    let path = dir.join("candles_BTC-USD.jsonl");
    let mut raw = tokio::fs::read_to_string(&path).await.unwrap();
    raw.push_str("{\"timestamp\":\"2024-11-20T19:17");
    tokio::fs::write(&path, raw).await.unwrap();

    let sink = FileSink::open(&dir).await.unwrap();
    let got = sink.candle_series(&SeriesQuery::new(SYMBOL)).await.unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].timestamp, t0());
    assert_eq!((got[0].open, got[0].close), (dec!(100), dec!(102)));

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn unknown_symbol_reads_as_empty_series() {
    let dir = scratch_dir();
    let sink = FileSink::open(&dir).await.unwrap();

    assert!(sink.depth_series(&SeriesQuery::new("NOPE-USD")).await.unwrap().is_empty());
    assert!(sink.candle_series(&SeriesQuery::new("NOPE-USD")).await.unwrap().is_empty());

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}
