use sqlx::AnyPool;

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // One row per (tick, band); NULL ratio = undefined
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS depth_ratios (
  symbol TEXT NOT NULL,
  ts_ms BIGINT NOT NULL,
  band_index BIGINT NOT NULL,
  band TEXT NOT NULL,
  ratio TEXT NULL,
  PRIMARY KEY (symbol, ts_ms, band)
);
"#,
    )
    .execute(pool)
    .await?;

    // One row per closed bucket, write-once
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS candles (
  symbol TEXT NOT NULL,
  bucket_start_ms BIGINT NOT NULL,
  open TEXT NOT NULL,
  high TEXT NOT NULL,
  low TEXT NOT NULL,
  close TEXT NOT NULL,
  PRIMARY KEY (symbol, bucket_start_ms)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_depth_ratios_ts ON depth_ratios(symbol, ts_ms);"#)
        .execute(pool)
        .await?;

    Ok(())
}
