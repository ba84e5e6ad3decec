use sqlx::AnyPool;

pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Index constituents, filled once by discovery or seeding.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS instruments (
  instrument_id TEXT PRIMARY KEY,
  component_name TEXT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Current rolling snapshot. Replaced as a whole every cycle.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS snapshot_rows (
  position BIGINT PRIMARY KEY,
  kind TEXT NOT NULL CHECK (kind IN ('instrument', 'total')),
  component_name TEXT NOT NULL,
  instrument_id TEXT NOT NULL,
  trend BIGINT NOT NULL,
  prices TEXT NOT NULL,
  taken_at TEXT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Aggregated trend series. Append-only.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS trend_series (
  seq BIGINT PRIMARY KEY,
  recorded_at TEXT NOT NULL,
  aggregated_trend BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
