use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{AnyPool, Row};

use crate::aggregate::TrendRecord;
use crate::quote::types::Instrument;
use crate::snapshot::model::{Snapshot, SnapshotRow};
use crate::snapshot::repository::SnapshotRepository;
use crate::trend::TrendSignal;

const KIND_INSTRUMENT: &str = "instrument";
const KIND_TOTAL: &str = "total";

/// SQLx-backed implementation of SnapshotRepository.
/// Responsible only for persistence and row mapping.
pub struct SqlxSnapshotRepository {
    pool: AnyPool,
}

impl SqlxSnapshotRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotRepository for SqlxSnapshotRepository {
    async fn load_instruments(&self) -> anyhow::Result<Vec<Instrument>> {
        let rows = sqlx::query(
            r#"
SELECT instrument_id, component_name
FROM instruments
ORDER BY component_name, instrument_id;
"#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> anyhow::Result<Instrument> {
                Ok(Instrument {
                    instrument_id: r.try_get("instrument_id")?,
                    component_name: r.try_get("component_name")?,
                })
            })
            .collect()
    }

    async fn seed_instruments(&self, instruments: &[Instrument]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        for i in instruments {
            sqlx::query(
                r#"
INSERT INTO instruments (instrument_id, component_name)
VALUES (?, ?)
ON CONFLICT (instrument_id) DO UPDATE SET component_name = excluded.component_name;
"#,
            )
            .bind(i.instrument_id.clone())
            .bind(i.component_name.clone())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn read_snapshot(&self) -> anyhow::Result<Vec<SnapshotRow>> {
        let rows = sqlx::query(
            r#"
SELECT component_name, instrument_id, trend, prices
FROM snapshot_rows
WHERE kind = ?
ORDER BY position;
"#,
        )
        .bind(KIND_INSTRUMENT.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_snapshot_row(&r) {
                Ok(s) => out.push(s),
                Err(e) => {
                    // poison-row resilience: the instrument restarts with an empty window
                    tracing::warn!(error = %e, "skipping malformed snapshot row");
                }
            }
        }

        Ok(out)
    }

    async fn read_series(&self) -> anyhow::Result<Vec<TrendRecord>> {
        let rows = sqlx::query(
            r#"
SELECT seq, recorded_at, aggregated_trend
FROM trend_series
ORDER BY seq;
"#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let taken_at = snapshot.taken_at.to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM snapshot_rows;")
            .execute(&mut *tx)
            .await?;

        for (pos, row) in snapshot.rows.iter().enumerate() {
            let prices = serde_json::to_string(&row.prices).context("encode prices")?;

            sqlx::query(
                r#"
INSERT INTO snapshot_rows
  (position, kind, component_name, instrument_id, trend, prices, taken_at)
VALUES (?, ?, ?, ?, ?, ?, ?);
"#,
            )
            .bind(pos as i64)
            .bind(KIND_INSTRUMENT.to_string())
            .bind(row.component_name.clone())
            .bind(row.instrument_id.clone())
            .bind(row.trend.value())
            .bind(prices)
            .bind(taken_at.clone())
            .execute(&mut *tx)
            .await?;
        }

        // Total row goes last, after every instrument.
        sqlx::query(
            r#"
INSERT INTO snapshot_rows
  (position, kind, component_name, instrument_id, trend, prices, taken_at)
VALUES (?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(snapshot.rows.len() as i64)
        .bind(KIND_TOTAL.to_string())
        .bind(snapshot.total.label.clone())
        .bind(snapshot.total.caption.clone())
        .bind(snapshot.total.trend)
        .bind("[]".to_string())
        .bind(taken_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn write_series(&self, records: &[TrendRecord]) -> anyhow::Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for rec in records {
            let seq = i64::try_from(rec.seq).map_err(|_| anyhow!("seq overflow: {}", rec.seq))?;

            sqlx::query(
                r#"
INSERT INTO trend_series (seq, recorded_at, aggregated_trend)
VALUES (?, ?, ?)
ON CONFLICT (seq) DO NOTHING;
"#,
            )
            .bind(seq)
            .bind(rec.recorded_at.to_rfc3339())
            .bind(rec.aggregated_trend)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/* =========================
Row mapping + conversions
========================= */

fn row_to_snapshot_row(r: &sqlx::any::AnyRow) -> anyhow::Result<SnapshotRow> {
    let trend_i64: i64 = r.try_get("trend")?;
    let prices_json: String = r.try_get("prices")?;

    Ok(SnapshotRow {
        component_name: r.try_get("component_name")?,
        instrument_id: r.try_get("instrument_id")?,
        prices: serde_json::from_str(&prices_json).context("invalid prices column")?,
        trend: TrendSignal::from_value(trend_i64)
            .ok_or_else(|| anyhow!("invalid trend value {}", trend_i64))?,
    })
}

fn row_to_record(r: &sqlx::any::AnyRow) -> anyhow::Result<TrendRecord> {
    let seq_i64: i64 = r.try_get("seq")?;
    let recorded_at: String = r.try_get("recorded_at")?;

    Ok(TrendRecord {
        seq: u64::try_from(seq_i64).context("negative seq")?,
        recorded_at: parse_ts(&recorded_at)?,
        aggregated_trend: r.try_get("aggregated_trend")?,
    })
}

fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp {s}"))?
        .with_timezone(&Utc))
}
