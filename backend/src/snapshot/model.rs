use chrono::{DateTime, Utc};

use crate::trend::TrendSignal;
use crate::window::PriceTable;

/// Label of the synthetic aggregate row.
pub const TOTAL_LABEL: &str = "Total";
pub const TOTAL_CAPTION: &str = "Aggregated Trend";

/// Persisted state of one instrument.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotRow {
    pub component_name: String,
    pub instrument_id: String,

    /// Window cells newest first: index 0 is age 1.
    pub prices: Vec<Option<f64>>,

    pub trend: TrendSignal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TotalRow {
    pub label: String,
    pub caption: String,
    pub trend: i64,
}

impl TotalRow {
    pub fn new(trend: i64) -> Self {
        Self {
            label: TOTAL_LABEL.to_string(),
            caption: TOTAL_CAPTION.to_string(),
            trend,
        }
    }
}

/// Full rolling state after one cycle. Replaces the previous snapshot
/// wholesale when persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub rows: Vec<SnapshotRow>,
    pub total: TotalRow,
}

impl Snapshot {
    /// `signals[i]` belongs to `table.rows()[i]`.
    pub fn build(
        table: &PriceTable,
        signals: &[TrendSignal],
        total: i64,
        taken_at: DateTime<Utc>,
    ) -> Self {
        let rows = table
            .rows()
            .iter()
            .zip(signals)
            .map(|(row, signal)| SnapshotRow {
                component_name: row.instrument.component_name.clone(),
                instrument_id: row.instrument.instrument_id.clone(),
                prices: row.window.newest_first().collect(),
                trend: *signal,
            })
            .collect();

        Self {
            taken_at,
            rows,
            total: TotalRow::new(total),
        }
    }
}

/// History keyed by instrument id, as consumed by [`PriceTable::restore`].
pub fn history(rows: Vec<SnapshotRow>) -> impl Iterator<Item = (String, Vec<Option<f64>>)> {
    rows.into_iter().map(|r| (r.instrument_id, r.prices))
}
