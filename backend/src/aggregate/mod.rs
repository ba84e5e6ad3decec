//! Index-wide aggregation of per-instrument trend signals.

use chrono::{DateTime, Utc};

use crate::trend::TrendSignal;

/// Sum of all signals of one cycle.
pub fn aggregate<'a, I>(signals: I) -> i64
where
    I: IntoIterator<Item = &'a TrendSignal>,
{
    signals.into_iter().map(|s| s.value()).sum()
}

/// One completed cycle in the aggregated series.
#[derive(Clone, Debug, PartialEq)]
pub struct TrendRecord {
    /// Position in the series, starting at 0. Never reused.
    pub seq: u64,

    /// Instant the cycle total was computed.
    pub recorded_at: DateTime<Utc>,

    pub aggregated_trend: i64,
}

/// Append-only time series of cycle totals.
#[derive(Clone, Debug, Default)]
pub struct AggregatedTrendSeries {
    records: Vec<TrendRecord>,
}

impl AggregatedTrendSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps previously persisted records, ordered by sequence number.
    pub fn from_records(mut records: Vec<TrendRecord>) -> Self {
        records.sort_by_key(|r| r.seq);
        records.dedup_by_key(|r| r.seq);
        Self { records }
    }

    /// Appends one record and returns it.
    pub fn append(&mut self, recorded_at: DateTime<Utc>, aggregated_trend: i64) -> &TrendRecord {
        let seq = self.records.last().map(|r| r.seq + 1).unwrap_or(0);
        self.records.push(TrendRecord {
            seq,
            recorded_at,
            aggregated_trend,
        });
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[TrendRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&TrendRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
