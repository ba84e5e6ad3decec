use anyhow::Result;
use async_trait::async_trait;

use crate::aggregate::TrendRecord;
use crate::quote::types::Instrument;
use crate::snapshot::model::{Snapshot, SnapshotRow};

/// Persistence boundary of the trend engine.
///
/// Writes must be atomic for readers: a snapshot is either fully replaced or
/// left as it was.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    async fn load_instruments(&self) -> Result<Vec<Instrument>>;

    async fn seed_instruments(&self, instruments: &[Instrument]) -> Result<()>;

    /// Instrument rows of the last snapshot, in persisted order. Empty if none.
    async fn read_snapshot(&self) -> Result<Vec<SnapshotRow>>;

    /// Aggregated series ordered by sequence number. Empty if none.
    async fn read_series(&self) -> Result<Vec<TrendRecord>>;

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<()>;

    /// Stores the given records. Records whose sequence number is already
    /// stored are left untouched.
    async fn write_series(&self, records: &[TrendRecord]) -> Result<()>;
}
