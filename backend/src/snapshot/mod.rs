pub mod model;
pub mod repository;
pub mod repository_sqlx;

pub use model::{Snapshot, SnapshotRow, TOTAL_CAPTION, TOTAL_LABEL, TotalRow};
pub use repository::SnapshotRepository;
pub use repository_sqlx::SqlxSnapshotRepository;
