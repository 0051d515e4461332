mod journal;
#[cfg(test)]
pub mod memory;

use thiserror::Error;

use crate::location::{LocationRecord, NewLocationRecord, ReporterId, VehicleId};

pub use journal::JournalStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only location log, keyed by reporter.
pub trait LocationStore: Send + Sync {
    /// Persists a record and assigns it the next sequence id.
    fn append(&self, record: NewLocationRecord) -> Result<LocationRecord, StorageError>;

    /// Most recently appended record for the reporter, if any.
    fn last_for_reporter(
        &self,
        reporter_id: ReporterId,
    ) -> Result<Option<LocationRecord>, StorageError>;

    /// Vehicle currently assigned to the reporter.
    fn vehicle_for_reporter(&self, reporter_id: ReporterId) -> Option<VehicleId>;
}
