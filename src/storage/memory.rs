use chrono::Utc;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{LocationStore, StorageError};
use crate::location::{LocationRecord, NewLocationRecord, ReporterId, VehicleId};

/// In-memory store for tests; appends can be switched to fail.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<LocationRecord>>,
    vehicles: HashMap<ReporterId, VehicleId>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vehicles(vehicles: HashMap<ReporterId, VehicleId>) -> Self {
        Self {
            vehicles,
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<LocationRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl LocationStore for MemoryStore {
    fn append(&self, record: NewLocationRecord) -> Result<LocationRecord, StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(io::Error::other("store unavailable").into());
        }
        let mut records = self.records.lock().unwrap();
        let record = record.into_record(records.len() as u64 + 1, Utc::now());
        records.push(record.clone());
        Ok(record)
    }

    fn last_for_reporter(
        &self,
        reporter_id: ReporterId,
    ) -> Result<Option<LocationRecord>, StorageError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.reporter_id == reporter_id)
            .cloned())
    }

    fn vehicle_for_reporter(&self, reporter_id: ReporterId) -> Option<VehicleId> {
        self.vehicles.get(&reporter_id).copied()
    }
}
