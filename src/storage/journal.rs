use chrono::Utc;
use log::{error, info, warn};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{LocationStore, StorageError};
use crate::location::{LocationRecord, NewLocationRecord, ReporterId, SequenceId, VehicleId};

type LastRecord = Arc<Mutex<Option<LocationRecord>>>;

/// Filesystem store with one JSON-lines journal per reporter.
///
/// Appends for one reporter are serialised on that reporter's lock; the
/// store-wide locks only cover the sequence counter and the reporter map,
/// so one reporter's fsync does not hold up the others.
pub struct JournalStore {
    base: PathBuf,
    vehicles: HashMap<ReporterId, VehicleId>,
    next_sequence: Mutex<SequenceId>,
    reporters: Mutex<HashMap<ReporterId, LastRecord>>,
}

impl JournalStore {
    /// Opens the journal folder, replaying existing journals to recover
    /// the sequence counter and each reporter's last record.
    pub fn open(
        base: PathBuf,
        vehicles: HashMap<ReporterId, VehicleId>,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(&base)?;

        let mut next_sequence = 1;
        let mut last: HashMap<ReporterId, LocationRecord> = HashMap::new();

        for entry in base.read_dir()? {
            let path = entry?.path();
            let Some(reporter_id) = journal_reporter_id(&path) else {
                continue;
            };

            for record in read_journal(&path)? {
                next_sequence = next_sequence.max(record.sequence_id + 1);
                let newer = last
                    .get(&reporter_id)
                    .map_or(true, |prev| prev.sequence_id < record.sequence_id);
                if newer {
                    last.insert(reporter_id, record);
                }
            }
        }

        info!(
            "Opened journal store at {} ({} reporters, next sequence {})",
            base.display(),
            last.len(),
            next_sequence
        );

        let reporters = last
            .into_iter()
            .map(|(id, record)| (id, Arc::new(Mutex::new(Some(record)))))
            .collect();

        Ok(Self {
            base,
            vehicles,
            next_sequence: Mutex::new(next_sequence),
            reporters: Mutex::new(reporters),
        })
    }

    fn journal_path(&self, reporter_id: ReporterId) -> PathBuf {
        self.base.join(format!("{}.jsonl", reporter_id))
    }

    fn reporter(&self, reporter_id: ReporterId) -> LastRecord {
        lock(&self.reporters).entry(reporter_id).or_default().clone()
    }

    /// Ids taken by failed appends are not handed out again.
    fn reserve_sequence(&self) -> SequenceId {
        let mut next = lock(&self.next_sequence);
        let id = *next;
        *next += 1;
        id
    }
}

impl LocationStore for JournalStore {
    fn append(&self, record: NewLocationRecord) -> Result<LocationRecord, StorageError> {
        let reporter = self.reporter(record.reporter_id);
        // Held across the write so a reporter's lines hit disk in sequence order.
        let mut last = lock(&reporter);

        let record = record.into_record(self.reserve_sequence(), Utc::now());
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.journal_path(record.reporter_id))?;
        append_line(&mut file, line.as_bytes())?;

        *last = Some(record.clone());
        Ok(record)
    }

    fn last_for_reporter(
        &self,
        reporter_id: ReporterId,
    ) -> Result<Option<LocationRecord>, StorageError> {
        let Some(reporter) = lock(&self.reporters).get(&reporter_id).cloned() else {
            return Ok(None);
        };
        let last = lock(&reporter).clone();
        Ok(last)
    }

    fn vehicle_for_reporter(&self, reporter_id: ReporterId) -> Option<VehicleId> {
        self.vehicles.get(&reporter_id).copied()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The parts of a file a journal append needs.
trait JournalFile: Write {
    fn size(&self) -> io::Result<u64>;
    fn truncate(&mut self, size: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl JournalFile for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, size: u64) -> io::Result<()> {
        self.set_len(size)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Writes and syncs one line, or leaves the file as it was.
///
/// A failed write or sync is cut back off so the next append never lands
/// on a torn fragment.
fn append_line<F: JournalFile>(file: &mut F, line: &[u8]) -> io::Result<()> {
    let size = file.size()?;
    let result = file.write_all(line).and_then(|()| file.sync());

    if let Err(e) = result {
        if let Err(rollback) = file.truncate(size) {
            error!("Failed to roll back journal write: {}", rollback);
        }
        return Err(e);
    }
    Ok(())
}

fn journal_reporter_id(path: &Path) -> Option<ReporterId> {
    if !path.is_file() || path.extension().map_or(true, |ext| ext != "jsonl") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    match stem.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!("Ignoring journal with unexpected name {}", path.display());
            None
        }
    }
}

fn read_journal(path: &Path) -> Result<Vec<LocationRecord>, StorageError> {
    let content = fs::read_to_string(path)?;
    let mut records = Vec::new();

    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LocationRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                // A torn trailing line after a crash must not block startup.
                error!(
                    "Skipping corrupt journal line {}:{}: {}",
                    path.display(),
                    i + 1,
                    e
                );
            }
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::EventType;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn new_record(reporter_id: ReporterId, lon: f64) -> NewLocationRecord {
        NewLocationRecord {
            reporter_id,
            latitude: 0.0,
            longitude: lon,
            accuracy: 3.0,
            speed: 0.0,
            bearing: 90.0,
            reported_bearing: None,
            altitude: 0.0,
            is_moving: false,
            distance_from_last: 0.0,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            event_type: EventType::Initial,
        }
    }

    #[test]
    fn test_append_assigns_increasing_sequence_ids() {
        let dir = TempDir::new().unwrap();
        let store = JournalStore::open(dir.path().to_path_buf(), HashMap::new()).unwrap();

        let a = store.append(new_record(1, 0.0)).unwrap();
        let b = store.append(new_record(2, 0.0)).unwrap();
        let c = store.append(new_record(1, 0.1)).unwrap();

        assert_eq!((a.sequence_id, b.sequence_id, c.sequence_id), (1, 2, 3));
        assert_eq!(store.last_for_reporter(1).unwrap().unwrap().sequence_id, 3);
        assert_eq!(store.last_for_reporter(2).unwrap().unwrap().sequence_id, 2);
        assert!(store.last_for_reporter(9).unwrap().is_none());
    }

    #[test]
    fn test_reopen_recovers_state() {
        let dir = TempDir::new().unwrap();
        {
            let store = JournalStore::open(dir.path().to_path_buf(), HashMap::new()).unwrap();
            store.append(new_record(1, 0.0)).unwrap();
            store.append(new_record(1, 0.5)).unwrap();
            store.append(new_record(4, 0.0)).unwrap();
        }

        let store = JournalStore::open(dir.path().to_path_buf(), HashMap::new()).unwrap();
        let last = store.last_for_reporter(1).unwrap().unwrap();
        assert_eq!(last.sequence_id, 2);
        assert_eq!(last.longitude, 0.5);

        let next = store.append(new_record(4, 1.0)).unwrap();
        assert_eq!(next.sequence_id, 4);
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        {
            let store = JournalStore::open(dir.path().to_path_buf(), HashMap::new()).unwrap();
            store.append(new_record(3, 0.0)).unwrap();
        }
        let path = dir.path().join("3.jsonl");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"sequence_id\": 2, \"trunc").unwrap();

        let store = JournalStore::open(dir.path().to_path_buf(), HashMap::new()).unwrap();
        assert_eq!(store.last_for_reporter(3).unwrap().unwrap().sequence_id, 1);
    }

    #[test]
    fn test_foreign_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join("abc.jsonl"), "{}").unwrap();

        let store = JournalStore::open(dir.path().to_path_buf(), HashMap::new()).unwrap();
        assert_eq!(store.append(new_record(1, 0.0)).unwrap().sequence_id, 1);
    }

    /// In-memory journal file that accepts `accept` more bytes, then fails.
    struct FlakyFile {
        data: Vec<u8>,
        accept: usize,
        fail_sync: bool,
    }

    impl FlakyFile {
        fn new(existing: &[u8], accept: usize, fail_sync: bool) -> Self {
            Self {
                data: existing.to_vec(),
                accept,
                fail_sync,
            }
        }
    }

    impl Write for FlakyFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.accept == 0 {
                return Err(io::Error::other("disk full"));
            }
            let n = buf.len().min(self.accept);
            self.data.extend_from_slice(&buf[..n]);
            self.accept -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl JournalFile for FlakyFile {
        fn size(&self) -> io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn truncate(&mut self, size: u64) -> io::Result<()> {
            self.data.truncate(size as usize);
            Ok(())
        }

        fn sync(&mut self) -> io::Result<()> {
            if self.fail_sync {
                return Err(io::Error::other("sync failed"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_torn_write_is_rolled_back() {
        let mut file = FlakyFile::new(b"{\"a\":1}\n", 5, false);
        assert!(append_line(&mut file, b"{\"b\":2}\n").is_err());
        assert_eq!(file.data, b"{\"a\":1}\n");

        file.accept = usize::MAX;
        append_line(&mut file, b"{\"c\":3}\n").unwrap();
        assert_eq!(file.data, b"{\"a\":1}\n{\"c\":3}\n");
    }

    #[test]
    fn test_failed_sync_is_rolled_back() {
        let mut file = FlakyFile::new(b"", usize::MAX, true);
        assert!(append_line(&mut file, b"{\"a\":1}\n").is_err());
        assert!(file.data.is_empty());
    }

    #[test]
    fn test_failed_append_does_not_reuse_sequence_id() {
        let dir = TempDir::new().unwrap();
        let store = JournalStore::open(dir.path().to_path_buf(), HashMap::new()).unwrap();
        assert_eq!(store.append(new_record(1, 0.0)).unwrap().sequence_id, 1);

        // A directory where the journal file should be makes the open fail.
        fs::create_dir(dir.path().join("7.jsonl")).unwrap();
        assert!(store.append(new_record(7, 0.0)).is_err());
        assert!(store.last_for_reporter(7).unwrap().is_none());

        let next = store.append(new_record(1, 0.1)).unwrap();
        assert_eq!(next.sequence_id, 3);
        assert_eq!(store.last_for_reporter(1).unwrap().unwrap().sequence_id, 3);
    }

    #[test]
    fn test_reporters_append_independently() {
        let dir = TempDir::new().unwrap();
        let store = JournalStore::open(dir.path().to_path_buf(), HashMap::new()).unwrap();
        store.append(new_record(1, 0.0)).unwrap();

        // Reporter 1's append lock is held as if mid-fsync.
        let slot = store.reporter(1);
        let _busy = lock(&slot);

        let other = store.append(new_record(2, 0.0)).unwrap();
        assert_eq!(other.sequence_id, 2);
        assert_eq!(store.last_for_reporter(2).unwrap().unwrap().sequence_id, 2);
    }

    #[test]
    fn test_vehicle_lookup() {
        let dir = TempDir::new().unwrap();
        let vehicles = HashMap::from([(7, 42)]);
        let store = JournalStore::open(dir.path().to_path_buf(), vehicles).unwrap();
        assert_eq!(store.vehicle_for_reporter(7), Some(42));
        assert_eq!(store.vehicle_for_reporter(8), None);
    }
}
