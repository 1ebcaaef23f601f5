//! Persistent yearly sequence numbers.
//!
//! `SequenceStore` owns the configuration record and is the only writer of its
//! `progressive_number_<YYYY>` counters. Allocation is serialized twice:
//! in-process by a mutex, across processes by an exclusive `fs2` lock on a
//! sidecar `<config>.lock` file.
//!
//! A number is returned only after the incremented counter has been durably
//! written. If the write fails, the in-memory counter is left untouched and the
//! caller gets an `Allocation` error, so a restart can never hand out the same
//! number twice (gaps are possible, duplicates are not).

use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::paths::lock_path_for;
use crate::config::{ConfigRecord, Folders, Options, load_config, read_document, write_document};
use crate::errors::IngestError;

pub struct SequenceStore {
    path: PathBuf,
    lock_path: PathBuf,
    record: Mutex<ConfigRecord>,
}

impl SequenceStore {
    /// Load the record at `path`. Missing or corrupt files are startup failures.
    pub fn open(path: &Path) -> Result<Self, IngestError> {
        let record = load_config(path)?;
        info!(path = %path.display(), years = record.counters.len(), "Configuration loaded");
        Ok(Self::with_record(path, record))
    }

    /// Wrap an already-loaded record that persists to `path`.
    pub fn with_record(path: &Path, record: ConfigRecord) -> Self {
        Self {
            path: path.to_path_buf(),
            lock_path: lock_path_for(path),
            record: Mutex::new(record),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn folders(&self) -> Folders {
        self.lock().folders.clone()
    }

    pub fn options(&self) -> Options {
        self.lock().options.clone()
    }

    /// Last number handed out for `year` (0 if none yet).
    pub fn current(&self, year: i32) -> u64 {
        self.lock().counter(year)
    }

    /// Allocate, persist and return the next number for `year`.
    pub fn next(&self, year: i32) -> Result<u64, IngestError> {
        let mut record = self.lock();

        if let Some(&latest) = record.counters.keys().next_back()
            && year < latest
        {
            return Err(IngestError::StaleYear { year, latest });
        }

        let _file_lock = self.lock_file(year)?;

        // Another process may have allocated since we loaded; never go below the disk value.
        let mut base = match read_document::<ConfigRecord>(&self.path) {
            Ok(on_disk) => on_disk,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Re-reading config before allocation failed; using in-memory copy");
                record.clone()
            }
        };
        merge_high_water(&mut base.counters, &record.counters);

        let value = base.counter(year) + 1;
        base.counters.insert(year, value);

        write_document(&self.path, &base).map_err(|e| IngestError::Allocation {
            year,
            reason: format!("{e:#}"),
        })?;

        *record = base;
        debug!(year, seq = value, "Allocated sequence number");
        Ok(value)
    }

    fn lock(&self) -> MutexGuard<'_, ConfigRecord> {
        // A panic while holding the lock cannot leave a half-written counter:
        // the record is only replaced after a successful write.
        self.record.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_file(&self, year: i32) -> Result<File, IngestError> {
        let allocation = |reason: String| IngestError::Allocation { year, reason };
        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| allocation(format!("open lock '{}': {e}", self.lock_path.display())))?;
        f.lock_exclusive()
            .map_err(|e| allocation(format!("lock '{}': {e}", self.lock_path.display())))?;
        Ok(f)
    }
}

/// Raise every counter in `into` to at least the value in `from`.
fn merge_high_water(into: &mut BTreeMap<i32, u64>, from: &BTreeMap<i32, u64>) {
    for (year, &value) in from {
        let slot = into.entry(*year).or_insert(0);
        if *slot < value {
            *slot = value;
        }
    }
}
