//! Per-file state machine: validate, number, rename, relocate.
//!
//! ```text
//! Detected -> Validated -> Renamed -> Delivered
//!                                  \-> Queued (waiting folder, retried later)
//!          any failure after validation -> Errored (error folder, or custody lost)
//! ```
//!
//! Every failure is handled here; `process` never returns an error and never
//! panics on I/O, so a bad file cannot take down the watcher or the sweep.

use chrono::{Datelike, Local, NaiveDate};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Folders;
use crate::errors::IngestError;
use crate::fs_ops::{OnCollision, move_file, rename_in_place};
use crate::queue::WaitingQueue;
use crate::sequence::SequenceStore;

/// Terminal effect of one processing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// Renamed and moved to the destination folder.
    Delivered(PathBuf),
    /// Renamed and parked in the waiting folder.
    Queued(PathBuf),
    /// Not an accepted document (or no longer a file); left untouched.
    Rejected,
    Errored(ErrorDisposition),
}

/// Where a failed file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDisposition {
    InErrorFolder(PathBuf),
    /// Every fallback failed; `last_known` is where the file was last seen.
    CustodyLost { last_known: PathBuf, reason: String },
}

impl ProcessingOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessingOutcome::Delivered(_) => "delivered",
            ProcessingOutcome::Queued(_) => "queued",
            ProcessingOutcome::Rejected => "rejected",
            ProcessingOutcome::Errored(ErrorDisposition::InErrorFolder(_)) => "errored",
            ProcessingOutcome::Errored(ErrorDisposition::CustodyLost { .. }) => "custody_lost",
        }
    }

    pub fn is_custody_loss(&self) -> bool {
        matches!(
            self,
            ProcessingOutcome::Errored(ErrorDisposition::CustodyLost { .. })
        )
    }
}

impl fmt::Display for ProcessingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingOutcome::Delivered(p)
            | ProcessingOutcome::Queued(p)
            | ProcessingOutcome::Errored(ErrorDisposition::InErrorFolder(p)) => {
                write!(f, "{} ({})", self.label(), p.display())
            }
            ProcessingOutcome::Rejected => f.write_str("rejected"),
            ProcessingOutcome::Errored(ErrorDisposition::CustodyLost { last_known, .. }) => {
                write!(f, "custody lost (last seen {})", last_known.display())
            }
        }
    }
}

/// `Prog_<seq>_<original>_<YYYYMMDD>`
pub fn canonical_name(seq: u64, original: &str, date: NaiveDate) -> String {
    format!("Prog_{seq}_{original}_{}", date.format("%Y%m%d"))
}

/// Case-insensitive extension check against a lower-case allow-list.
pub fn has_accepted_extension(path: &Path, accepted: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| accepted.iter().any(|a| *a == e))
}

pub struct FileProcessor {
    folders: Folders,
    accepted: Vec<String>,
    store: Arc<SequenceStore>,
    queue: WaitingQueue,
}

impl FileProcessor {
    pub fn new(store: Arc<SequenceStore>) -> Self {
        let folders = store.folders();
        let accepted = store.options().accepted_extensions;
        let queue = WaitingQueue::new(&folders.waiting);
        Self {
            folders,
            accepted,
            store,
            queue,
        }
    }

    pub fn folders(&self) -> &Folders {
        &self.folders
    }

    /// Process `path` using today's local date.
    pub fn process(&self, path: &Path) -> ProcessingOutcome {
        self.process_on(path, Local::now().date_naive())
    }

    /// Process `path` as if today were `today` (the date embedded in the new name
    /// and the year whose counter is used).
    pub fn process_on(&self, path: &Path, today: NaiveDate) -> ProcessingOutcome {
        let Some(original) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            warn!(path = %path.display(), "Ignoring path without a file name");
            return ProcessingOutcome::Rejected;
        };

        if !has_accepted_extension(path, &self.accepted) {
            info!(file = %original, "Skipping file with unaccepted extension");
            return ProcessingOutcome::Rejected;
        }

        match fs::symlink_metadata(path) {
            Ok(m) if m.is_file() => {}
            Ok(_) => {
                info!(path = %path.display(), "Skipping non-regular file");
                return ProcessingOutcome::Rejected;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "File vanished before processing");
                return ProcessingOutcome::Rejected;
            }
        }

        let year = today.year();
        let seq = match self.store.next(year) {
            Ok(n) => n,
            Err(e) => {
                error!(code = e.code(), path = %path.display(), error = %e, "Sequence allocation failed");
                return self.route_to_error(path, &e.to_string());
            }
        };

        let new_name = canonical_name(seq, &original, today);
        let renamed = match rename_in_place(path, &new_name) {
            Ok(p) => p,
            Err(e) => {
                error!(path = %path.display(), seq, error = %format!("{e:#}"), "Rename failed");
                return self.route_to_error(path, &format!("{e:#}"));
            }
        };
        info!(file = %original, seq, year, renamed = %new_name, "Renamed file");

        match move_file(&renamed, &self.folders.destination, OnCollision::Refuse) {
            Ok(dest) => {
                info!(seq, dest = %dest.display(), "Moved file to destination folder");
                return ProcessingOutcome::Delivered(dest);
            }
            Err(e) => {
                warn!(seq, error = %format!("{e:#}"), "Failed to move file to destination; queuing");
            }
        }

        match self.queue.enqueue(&renamed) {
            Ok(waiting) => {
                info!(seq, path = %waiting.display(), "Moved file to waiting folder");
                ProcessingOutcome::Queued(waiting)
            }
            Err(e) => {
                error!(seq, path = %renamed.display(), error = %format!("{e:#}"), "Failed to queue file");
                self.route_to_error(&renamed, &format!("{e:#}"))
            }
        }
    }

    /// Last resort: park `current` in the error folder, creating it if needed.
    fn route_to_error(&self, current: &Path, cause: &str) -> ProcessingOutcome {
        let error_dir = &self.folders.error;
        if let Err(e) = fs::create_dir_all(error_dir) {
            warn!(dir = %error_dir.display(), error = %e, "Could not create error folder");
        }
        match move_file(current, error_dir, OnCollision::RenameWithSuffix) {
            Ok(p) => {
                warn!(path = %p.display(), cause, "Moved file to error folder");
                ProcessingOutcome::Errored(ErrorDisposition::InErrorFolder(p))
            }
            Err(e) => {
                let lost = IngestError::CustodyLoss {
                    path: current.to_path_buf(),
                    reason: format!("{e:#}"),
                };
                error!(
                    severity = "critical",
                    code = lost.code(),
                    path = %current.display(),
                    cause,
                    error = %lost,
                    "Could not move file to error folder; manual intervention required"
                );
                ProcessingOutcome::Errored(ErrorDisposition::CustodyLost {
                    last_known: current.to_path_buf(),
                    reason: format!("{e:#}"),
                })
            }
        }
    }
}
