//! The waiting folder as a durable queue.
//!
//! The directory *is* the queue: an entry exists exactly while a file is
//! waiting, and crash recovery is free because nothing lives in memory.
//! Ordering is made explicit here instead of depending on `read_dir` order:
//! snapshots list the oldest sequence first (name order as a tie-breaker).

use anyhow::{Context, Result};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::fs_ops::{OnCollision, move_file};

/// Directory-backed queue of files awaiting delivery.
#[derive(Debug, Clone)]
pub struct WaitingQueue {
    dir: PathBuf,
}

impl WaitingQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Move `file` into the queue. Fails rather than overwrite a queued file.
    pub fn enqueue(&self, file: &Path) -> Result<PathBuf> {
        let queued = move_file(file, &self.dir, OnCollision::Refuse)
            .with_context(|| format!("enqueue '{}'", file.display()))?;
        debug!(path = %queued.display(), "Queued for retry");
        Ok(queued)
    }

    /// Snapshot of the queued files in delivery order.
    ///
    /// Hidden entries (in-progress copies, probes) and non-files are skipped.
    pub fn snapshot(&self) -> Result<Vec<PathBuf>> {
        let rd = fs::read_dir(&self.dir)
            .with_context(|| format!("list waiting folder '{}'", self.dir.display()))?;
        let mut entries: Vec<PathBuf> = rd
            .filter_map(|res| match res {
                Ok(e) => Some(e),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable waiting entry");
                    None
                }
            })
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .collect();
        entries.sort_by(|a, b| queue_order(a, b));
        Ok(entries)
    }

    /// Hand every queued entry, oldest first, to `attempt`.
    ///
    /// An entry leaves the queue only if `attempt` moves it out (typically via
    /// [`WaitingQueue::dequeue_to`]); returns the number of entries visited.
    pub fn drain<F>(&self, mut attempt: F) -> Result<usize>
    where
        F: FnMut(PathBuf),
    {
        let entries = self.snapshot()?;
        let n = entries.len();
        for entry in entries {
            attempt(entry);
        }
        Ok(n)
    }

    /// Move a queued `entry` into `dst_dir`. On failure the entry stays queued.
    pub fn dequeue_to(&self, entry: &Path, dst_dir: &Path) -> Result<PathBuf> {
        move_file(entry, dst_dir, OnCollision::Refuse)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.snapshot()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Sequence number of a canonical `Prog_<n>_...` name.
pub(crate) fn sequence_of(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let rest = name.strip_prefix("Prog_")?;
    let digits = rest.split('_').next()?;
    digits.parse().ok()
}

fn queue_order(a: &Path, b: &Path) -> Ordering {
    match (sequence_of(a), sequence_of(b)) {
        (Some(x), Some(y)) if x != y => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => a.file_name().cmp(&b.file_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn snapshot_orders_by_sequence_and_skips_hidden() {
        let dir = tempdir().unwrap();
        for name in [
            "Prog_10_b.pdf_20250101",
            "Prog_2_a.pdf_20250101",
            ".pdf_exporter.1.2.part",
            "stray.pdf",
        ] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let q = WaitingQueue::new(dir.path());
        let names: Vec<_> = q
            .snapshot()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["Prog_2_a.pdf_20250101", "Prog_10_b.pdf_20250101", "stray.pdf"]);
    }

    #[test]
    fn dequeue_failure_keeps_entry() {
        let root = tempdir().unwrap();
        let q = WaitingQueue::new(root.path());
        let entry = root.path().join("Prog_1_a.pdf_x");
        fs::write(&entry, b"x").unwrap();

        assert!(q.dequeue_to(&entry, &root.path().join("unmounted")).is_err());
        assert!(entry.exists());

        let out = root.path().join("out");
        fs::create_dir(&out).unwrap();
        q.dequeue_to(&entry, &out).unwrap();
        assert!(q.is_empty().unwrap());
    }

    #[test]
    fn drain_visits_in_order_and_keeps_unmoved_entries() {
        let root = tempdir().unwrap();
        let out = root.path().join("out");
        let wait = root.path().join("wait");
        fs::create_dir_all(&out).unwrap();
        fs::create_dir_all(&wait).unwrap();
        for name in ["Prog_3_c.pdf_x", "Prog_1_a.pdf_x", "Prog_2_b.pdf_x"] {
            fs::write(wait.join(name), b"x").unwrap();
        }

        let q = WaitingQueue::new(&wait);
        let mut seen = Vec::new();
        let visited = q
            .drain(|entry| {
                let seq = sequence_of(&entry).unwrap();
                seen.push(seq);
                if seq != 2 {
                    q.dequeue_to(&entry, &out).unwrap();
                }
            })
            .unwrap();
        assert_eq!(visited, 3);
        assert_eq!(seen, [1, 2, 3]);
        assert_eq!(q.len().unwrap(), 1);
        assert!(wait.join("Prog_2_b.pdf_x").exists());
    }

    #[test]
    fn enqueue_refuses_duplicates() {
        let root = tempdir().unwrap();
        let wait = root.path().join("wait");
        fs::create_dir(&wait).unwrap();
        let q = WaitingQueue::new(&wait);

        let a = root.path().join("Prog_1_a.pdf_x");
        fs::write(&a, b"1").unwrap();
        q.enqueue(&a).unwrap();

        fs::write(&a, b"2").unwrap();
        assert!(q.enqueue(&a).is_err());
        assert_eq!(fs::read(wait.join("Prog_1_a.pdf_x")).unwrap(), b"1");
        assert_eq!(q.len().unwrap(), 1);
    }

    #[test]
    fn sequence_parsing() {
        assert_eq!(sequence_of(Path::new("/w/Prog_42_r.pdf_20250101")), Some(42));
        assert_eq!(sequence_of(Path::new("/w/report.pdf")), None);
        assert_eq!(sequence_of(Path::new("/w/Prog_x_r.pdf")), None);
    }
}
