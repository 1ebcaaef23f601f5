//! Retry sweep over the waiting folder.
//!
//! Each sweep takes a snapshot of the queue and tries to move every entry to
//! the destination. Moves run on a small dedicated rayon pool so one file
//! stuck on a hung network mount does not block the others. A sweep waits at
//! most `move_timeout` for its batch; entries whose move is still running are
//! tracked as in flight and skipped by later sweeps until their worker returns.

use anyhow::{Context, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::queue::WaitingQueue;

const DEFAULT_WORKERS: usize = 4;

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries a move was started for.
    pub attempted: usize,
    /// Final destination paths of delivered entries.
    pub delivered: Vec<PathBuf>,
    /// Entries whose move failed; they stay queued.
    pub failed: usize,
    /// Entries skipped because an earlier move is still running.
    pub skipped_in_flight: usize,
    /// Moves that did not finish before the sweep deadline.
    pub timed_out: usize,
}

/// Moves one waiting entry into the destination folder.
type MoveFn = Arc<dyn Fn(&WaitingQueue, &Path, &Path) -> Result<PathBuf> + Send + Sync>;

pub struct RetryResender {
    queue: WaitingQueue,
    destination: PathBuf,
    move_timeout: Duration,
    pool: ThreadPool,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
    mover: MoveFn,
}

impl RetryResender {
    pub fn new(queue: WaitingQueue, destination: impl Into<PathBuf>, move_timeout: Duration) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(DEFAULT_WORKERS)
            .thread_name(|i| format!("resend-{i}"))
            .build()
            .context("build resend worker pool")?;
        Ok(Self {
            queue,
            destination: destination.into(),
            move_timeout,
            pool,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            mover: Arc::new(|queue: &WaitingQueue, entry: &Path, destination: &Path| {
                queue.dequeue_to(entry, destination)
            }),
        })
    }

    #[cfg(test)]
    fn with_mover(mut self, mover: MoveFn) -> Self {
        self.mover = mover;
        self
    }

    /// Number of moves still running from earlier sweeps.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// One pass over the current waiting entries.
    pub fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let (tx, rx) = mpsc::channel::<(PathBuf, Result<PathBuf>)>();
        let drained = self.queue.drain(|entry| {
            if !self.claim(&entry) {
                report.skipped_in_flight += 1;
                return;
            }
            report.attempted += 1;

            let tx = tx.clone();
            let queue = self.queue.clone();
            let destination = self.destination.clone();
            let in_flight = Arc::clone(&self.in_flight);
            let mover = Arc::clone(&self.mover);
            self.pool.spawn(move || {
                let result = mover(&queue, &entry, &destination);
                if let Ok(mut set) = in_flight.lock() {
                    set.remove(&entry);
                }
                // The sweep may have stopped listening after its deadline.
                let _ = tx.send((entry, result));
            });
        });
        if let Err(e) = drained {
            warn!(error = %format!("{e:#}"), "Could not list waiting folder");
            return report;
        }
        drop(tx);

        let deadline = Instant::now().checked_add(self.move_timeout);
        let mut pending = report.attempted;
        while pending > 0 {
            let left = match deadline {
                Some(d) => d.saturating_duration_since(Instant::now()),
                None => self.move_timeout,
            };
            match rx.recv_timeout(left) {
                Ok((entry, Ok(dest))) => {
                    pending -= 1;
                    info!(from = %entry.display(), dest = %dest.display(), "Resent file from waiting folder to destination");
                    report.delivered.push(dest);
                }
                Ok((entry, Err(e))) => {
                    pending -= 1;
                    report.failed += 1;
                    debug!(path = %entry.display(), error = %format!("{e:#}"), "Resend failed; file stays queued");
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    report.timed_out = pending;
                    warn!(pending, timeout_secs = self.move_timeout.as_secs(), "Resend moves still running after deadline");
                    break;
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        if report.failed > 0 {
            warn!(failed = report.failed, delivered = report.delivered.len(), "Some waiting files could not be resent");
        }
        report
    }

    /// Mark `entry` in flight; false if a move for it is already running.
    fn claim(&self, entry: &Path) -> bool {
        match self.in_flight.lock() {
            Ok(mut set) => set.insert(entry.to_path_buf()),
            Err(p) => p.into_inner().insert(entry.to_path_buf()),
        }
    }
}
