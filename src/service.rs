//! Service lifecycle: wires the store, watcher and resend sweep together.
//!
//! `Service::open` only reads configuration. Folders are checked (and created)
//! by `start`, so a missing or corrupt config never leaves directories behind.
//! `stop` blocks until the watcher and sweep are quiescent and returns the
//! run's report; both `start` and `stop` may be called repeatedly.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use crate::config::Folders;
use crate::errors::IngestError;
use crate::notifier::{LogNotifier, Notifier};
use crate::processor::{ErrorDisposition, FileProcessor, ProcessingOutcome};
use crate::queue::WaitingQueue;
use crate::resender::{RetryResender, SweepReport};
use crate::scheduler::Periodic;
use crate::sequence::SequenceStore;
use crate::shutdown::StopToken;
use crate::watcher::{ChangeSource, DirectoryWatcher, NotifySource, OutcomeSink, WatchSettings};

/// Counts of what happened during a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    pub delivered: usize,
    pub queued: usize,
    pub rejected: usize,
    pub errored: usize,
    /// Files delivered later by the resend sweep.
    pub resent: usize,
    /// Last known locations of files that could not be placed anywhere.
    pub custody_lost: Vec<PathBuf>,
}

impl ServiceReport {
    pub fn record(&mut self, outcome: &ProcessingOutcome) {
        match outcome {
            ProcessingOutcome::Delivered(_) => self.delivered += 1,
            ProcessingOutcome::Queued(_) => self.queued += 1,
            ProcessingOutcome::Rejected => self.rejected += 1,
            ProcessingOutcome::Errored(ErrorDisposition::InErrorFolder(_)) => self.errored += 1,
            ProcessingOutcome::Errored(ErrorDisposition::CustodyLost { last_known, .. }) => {
                self.errored += 1;
                self.custody_lost.push(last_known.clone());
            }
        }
    }

    pub fn record_sweep(&mut self, sweep: &SweepReport) {
        self.resent += sweep.delivered.len();
    }

    pub fn has_custody_loss(&self) -> bool {
        !self.custody_lost.is_empty()
    }
}

struct Running {
    watcher: DirectoryWatcher,
    sweep: Periodic,
}

pub struct Service {
    store: Arc<SequenceStore>,
    source: Arc<dyn ChangeSource>,
    notifier: Arc<dyn Notifier>,
    stats: Arc<Mutex<ServiceReport>>,
    running: Option<Running>,
}

impl Service {
    /// Load configuration from `config_path`; touches no folders.
    pub fn open(config_path: &Path) -> Result<Self, IngestError> {
        let store = SequenceStore::open(config_path)?;
        Ok(Self::from_store(Arc::new(store)))
    }

    pub fn from_store(store: Arc<SequenceStore>) -> Self {
        let options = store.options();
        let source = NotifySource::new(options.watch_backend, options.poll_interval);
        Self {
            store,
            source: Arc::new(source),
            notifier: Arc::new(LogNotifier),
            stats: Arc::new(Mutex::new(ServiceReport::default())),
            running: None,
        }
    }

    pub fn with_change_source(mut self, source: Arc<dyn ChangeSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &Arc<SequenceStore> {
        &self.store
    }

    pub fn folders(&self) -> Folders {
        self.store.folders()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// False once the watcher has stopped itself (e.g. input folder removed).
    pub fn is_watching(&self) -> bool {
        self.running.as_ref().is_some_and(|r| r.watcher.is_running())
    }

    /// Check the folders, then start the watcher and the periodic resend sweep.
    pub fn start(&mut self) -> Result<(), IngestError> {
        if self.running.is_some() {
            return Ok(());
        }
        let folders = self.store.folders();
        let options = self.store.options();
        folders.ensure_ready()?;

        let resender = self.resender()?;
        let token = StopToken::new();
        let stats = Arc::clone(&self.stats);
        let sweep = Periodic::spawn("resend-sweep", options.sweep_interval, token, move || {
            let report = resender.sweep_once();
            if !report.delivered.is_empty() {
                lock(&stats).record_sweep(&report);
            }
        })
        .map_err(|e| IngestError::Spawn(format!("resend sweep: {e}")))?;

        let processor = Arc::new(FileProcessor::new(Arc::clone(&self.store)));
        let stats = Arc::clone(&self.stats);
        let on_outcome: OutcomeSink = Arc::new(move |_path: &Path, outcome: &ProcessingOutcome| {
            lock(&stats).record(outcome);
        });
        let settings = WatchSettings {
            dir: folders.input.clone(),
            debounce: options.debounce,
            scan_existing: options.scan_existing_on_start,
        };
        let mut watcher = DirectoryWatcher::new(
            settings,
            Arc::clone(&self.source),
            processor,
            Arc::clone(&self.notifier),
            on_outcome,
        );
        // `sweep` is dropped (and so stopped) if the watcher cannot start.
        watcher.start()?;

        info!(
            input = %folders.input.display(),
            destination = %folders.destination.display(),
            waiting = %folders.waiting.display(),
            error = %folders.error.display(),
            "Service started"
        );
        self.running = Some(Running { watcher, sweep });
        Ok(())
    }

    /// Stop watching and sweeping, wait for in-progress work, and report.
    pub fn stop(&mut self) -> ServiceReport {
        if let Some(mut running) = self.running.take() {
            running.watcher.stop();
            running.sweep.stop();
            let report = self.report();
            if report.has_custody_loss() {
                warn!(count = report.custody_lost.len(), "Files lost custody during this run");
            }
            info!(
                delivered = report.delivered,
                queued = report.queued,
                rejected = report.rejected,
                errored = report.errored,
                resent = report.resent,
                "Service stopped"
            );
        }
        self.report()
    }

    /// Snapshot of the counts so far.
    pub fn report(&self) -> ServiceReport {
        lock(&self.stats).clone()
    }

    /// Run a single resend sweep without starting the service.
    pub fn sweep_once(&self) -> Result<SweepReport, IngestError> {
        let report = self.resender()?.sweep_once();
        lock(&self.stats).record_sweep(&report);
        Ok(report)
    }

    fn resender(&self) -> Result<RetryResender, IngestError> {
        let folders = self.store.folders();
        let options = self.store.options();
        RetryResender::new(WaitingQueue::new(&folders.waiting), &folders.destination, options.move_timeout)
            .map_err(|e| IngestError::Spawn(format!("{e:#}")))
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(stats: &Mutex<ServiceReport>) -> MutexGuard<'_, ServiceReport> {
    stats.lock().unwrap_or_else(|p| p.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_outcomes() {
        let mut r = ServiceReport::default();
        r.record(&ProcessingOutcome::Delivered(PathBuf::from("/d/a")));
        r.record(&ProcessingOutcome::Queued(PathBuf::from("/w/b")));
        r.record(&ProcessingOutcome::Rejected);
        r.record(&ProcessingOutcome::Errored(ErrorDisposition::CustodyLost {
            last_known: PathBuf::from("/in/c"),
            reason: "gone".into(),
        }));
        assert_eq!((r.delivered, r.queued, r.rejected, r.errored), (1, 1, 1, 1));
        assert!(r.has_custody_loss());
        assert_eq!(r.custody_lost, [PathBuf::from("/in/c")]);

        r.record_sweep(&SweepReport {
            delivered: vec![PathBuf::from("/d/b")],
            ..SweepReport::default()
        });
        assert_eq!(r.resent, 1);
    }
}
