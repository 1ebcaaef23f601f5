//! Input-folder watcher.
//!
//! Change notification is a capability (`ChangeSource`): something that, given
//! a directory, streams creation signals into a channel until its
//! `Subscription` is dropped. `NotifySource` provides it with the `notify`
//! crate, either OS-native or by polling.
//!
//! `DirectoryWatcher` consumes the stream on a dispatcher thread. Each new
//! file gets its own worker thread, which waits the debounce delay and then
//! runs the `FileProcessor`; a slow or hung file therefore never delays the
//! others. The debounce is a heuristic: a writer slower than the delay can
//! still be read early.

use notify::event::CreateKind;
use notify::{Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::WatchBackendKind;
use crate::errors::IngestError;
use crate::fs_ops::is_internal_name;
use crate::notifier::{NOTIFY_DURATION, Notifier};
use crate::processor::{FileProcessor, ProcessingOutcome};
use crate::queue::sequence_of;
use crate::shutdown::StopToken;

/// How often the dispatcher wakes up to check for shutdown and directory loss.
const TICK: Duration = Duration::from_millis(200);

/// One item of a change stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// A new entry appeared at this path.
    Created(PathBuf),
    /// The backend hit a problem but keeps watching.
    Error(String),
    /// The backend cannot continue (e.g. the directory was removed).
    Fatal(String),
}

/// Keeps a change stream alive; dropping it ends the stream.
pub struct Subscription {
    _guard: Box<dyn Send>,
}

impl Subscription {
    pub fn new(guard: impl Send + 'static) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

/// Directory change notification, swappable without touching processing.
pub trait ChangeSource: Send + Sync {
    /// Start streaming creation signals for the top level of `dir` into `sink`.
    fn subscribe(&self, dir: &Path, sink: Sender<WatchSignal>) -> Result<Subscription, IngestError>;
}

/// `notify`-backed change source.
#[derive(Debug, Clone, Copy)]
pub struct NotifySource {
    backend: WatchBackendKind,
    poll_interval: Duration,
}

impl NotifySource {
    pub fn new(backend: WatchBackendKind, poll_interval: Duration) -> Self {
        Self {
            backend,
            poll_interval,
        }
    }
}

/// Paths of a notify event that count as new files.
fn creation_paths(event: &Event) -> &[PathBuf] {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => &[],
        EventKind::Create(_) => event.paths.as_slice(),
        _ => &[],
    }
}

fn classify_error(err: &notify::Error) -> WatchSignal {
    match err.kind {
        notify::ErrorKind::PathNotFound | notify::ErrorKind::WatchNotFound => {
            WatchSignal::Fatal(err.to_string())
        }
        _ => WatchSignal::Error(err.to_string()),
    }
}

fn forward_to(sink: Sender<WatchSignal>) -> impl FnMut(notify::Result<Event>) + Send + 'static {
    move |res| match res {
        Ok(event) => {
            for p in creation_paths(&event) {
                let _ = sink.send(WatchSignal::Created(p.clone()));
            }
        }
        Err(e) => {
            let _ = sink.send(classify_error(&e));
        }
    }
}

impl ChangeSource for NotifySource {
    fn subscribe(&self, dir: &Path, sink: Sender<WatchSignal>) -> Result<Subscription, IngestError> {
        let watch_err = |e: notify::Error| IngestError::Watch(format!("{}: {e}", dir.display()));
        let config = notify::Config::default().with_poll_interval(self.poll_interval);
        match self.backend {
            WatchBackendKind::Native => {
                let mut w = RecommendedWatcher::new(forward_to(sink), config).map_err(watch_err)?;
                w.watch(dir, RecursiveMode::NonRecursive).map_err(watch_err)?;
                Ok(Subscription::new(w))
            }
            WatchBackendKind::Poll => {
                let mut w = PollWatcher::new(forward_to(sink), config).map_err(watch_err)?;
                w.watch(dir, RecursiveMode::NonRecursive).map_err(watch_err)?;
                Ok(Subscription::new(w))
            }
        }
    }
}

/// Receives every processing outcome (statistics, tests).
pub type OutcomeSink = Arc<dyn Fn(&Path, &ProcessingOutcome) + Send + Sync>;

/// Settings for a `DirectoryWatcher`.
#[derive(Clone)]
pub struct WatchSettings {
    pub dir: PathBuf,
    pub debounce: Duration,
    pub scan_existing: bool,
}

struct Running {
    token: StopToken,
    alive: Arc<AtomicBool>,
    dispatcher: JoinHandle<()>,
}

pub struct DirectoryWatcher {
    settings: WatchSettings,
    source: Arc<dyn ChangeSource>,
    processor: Arc<FileProcessor>,
    notifier: Arc<dyn Notifier>,
    on_outcome: OutcomeSink,
    running: Option<Running>,
}

impl DirectoryWatcher {
    pub fn new(
        settings: WatchSettings,
        source: Arc<dyn ChangeSource>,
        processor: Arc<FileProcessor>,
        notifier: Arc<dyn Notifier>,
        on_outcome: OutcomeSink,
    ) -> Self {
        Self {
            settings,
            source,
            processor,
            notifier,
            on_outcome,
            running: None,
        }
    }

    /// True while the dispatcher is accepting events.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| r.alive.load(Ordering::SeqCst))
    }

    /// Subscribe and start dispatching. A no-op if already running; a watcher
    /// that stopped itself after a fatal error is cleaned up and restarted.
    pub fn start(&mut self) -> Result<(), IngestError> {
        if self.is_running() {
            return Ok(());
        }
        self.stop();

        let (tx, rx) = mpsc::channel();
        let subscription = self.source.subscribe(&self.settings.dir, tx)?;

        let token = StopToken::new();
        let alive = Arc::new(AtomicBool::new(true));
        let dispatcher = Dispatcher {
            settings: self.settings.clone(),
            processor: Arc::clone(&self.processor),
            notifier: Arc::clone(&self.notifier),
            on_outcome: Arc::clone(&self.on_outcome),
            token: token.clone(),
            pending: Arc::new(Mutex::new(HashSet::new())),
            workers: Vec::new(),
            seq: AtomicU64::new(0),
        };
        let thread_alive = Arc::clone(&alive);
        let handle = thread::Builder::new()
            .name("watch-dispatch".into())
            .spawn(move || {
                dispatcher.run(rx, subscription);
                thread_alive.store(false, Ordering::SeqCst);
            })
            .map_err(|e| IngestError::Watch(format!("spawn dispatcher: {e}")))?;

        info!(dir = %self.settings.dir.display(), debounce_ms = self.settings.debounce.as_millis() as u64, "Started folder monitoring");
        self.running = Some(Running {
            token,
            alive,
            dispatcher: handle,
        });
        Ok(())
    }

    /// Stop accepting events and wait for in-progress files to finish.
    /// Safe without a prior `start` and safe to repeat.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.token.cancel();
        if running.dispatcher.join().is_err() {
            error!("Watch dispatcher panicked");
        }
        info!(dir = %self.settings.dir.display(), "Stopped folder monitoring");
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Dispatcher {
    settings: WatchSettings,
    processor: Arc<FileProcessor>,
    notifier: Arc<dyn Notifier>,
    on_outcome: OutcomeSink,
    token: StopToken,
    /// Paths detected and not yet finished; a second event for one is ignored.
    pending: Arc<Mutex<HashSet<PathBuf>>>,
    workers: Vec<JoinHandle<()>>,
    seq: AtomicU64,
}

impl Dispatcher {
    fn run(mut self, rx: Receiver<WatchSignal>, subscription: Subscription) {
        if self.settings.scan_existing {
            self.scan_backlog();
        }

        loop {
            if self.token.is_cancelled() {
                break;
            }
            match rx.recv_timeout(TICK) {
                Ok(WatchSignal::Created(path)) => self.dispatch(path),
                Ok(WatchSignal::Error(msg)) => warn!(error = %msg, "Folder watch reported an error"),
                Ok(WatchSignal::Fatal(msg)) => {
                    error!(dir = %self.settings.dir.display(), error = %msg, "Folder watch failed; monitoring stopped");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.workers.retain(|h| !h.is_finished());
                    if !self.settings.dir.is_dir() {
                        error!(dir = %self.settings.dir.display(), "Watched folder disappeared; monitoring stopped");
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    error!(dir = %self.settings.dir.display(), "Folder watch stream closed; monitoring stopped");
                    break;
                }
            }
        }

        drop(subscription);
        let in_progress = self.workers.len();
        if in_progress > 0 {
            debug!(in_progress, "Waiting for in-progress files");
        }
        for h in self.workers.drain(..) {
            if h.join().is_err() {
                error!("File worker panicked");
            }
        }
    }

    /// Hand files that arrived while we were not watching to the workers.
    fn scan_backlog(&mut self) {
        let rd = match fs::read_dir(&self.settings.dir) {
            Ok(rd) => rd,
            Err(e) => {
                warn!(dir = %self.settings.dir.display(), error = %e, "Could not scan input folder");
                return;
            }
        };
        let mut backlog: Vec<PathBuf> = rd
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .map(|e| e.path())
            .collect();
        backlog.sort();
        if !backlog.is_empty() {
            info!(count = backlog.len(), "Processing files already in the input folder");
        }
        for path in backlog {
            self.dispatch(path);
        }
    }

    fn dispatch(&mut self, path: PathBuf) {
        let own_temp = path
            .file_name()
            .is_some_and(|n| is_internal_name(&n.to_string_lossy()));
        if own_temp || path.is_dir() {
            return;
        }
        // Our own in-place rename, seen before the file leaves the folder.
        if sequence_of(&path).is_some() {
            debug!(path = %path.display(), "Already numbered; not processing again");
            return;
        }
        {
            let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
            if !pending.insert(path.clone()) {
                debug!(path = %path.display(), "Already pending; ignoring repeated event");
                return;
            }
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(path = %path.display(), "Detected new file");
        if let Err(e) = self.notifier.notify(
            "New file detected",
            &format!("File '{name}' has been added to the input folder"),
            NOTIFY_DURATION,
        ) {
            warn!(error = %format!("{e:#}"), "Notification failed");
        }

        let detected_at = Instant::now();
        let debounce = self.settings.debounce;
        let token = self.token.clone();
        let processor = Arc::clone(&self.processor);
        let on_outcome = Arc::clone(&self.on_outcome);
        let pending = Arc::clone(&self.pending);
        let n = self.seq.fetch_add(1, Ordering::Relaxed);

        let worker_path = path.clone();
        let spawned = thread::Builder::new()
            .name(format!("ingest-{n}"))
            .spawn(move || {
                let path = worker_path;
                if token.wait_timeout(debounce) {
                    info!(path = %path.display(), "Shutdown during settle delay; file left for next start");
                } else {
                    let outcome = processor.process(&path);
                    debug!(path = %path.display(), outcome = %outcome, waited_ms = detected_at.elapsed().as_millis() as u64, "File handled");
                    on_outcome(&path, &outcome);
                }
                pending.lock().unwrap_or_else(|p| p.into_inner()).remove(&path);
            });
        match spawned {
            Ok(h) => self.workers.push(h),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Could not start file worker");
                self.pending.lock().unwrap_or_else(|p| p.into_inner()).remove(&path);
            }
        }
    }
}
