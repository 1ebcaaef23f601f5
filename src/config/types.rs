//! Core configuration types.
//! - Folders holds the four directories the agent works with.
//! - Options holds the tunables with sensible defaults.
//! - ConfigRecord is the persisted document: folders, options and the yearly counters.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::{
    DEBOUNCE_DEFAULT, MOVE_TIMEOUT_DEFAULT, POLL_INTERVAL_DEFAULT, SWEEP_INTERVAL_DEFAULT,
};

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// The four working directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folders {
    /// Watched drop folder
    pub input: PathBuf,
    /// Final (possibly network-mounted) destination
    pub destination: PathBuf,
    /// Durable staging area for undeliverable files
    pub waiting: PathBuf,
    /// Where files land when processing fails
    pub error: PathBuf,
}

impl Folders {
    pub fn new(
        input: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        waiting: impl Into<PathBuf>,
        error: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            destination: destination.into(),
            waiting: waiting.into(),
            error: error.into(),
        }
    }

    /// (label, path) pairs in a stable order, for validation and logs.
    pub fn labelled(&self) -> [(&'static str, &PathBuf); 4] {
        [
            ("input_folder", &self.input),
            ("destination_folder", &self.destination),
            ("waiting_folder", &self.waiting),
            ("error_folder", &self.error),
        ]
    }
}

/// Which change-notification mechanism watches the input folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchBackendKind {
    /// OS-native notifications (inotify, FSEvents, ReadDirectoryChangesW)
    #[default]
    Native,
    /// Periodic directory scans; for shares where native events are unreliable
    Poll,
}

impl WatchBackendKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "os" => Some(WatchBackendKind::Native),
            "poll" | "polling" => Some(WatchBackendKind::Poll),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WatchBackendKind::Native => "native",
            WatchBackendKind::Poll => "poll",
        }
    }
}

/// Runtime tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Lower-case extensions (without the dot) accepted for processing
    pub accepted_extensions: Vec<String>,
    /// Settle delay between a creation event and processing
    pub debounce: Duration,
    /// Interval between retry sweeps of the waiting folder
    pub sweep_interval: Duration,
    /// How long a sweep waits for a single move before moving on
    pub move_timeout: Duration,
    /// Process files already sitting in the input folder at start
    pub scan_existing_on_start: bool,
    pub watch_backend: WatchBackendKind,
    /// Scan interval for the polling backend
    pub poll_interval: Duration,
    pub log_level: Option<LogLevel>,
    pub log_file: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            accepted_extensions: vec!["pdf".to_string()],
            debounce: DEBOUNCE_DEFAULT,
            sweep_interval: SWEEP_INTERVAL_DEFAULT,
            move_timeout: MOVE_TIMEOUT_DEFAULT,
            scan_existing_on_start: true,
            watch_backend: WatchBackendKind::Native,
            poll_interval: POLL_INTERVAL_DEFAULT,
            log_level: None,
            log_file: None,
        }
    }
}

/// The persisted configuration document.
///
/// Counters are keyed by calendar year and only reachable through
/// [`crate::sequence::SequenceStore`] once the service is running.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRecord {
    pub folders: Folders,
    pub options: Options,
    pub(crate) counters: BTreeMap<i32, u64>,
}

impl ConfigRecord {
    /// A record with default options and no counters.
    pub fn new(folders: Folders) -> Self {
        Self {
            folders,
            options: Options::default(),
            counters: BTreeMap::new(),
        }
    }

    /// Seed a counter (for fixtures and migrations; not used at runtime).
    pub fn with_counter(mut self, year: i32, value: u64) -> Self {
        self.counters.insert(year, value);
        self
    }

    /// Last value allocated for `year` (0 when none).
    pub fn counter(&self, year: i32) -> u64 {
        self.counters.get(&year).copied().unwrap_or(0)
    }
}
