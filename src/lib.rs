//! Core library for `pdf_exporter`.
//!
//! An unattended agent that watches an input folder, gives every accepted
//! document a persistent per-year sequence number, and relocates it to a
//! destination folder that may be temporarily unreachable. Files that cannot
//! be delivered wait in a durable queue and are retried; files that cannot be
//! processed end up in an error folder. No accepted file is ever deleted.
//!
//! Module layout:
//! - config: JSON configuration record, default paths and folder checks
//! - sequence: persistent yearly counters (`SequenceStore`)
//! - processor: validate, number, rename and relocate one file
//! - queue / resender: the waiting folder and its periodic retry sweep
//! - watcher: input-folder change notification and dispatch
//! - service: start/stop lifecycle tying everything together
//! - fs_ops / platform: safe moves, atomic writes and OS differences

pub mod cli;
pub mod config;
pub mod errors;
pub mod fs_ops;
pub mod notifier;
pub mod output;
pub mod platform;
pub mod processor;
pub mod queue;
pub mod resender;
pub mod scheduler;
pub mod sequence;
pub mod service;
pub mod shutdown;
pub mod watcher;

pub use config::{
    ConfigRecord, Folders, LogLevel, Options, WatchBackendKind, default_config_path, default_log_path,
    resolve_config_path,
};
pub use errors::IngestError;
pub use notifier::{LogNotifier, Notifier, NullNotifier};
pub use processor::{ErrorDisposition, FileProcessor, ProcessingOutcome, canonical_name};
pub use queue::WaitingQueue;
pub use resender::{RetryResender, SweepReport};
pub use sequence::SequenceStore;
pub use service::{Service, ServiceReport};
pub use shutdown::StopToken;
pub use watcher::{ChangeSource, DirectoryWatcher, NotifySource, Subscription, WatchSettings, WatchSignal};
