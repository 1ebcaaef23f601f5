//! Config module.
//! Provides configuration types, default paths, JSON loading/saving, and startup validation.

pub mod json;
pub mod paths;
pub mod types;
mod validate;

pub use json::{JsonDocument, load_config, read_document, write_document};
pub use paths::{default_config_path, default_log_path, resolve_config_path};
pub use types::{ConfigRecord, Folders, LogLevel, Options, WatchBackendKind};

/// Defaults shared across submodules.
pub const DEBOUNCE_DEFAULT: std::time::Duration = std::time::Duration::from_secs(5);
pub const SWEEP_INTERVAL_DEFAULT: std::time::Duration = std::time::Duration::from_secs(1);
pub const MOVE_TIMEOUT_DEFAULT: std::time::Duration = std::time::Duration::from_secs(30);
pub const POLL_INTERVAL_DEFAULT: std::time::Duration = std::time::Duration::from_secs(1);
/// Upper bound for every configured delay, interval and timeout.
pub const DURATION_MAX: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);
