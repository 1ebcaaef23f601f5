//! User notifications.
//!
//! The agent announces newly observed files through a `Notifier`. Delivery is
//! best-effort: callers log a failure and carry on, it never changes the
//! outcome of processing.

use anyhow::Result;
use std::time::Duration;
use tracing::info;

/// How long a notification stays on screen, for notifiers that display one.
pub const NOTIFY_DURATION: Duration = Duration::from_secs(5);

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str, duration: Duration) -> Result<()>;
}

/// Default notifier: writes the notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str, duration: Duration) -> Result<()> {
        info!(title, duration_secs = duration.as_secs(), "{message}");
        Ok(())
    }
}

/// Discards everything (headless hosts, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _title: &str, _message: &str, _duration: Duration) -> Result<()> {
        Ok(())
    }
}
