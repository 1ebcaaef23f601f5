//! Cancellable periodic scheduler.
//! Runs a task on its own thread every `interval` until the StopToken is
//! cancelled. Cancellation interrupts the wait, so shutdown does not have to
//! sit out the rest of the interval; a task already running finishes first.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error};

use crate::shutdown::StopToken;

pub struct Periodic {
    name: String,
    token: StopToken,
    handle: Option<JoinHandle<()>>,
}

impl Periodic {
    /// Spawn `task`, running it immediately and then every `interval`.
    pub fn spawn<F>(name: &str, interval: Duration, token: StopToken, mut task: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let loop_token = token.clone();
        let thread_name = name.to_string();
        let handle = thread::Builder::new().name(thread_name.clone()).spawn(move || {
            debug!(task = %thread_name, interval_ms = interval.as_millis() as u64, "Periodic task started");
            while !loop_token.is_cancelled() {
                task();
                if loop_token.wait_timeout(interval) {
                    break;
                }
            }
            debug!(task = %thread_name, "Periodic task stopped");
        })?;
        Ok(Self {
            name: name.to_string(),
            token,
            handle: Some(handle),
        })
    }

    /// Cancel and wait for the current iteration to finish (idempotent).
    pub fn stop(&mut self) {
        self.token.cancel();
        if let Some(h) = self.handle.take()
            && h.join().is_err()
        {
            error!(task = %self.name, "Periodic task panicked");
        }
    }
}

impl Drop for Periodic {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[test]
    fn runs_repeatedly_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let mut p = Periodic::spawn("test-tick", Duration::from_millis(10), StopToken::new(), move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        thread::sleep(Duration::from_millis(100));
        p.stop();
        let seen = count.load(Ordering::SeqCst);
        assert!(seen >= 2, "ran {seen} times");
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), seen, "no ticks after stop");
        assert!(p.handle.is_none());
    }

    #[test]
    fn stop_does_not_wait_for_interval() {
        let mut p = Periodic::spawn("test-slow", Duration::from_secs(60), StopToken::new(), || {}).unwrap();
        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        p.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        p.stop();
    }
}
