//! Elapsed-time display for a running session.

use chrono::{DateTime, Utc};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Format the span from `start` to `now` as `HH:MM:SS`
///
/// Hours are not wrapped at 24. A `now` before `start` renders as zero.
pub fn format_elapsed(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total = (now - start).num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// A cancellable once-per-interval elapsed-time callback
///
/// The ticker only ever sees the session's start time. Dropping it stops the
/// thread.
pub struct ElapsedTicker {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ElapsedTicker {
    /// Call `on_tick` with the formatted elapsed time every `interval`
    ///
    /// The first tick fires immediately.
    pub fn start<F>(start_time: DateTime<Utc>, interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(String) + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = std::thread::spawn(move || {
            loop {
                on_tick(format_elapsed(start_time, Utc::now()));
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    // Stop requested, or the ticker was dropped
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!("Elapsed ticker stopped");
        });

        tracing::debug!("Elapsed ticker started ({:?} interval)", interval);
        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Whether the ticker thread is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop ticking and wait for the thread to exit
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Elapsed ticker callback panicked");
            }
        }
    }
}

impl Drop for ElapsedTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
