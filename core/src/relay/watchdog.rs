//! Progress watchdog for long-running remote searches

use crate::session::{AccessMode, Session};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How a watchdog finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Stopped by its owner
    Stopped,
    /// The output file went away; the search is considered aborted
    Vanished,
    /// The file could not be inspected
    Failed(String),
}

/// Polls the size of a search's output file on a fixed interval.
///
/// It only reports; it never cancels the remote command.
pub struct Watchdog {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<WatchOutcome>,
    progress: watch::Receiver<u64>,
}

impl Watchdog {
    pub fn spawn(session: Arc<dyn Session>, path: String, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (progress_tx, progress_rx) = watch::channel(0u64);
        let handle = tokio::spawn(watch_file(session, path, interval, stop_rx, progress_tx));
        Self {
            stop: Some(stop_tx),
            handle,
            progress: progress_rx,
        }
    }

    /// Latest observed size of the output file
    pub fn progress(&self) -> watch::Receiver<u64> {
        self.progress.clone()
    }

    /// Signal the task and wait at most `join_timeout` for it
    pub async fn stop(mut self, join_timeout: Duration) -> Option<WatchOutcome> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match tokio::time::timeout(join_timeout, &mut self.handle).await {
            Ok(Ok(outcome)) => Some(outcome),
            Ok(Err(e)) => {
                warn!(error = %e, "watchdog task failed");
                None
            }
            Err(_) => {
                warn!(
                    join_timeout_ms = join_timeout.as_millis() as u64,
                    "watchdog did not stop in time"
                );
                self.handle.abort();
                None
            }
        }
    }
}

async fn watch_file(
    session: Arc<dyn Session>,
    path: String,
    interval: Duration,
    mut stop: oneshot::Receiver<()>,
    progress: watch::Sender<u64>,
) -> WatchOutcome {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_size = 0u64;

    loop {
        tokio::select! {
            _ = &mut stop => {
                debug!(path = %path, bytes = last_size, "watchdog stopped");
                return WatchOutcome::Stopped;
            }
            _ = ticker.tick() => {
                match session.exists(&path, AccessMode::ReadVolatile).await {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(path = %path, "search output disappeared; treating search as aborted");
                        return WatchOutcome::Vanished;
                    }
                    Err(e) => return WatchOutcome::Failed(e.to_string()),
                }
                match session.length(&path, AccessMode::ReadVolatile).await {
                    Ok(size) if size > last_size => {
                        info!(path = %path, bytes = size, "search in progress");
                        last_size = size;
                        progress.send_replace(size);
                    }
                    Ok(size) => {
                        warn!(path = %path, bytes = size, "search output has not grown");
                    }
                    Err(e) => return WatchOutcome::Failed(e.to_string()),
                }
            }
        }
    }
}
