//! Background sweep of expired stream URLs
//!
//! Runs [`StreamUrlCache::sweep`](crate::cache::StreamUrlCache::sweep) on a
//! fixed tokio interval so tracks that were resolved once and never played
//! again do not accumulate. The task belongs to a [`SweepHandle`]: it stops on
//! `shutdown` and is aborted when the handle is dropped.

use std::sync::PoisonError;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedStreamUrlCache;

/// Default time between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Messages sent from the sweep task to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepMessage {
    /// A sweep finished
    Swept {
        /// Entries removed by this sweep
        removed: usize,
        /// Entries still stored afterwards
        remaining: usize,
    },
    /// The task exited after a shutdown request
    Stopped,
}

/// Configuration for the sweep task
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Interval between sweeps
    pub interval: Duration,
    /// Whether the periodic sweep runs at all
    pub enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
            enabled: true,
        }
    }
}

/// Handle owning the background sweep task
pub struct SweepHandle {
    /// Channel for receiving sweep reports
    pub receiver: mpsc::Receiver<SweepMessage>,
    shutdown_tx: mpsc::Sender<()>,
    sweep_now_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// Spawns the sweep task for `cache`
    ///
    /// Must be called from within a tokio runtime. When `config.enabled` is
    /// false no task is started and the receiver is already closed.
    pub fn spawn(cache: SharedStreamUrlCache, config: SweepConfig) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (sweep_now_tx, mut sweep_now_rx) = mpsc::channel::<()>(1);

        let task = if config.enabled {
            let period = config.interval;
            info!(interval_secs = period.as_secs(), "stream url sweeper started");

            Some(tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                // Skip the first tick (immediate)
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => {}
                        Some(()) = sweep_now_rx.recv() => {}
                        _ = shutdown_rx.recv() => {
                            let _ = msg_tx.try_send(SweepMessage::Stopped);
                            break;
                        }
                    }

                    let (removed, remaining) = {
                        let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
                        let removed = cache.sweep();
                        (removed, cache.len())
                    };
                    debug!(removed, remaining, "stream url sweep finished");

                    // A full channel means nobody is listening; keep sweeping anyway
                    let _ = msg_tx.try_send(SweepMessage::Swept { removed, remaining });
                }

                info!("stream url sweeper stopped");
            }))
        } else {
            None
        };

        Self {
            receiver: msg_rx,
            shutdown_tx,
            sweep_now_tx,
            task,
        }
    }

    /// Whether a sweep task was started and has not exited
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Requests a sweep without waiting for the next tick
    pub async fn request_sweep(&self) {
        let _ = self.sweep_now_tx.send(()).await;
    }

    /// Stops the sweep task and waits for it to exit
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Checks for a pending sweep report without blocking
///
/// # Returns
/// * `Some(SweepMessage)` if a message was available
/// * `None` if no messages are pending
pub fn try_recv(handle: &mut SweepHandle) -> Option<SweepMessage> {
    handle.receiver.try_recv().ok()
}
