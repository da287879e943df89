//! Background reaper for pairing sessions.
//!
//! Runs [`PairingEngine::reap`] on a fixed tick until cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::engine::PairingEngine;

/// Owned handle to a running reaper task.
#[derive(Debug)]
pub struct ReaperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Start the reaper on the engine's configured interval.
    pub fn spawn(engine: Arc<PairingEngine>) -> Self {
        let interval = engine.config().reaper_interval();
        Self::spawn_with_interval(engine, interval)
    }

    pub fn spawn_with_interval(engine: Arc<PairingEngine>, every: Duration) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(engine, every, cancel.clone()));
        Self { cancel, task }
    }

    /// Cancel the task and wait for it to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Reaper task ended abnormally");
        }
    }
}

async fn run(engine: Arc<PairingEngine>, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Session reaper started");

    let mut interval = tokio::time::interval(every);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session reaper stopping");
                break;
            }
            _ = interval.tick() => {
                engine.reap().await;
            }
        }
    }
}
