//! Centralized, idempotent "stop all" for the session's periodic tasks.
//!
//! Every completion path (buffer full, operator abort, session teardown) calls
//! [`StopSignal::stop_all`]. The first call records the reason and wakes every task
//! waiting on [`StopSignal::stopped`]; later calls are no-ops, so it is safe for the
//! scheduler, the controller and a Ctrl-C handler to race on it.

use std::sync::Arc;
use tokio::sync::watch;

/// Why a session stopped recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every pre-allocated sample slot was written.
    BufferFull,
    /// Someone outside the acquisition loop asked to stop.
    External,
}

/// Shared stop flag. Cloning gives another handle to the same signal.
#[derive(Clone, Debug)]
pub struct StopSignal {
    tx: Arc<watch::Sender<Option<StopReason>>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Stop every task observing this signal.
    ///
    /// Returns `true` only for the call that actually triggered the stop.
    pub fn stop_all(&self, reason: StopReason) -> bool {
        let triggered = self.tx.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(reason);
                true
            } else {
                false
            }
        });
        if triggered {
            tracing::info!(?reason, "stopping all acquisition tasks");
        } else {
            tracing::trace!(?reason, "stop requested again, already stopped");
        }
        triggered
    }

    /// The reason recorded by the first `stop_all`, if any.
    pub fn reason(&self) -> Option<StopReason> {
        *self.tx.borrow()
    }

    /// Whether any component has called `stop_all`.
    pub fn is_stopped(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolve once a stop has been requested.
    pub async fn stopped(&self) -> StopReason {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let state = rx.wait_for(Option::is_some).await.map(|state| *state);
        state.ok().flatten().unwrap_or(StopReason::External)
    }
}
