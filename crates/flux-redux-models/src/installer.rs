//! Installer trait and cancellation support.
//!
//! The installer's download and import machinery is an external
//! collaborator; this module only defines the seam the resolver drives. A
//! heuristic import infers how to fetch and register a model from a source
//! descriptor plus an override record, without a fully specified config.

use async_trait::async_trait;
use flux_redux_core::{ConfigOverrides, InstallJob, ModelSource, ReduxResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Terminal state of a bounded install wait.
///
/// A timeout is a signal, not an error, at this layer: the resolver
/// re-queries the registry either way and decides what to raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The job finished before the deadline.
    Completed,
    /// The deadline elapsed with the job still running.
    TimedOut,
}

/// Model-install collaborator.
#[async_trait]
pub trait ModelInstaller: Send + Sync {
    /// Submit a heuristic-import job for `source`, pinning the registered
    /// name and kind through `overrides`. Returns immediately with the job
    /// handle.
    async fn heuristic_import(
        &self,
        source: &ModelSource,
        overrides: &ConfigOverrides,
    ) -> ReduxResult<InstallJob>;

    /// Block until the job completes or `timeout` elapses.
    async fn wait_for_job(&self, job: &InstallJob, timeout: Duration)
        -> ReduxResult<InstallOutcome>;
}

#[derive(Debug, Default)]
struct CancelInner {
    notify: Notify,
    cancelled: AtomicBool,
}

/// Clonable cancellation token for the install wait.
///
/// The reference behavior has no cancellation path at all; the token closes
/// that responsiveness gap. A token that is never fired reproduces the
/// original blocking semantics exactly.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the token, waking every pending [`cancelled`](Self::cancelled) wait.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether the token has been fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once the token fires. Never resolves for an unfired token.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            // Re-check between registration and await so a cancel in the gap
            // is not lost.
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
