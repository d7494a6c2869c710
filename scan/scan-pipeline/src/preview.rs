//! Cancellable preview reconstruction jobs.
//!
//! A preview runs a low-resolution reconstruction on a worker thread while
//! acquisition continues. Cancellation is cooperative: the worker checks a
//! shared flag at stage boundaries and abandons its result instead of
//! sending it. Finalization cancels any in-flight preview without joining
//! the thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use scan_reconstruct::{reconstruct, ReconstructError, ReconstructParams, ReconstructReport};
use scan_types::{CloudSnapshot, SensorProfile};
use tracing::debug;

/// Shared cancellation flag. Cloning hands the same flag to the worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates an uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Terminal state of a preview job.
#[derive(Debug)]
pub enum PreviewOutcome {
    /// Reconstruction finished and was not cancelled.
    Completed(Box<ReconstructReport>),
    /// The job observed cancellation and abandoned its result.
    Cancelled,
    /// Reconstruction failed.
    Failed(ReconstructError),
}

/// A preview reconstruction running on a worker thread.
#[derive(Debug)]
pub struct PreviewJob {
    token: CancelToken,
    receiver: mpsc::Receiver<PreviewOutcome>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PreviewJob {
    /// Spawns a preview over `snapshot` with a fresh token.
    #[must_use]
    pub fn spawn(
        snapshot: CloudSnapshot,
        profile: SensorProfile,
        params: ReconstructParams,
    ) -> Self {
        Self::spawn_with_token(CancelToken::new(), snapshot, profile, params)
    }

    /// Spawns a preview controlled by an existing token.
    #[must_use]
    pub fn spawn_with_token(
        token: CancelToken,
        snapshot: CloudSnapshot,
        profile: SensorProfile,
        params: ReconstructParams,
    ) -> Self {
        let worker = token.clone();
        let (sender, receiver) = mpsc::channel();
        debug!(profile = profile.name, "preview job spawned");
        let handle = thread::spawn(move || {
            if worker.is_cancelled() {
                let _ = sender.send(PreviewOutcome::Cancelled);
                return;
            }
            let outcome = match reconstruct(&snapshot, &profile, &params) {
                _ if worker.is_cancelled() => PreviewOutcome::Cancelled,
                Ok(report) => PreviewOutcome::Completed(Box::new(report)),
                Err(e) => PreviewOutcome::Failed(e),
            };
            let _ = sender.send(outcome);
        });
        Self {
            token,
            receiver,
            handle: Some(handle),
        }
    }

    /// Requests cooperative cancellation without waiting.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Takes the outcome if the worker has finished, without blocking.
    pub fn try_take(&mut self) -> Option<PreviewOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => {
                self.join();
                Some(outcome)
            }
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => {
                self.join();
                Some(PreviewOutcome::Cancelled)
            }
        }
    }

    /// Blocks until the worker finishes and returns the outcome.
    pub fn wait(mut self) -> PreviewOutcome {
        let outcome = self
            .receiver
            .recv()
            .unwrap_or(PreviewOutcome::Cancelled);
        self.join();
        outcome
    }

    /// Cancels and detaches: the worker keeps running until its next
    /// cancellation check, but nobody waits for it.
    pub fn abandon(mut self) {
        self.token.cancel();
        self.handle = None;
        debug!("preview job abandoned");
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
