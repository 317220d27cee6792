//! Progress reporting and cooperative cancellation for a processing pass.
//!
//! Stages call [`PassControl::checkpoint`] once per record. Every
//! [`PROGRESS_INTERVAL`] records (and on the last one) the current position is
//! published on a `tokio::sync::watch` channel; observers only ever see the
//! latest event, so a slow consumer never stalls processing.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

/// Records processed between progress events.
pub const PROGRESS_INTERVAL: usize = 10;

/// Stage currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Starting,
    Filtering,
    Replacing,
    LookingUp,
    Reconciling,
    RepairingAnchors,
    Complete,
}

impl Phase {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Filtering => "removing invisible links",
            Self::Replacing => "applying replacement rules",
            Self::LookingUp => "looking up documents",
            Self::Reconciling => "reconciling titles",
            Self::RepairingAnchors => "repairing internal links",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of pass progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub current: usize,
    pub total: usize,
    /// `current / total` in percent, 100 when `total` is zero.
    pub percent: u8,
}

impl ProgressEvent {
    #[must_use]
    pub fn new(phase: Phase, current: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100
        } else {
            u8::try_from(current.min(total) * 100 / total).unwrap_or(100)
        };
        Self {
            phase,
            current,
            total,
            percent,
        }
    }
}

/// Cancellation flag plus optional progress sender, shared by all stages.
#[derive(Clone, Default)]
pub struct PassControl {
    cancel: Arc<AtomicBool>,
    progress: Option<Arc<watch::Sender<ProgressEvent>>>,
}

impl fmt::Debug for PassControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassControl")
            .field("cancelled", &self.is_cancelled())
            .field("reports_progress", &self.progress.is_some())
            .finish()
    }
}

impl PassControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shares an externally owned cancellation flag (e.g. set by Ctrl-C).
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Creates a progress channel and returns its receiving side.
    #[must_use]
    pub fn with_progress_channel(mut self) -> (Self, watch::Receiver<ProgressEvent>) {
        let (tx, rx) = watch::channel(ProgressEvent::default());
        self.progress = Some(Arc::new(tx));
        (self, rx)
    }

    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Publishes an event unconditionally.
    pub fn report(&self, phase: Phase, current: usize, total: usize) {
        if let Some(tx) = &self.progress {
            tx.send_replace(ProgressEvent::new(phase, current, total));
        }
    }

    /// Marks record `index` (0-based) of `total` as reached.
    ///
    /// Returns false when the pass has been cancelled and the stage must stop.
    pub fn checkpoint(&self, phase: Phase, index: usize, total: usize) -> bool {
        let processed = index + 1;
        if processed % PROGRESS_INTERVAL == 0 || processed == total {
            self.report(phase, processed, total);
        }
        !self.is_cancelled()
    }
}
