//! Engine status, asynchronous reports and per-session counters.

use crossbeam_channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// What the engine is doing, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EngineStatus {
    #[default]
    Idle,
    Running,
    /// The input port faulted. No session is listening.
    Error(String),
}

impl EngineStatus {
    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self, EngineStatus::Running)
    }
}

/// Problems raised by the dispatch thread after `start` returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineReport {
    /// A bound action failed (or panicked). Dispatch continues.
    ActionFailed { action_id: String, reason: String },
    /// The input port closed without a stop request. The session ended.
    PortClosed { port: String, reason: String },
}

#[derive(Debug, Clone)]
pub(crate) struct ReportSender {
    sender: Sender<EngineReport>,
}

impl ReportSender {
    pub(crate) fn new(sender: Sender<EngineReport>) -> Self {
        Self { sender }
    }

    /// Never blocks: a full queue drops the report.
    pub(crate) fn send(&self, report: EngineReport) {
        match self.sender.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(report)) => {
                debug!(?report, "report queue full, dropping report");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Snapshot of one session's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Messages taken off the input queue.
    pub received: u64,
    pub malformed: u64,
    /// Classified as [`SemanticEvent::Ignored`](midibind_core::SemanticEvent::Ignored).
    pub ignored: u64,
    /// Classified, but no action is bound.
    pub unbound: u64,
    pub invoked: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) received: AtomicU64,
    pub(crate) malformed: AtomicU64,
    pub(crate) ignored: AtomicU64,
    pub(crate) unbound: AtomicU64,
    pub(crate) invoked: AtomicU64,
    pub(crate) failed: AtomicU64,
}

impl StatsCounters {
    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            received: self.received.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            unbound: self.unbound.load(Ordering::Relaxed),
            invoked: self.invoked.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
