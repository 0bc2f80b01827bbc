use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use crate::{ConcurrentError, Signal};

/// Counts published by the aggregator. Only the aggregator thread writes them;
/// anyone holding the `Arc` may read them at any time.
#[derive(Debug, Default)]
pub(crate) struct Progress {
    started: AtomicU64,
    failed: AtomicU64,
    completed: AtomicU64,
}

impl Progress {
    pub(crate) fn counts(&self) -> Counts {
        Counts {
            started: self.started.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            completed: self.completed.load(Ordering::Acquire),
        }
    }
}

/// Point-in-time view of the run counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub started: u64,
    pub failed: u64,
    pub completed: u64,
}

/// Final state of a run: counts plus every recorded error, in the order received.
#[derive(Debug, Default)]
pub struct RunCounters {
    pub started: u64,
    pub failed: u64,
    pub completed: u64,
    pub errors: Vec<ConcurrentError>,
}

impl RunCounters {
    pub fn counts(&self) -> Counts {
        Counts {
            started: self.started,
            failed: self.failed,
            completed: self.completed,
        }
    }
}

/// Drains the signal channel and applies every signal to the counters.
pub(crate) struct Aggregator {
    progress: Arc<Progress>,
    errors: Vec<ConcurrentError>,
}

impl Aggregator {
    pub(crate) fn new(progress: Arc<Progress>) -> Self {
        Self {
            progress,
            errors: Vec::new(),
        }
    }

    /// Consume signals until every sender has been dropped.
    pub(crate) fn run(mut self, rx: Receiver<Signal>) -> RunCounters {
        for signal in rx {
            self.apply(signal);
        }
        let counts = self.progress.counts();
        log::debug!(
            "aggregator done: {} started, {} failed, {} completed",
            counts.started,
            counts.failed,
            counts.completed,
        );
        RunCounters {
            started: counts.started,
            failed: counts.failed,
            completed: counts.completed,
            errors: self.errors,
        }
    }

    fn apply(&mut self, signal: Signal) {
        match signal {
            Signal::Started => {
                self.progress.started.fetch_add(1, Ordering::Release);
            }
            Signal::Failed => {
                self.progress.failed.fetch_add(1, Ordering::Release);
            }
            Signal::Completed => {
                self.progress.completed.fetch_add(1, Ordering::Release);
            }
            Signal::Error(error) => {
                log::warn!("{error}");
                self.errors.push(error);
            }
        }
    }
}
