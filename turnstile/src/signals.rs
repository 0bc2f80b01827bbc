use std::cell::Cell;
use std::sync::mpsc::Sender;

use crate::ConcurrentError;

/// One outcome report, sent from a unit to the aggregator.
#[derive(Debug)]
pub enum Signal {
    Started,
    Failed,
    Completed,
    Error(ConcurrentError),
}

/// Handle through which a single unit reports its outcomes.
///
/// Each unit gets its own `Signals`, so the pool can check whether the
/// phase that just ran recorded a failure. The counters themselves live
/// with the aggregator on the other end of the channel.
#[derive(Debug)]
pub struct Signals {
    tx: Sender<Signal>,
    started: Cell<bool>,
    failed: Cell<bool>,
    completed: Cell<bool>,
}

impl Signals {
    pub fn new(tx: Sender<Signal>) -> Self {
        Self {
            tx,
            started: Cell::new(false),
            failed: Cell::new(false),
            completed: Cell::new(false),
        }
    }

    pub fn started(&self) {
        self.started.set(true);
        self.send(Signal::Started);
    }

    /// Mark the unit failed. Callers must still signal completion;
    /// prefer [`Signals::record_failure`], which does both.
    pub fn failed(&self) {
        self.failed.set(true);
        self.send(Signal::Failed);
    }

    /// Mark the unit finished. Only the first call is counted.
    pub fn completed(&self) {
        if self.completed.replace(true) {
            log::warn!("unit signalled completion more than once; ignoring");
            return;
        }
        self.send(Signal::Completed);
    }

    pub fn error(&self, error: ConcurrentError) {
        self.send(Signal::Error(error));
    }

    /// Fail the unit, record why, and complete it.
    pub fn record_failure(
        &self,
        run_identifier: impl Into<String>,
        notes: impl Into<String>,
        cause: impl Into<anyhow::Error>,
    ) {
        self.failed();
        self.error(ConcurrentError::new(run_identifier, cause, notes));
        self.completed();
    }

    pub fn has_started(&self) -> bool {
        self.started.get()
    }

    pub fn has_failed(&self) -> bool {
        self.failed.get()
    }

    pub fn has_completed(&self) -> bool {
        self.completed.get()
    }

    fn send(&self, signal: Signal) {
        if let Err(e) = self.tx.send(signal) {
            log::error!("aggregator has shut down; dropped {:?}", e.0);
        }
    }
}
