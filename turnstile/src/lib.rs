/// Errors recorded per unit, and errors from the pool itself
mod error;
pub use error::{ConcurrentError, Error};

/// The one-way outcome channel given to each phase
mod signals;
pub use signals::{Signal, Signals};

/// Single owner of the run counters
mod aggregator;
pub use aggregator::{Counts, RunCounters};

/// Worker pool
mod manager;
pub use manager::{run_lifecycle, Manager};

/// A unit of work that the pool carries through Prepare, Work, Monitor and Cleanup.
///
/// Phases report outcomes only through `signals`; nothing is returned.
/// The pool moves on to the next phase unless the previous one recorded a failure.
/// Every unit must eventually signal completion exactly once, either from `cleanup`
/// or through [`Signals::record_failure`]; otherwise the run never finishes.
pub trait Scalable: Send {
    /// Identifier used in logs and error records.
    fn id(&self) -> &str;

    /// Signal that the unit has started, and set up everything `work` needs.
    fn prepare(&mut self, signals: &Signals);

    /// Do the actual work.
    fn work(&mut self, signals: &Signals);

    /// Wait on work that continues outside this process.
    /// Nothing to do for units whose `work` phase finishes synchronously.
    fn monitor(&mut self, _signals: &Signals) {}

    /// Tidy up and signal completion.
    fn cleanup(&mut self, signals: &Signals);
}

/// Where a unit stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Preparing,
    PrepareFailed,
    Prepared,
    Working,
    WorkFailed,
    Worked,
    Monitoring,
    CleaningUp,
    CompletedSuccess,
    CompletedFailure,
}
