use std::fmt;

/// A failure recorded for one unit. Never modified once created.
#[derive(Debug)]
pub struct ConcurrentError {
    run_identifier: String,
    cause: anyhow::Error,
    notes: String,
}

impl ConcurrentError {
    pub fn new(
        run_identifier: impl Into<String>,
        cause: impl Into<anyhow::Error>,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            run_identifier: run_identifier.into(),
            cause: cause.into(),
            notes: notes.into(),
        }
    }

    /// Identifier of the unit that failed.
    pub fn run_identifier(&self) -> &str {
        &self.run_identifier
    }

    /// The underlying error.
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }

    /// Human-readable description of what was being attempted.
    pub fn notes(&self) -> &str {
        &self.notes
    }
}

impl fmt::Display for ConcurrentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({:#})", self.run_identifier, self.notes, self.cause)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Worker pool needs at least one worker")]
    NoWorkers,
    #[error("Worker pool has already been started")]
    AlreadyStarted,
    #[error("Worker pool has not been started")]
    NotStarted,
    #[error("Failed to spawn {0} thread")]
    Spawn(&'static str, #[source] std::io::Error),
    #[error("A worker thread panicked")]
    WorkerPanicked,
    #[error("The aggregator thread panicked")]
    AggregatorPanicked,
}
