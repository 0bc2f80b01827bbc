use std::any::Any;
use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use anyhow::anyhow;

use crate::aggregator::{Aggregator, Progress};
use crate::{Counts, Error, RunCounters, Scalable, Signal, Signals, State};

type Unit = Box<dyn Scalable>;
type Queue = Arc<Mutex<VecDeque<Unit>>>;

/// Runs a set of units on a fixed number of worker threads.
///
/// Each worker claims the next unit from a shared queue and carries it through its
/// whole lifecycle before claiming another, so no unit is ever touched by two workers.
/// `execute` returns as soon as the threads are running; poll `is_complete`
/// and then call `wait` for the final counters.
pub struct Manager {
    queue: Queue,
    total: u64,
    concurrency: usize,
    progress: Arc<Progress>,
    running: Option<Running>,
}

struct Running {
    workers: Vec<JoinHandle<()>>,
    aggregator: JoinHandle<RunCounters>,
}

impl Manager {
    /// Create a new `Manager` that will run `units` on at most `concurrency` workers.
    pub fn new(units: Vec<Box<dyn Scalable>>, concurrency: usize) -> Result<Self, Error> {
        if concurrency == 0 {
            return Err(Error::NoWorkers);
        }
        Ok(Self {
            total: units.len() as u64,
            queue: Arc::new(Mutex::new(units.into())),
            concurrency,
            progress: Arc::new(Progress::default()),
            running: None,
        })
    }

    /// Number of units handed to this pool.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Start the aggregator and worker threads.
    ///
    /// If a worker thread can't be spawned, the error is returned but the threads
    /// that did start keep draining the queue; `wait` still joins them.
    pub fn execute(&mut self) -> Result<(), Error> {
        self.start(|name, worker| {
            thread::Builder::new()
                .name(name)
                .spawn(move || worker.run())
        })
    }

    fn start<F>(&mut self, mut spawn_worker: F) -> Result<(), Error>
    where
        F: FnMut(String, Worker) -> io::Result<JoinHandle<()>>,
    {
        if self.running.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let (tx, rx) = mpsc::channel();

        let aggregator = Aggregator::new(Arc::clone(&self.progress));
        let aggregator = thread::Builder::new()
            .name("aggregator".to_owned())
            .spawn(move || aggregator.run(rx))
            .map_err(|e| Error::Spawn("aggregator", e))?;

        let num_workers = self.concurrency.min(self.total as usize);
        log::debug!(
            "starting {num_workers} workers for {} units (limit {})",
            self.total,
            self.concurrency
        );

        let mut workers = Vec::with_capacity(num_workers);
        let mut spawned = Ok(());
        for id in 0..num_workers {
            let worker = Worker {
                id,
                queue: Arc::clone(&self.queue),
                tx: tx.clone(),
            };
            match spawn_worker(format!("worker-{id}"), worker) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    log::error!("could not spawn worker {id}: {e}");
                    spawned = Err(Error::Spawn("worker", e));
                    break;
                }
            }
        }

        // the aggregator stops once every worker has dropped its sender
        drop(tx);
        self.running = Some(Running {
            workers,
            aggregator,
        });
        spawned
    }

    /// True once every unit has signalled completion.
    pub fn is_complete(&self) -> bool {
        self.progress.counts().completed >= self.total
    }

    /// Current counts.
    pub fn counts(&self) -> Counts {
        self.progress.counts()
    }

    /// Join all threads and return the final counters.
    pub fn wait(mut self) -> Result<RunCounters, Error> {
        let running = self.running.take().ok_or(Error::NotStarted)?;
        for worker in running.workers {
            worker.join().map_err(|_| Error::WorkerPanicked)?;
        }
        running
            .aggregator
            .join()
            .map_err(|_| Error::AggregatorPanicked)
    }
}

struct Worker {
    id: usize,
    queue: Queue,
    tx: Sender<Signal>,
}

impl Worker {
    fn run(self) {
        log::debug!("worker {} started", self.id);
        while let Some(unit) = self.claim() {
            self.drive(unit);
        }
        log::debug!("worker {} found no more units; stopping", self.id);
    }

    fn claim(&self) -> Option<Unit> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn drive(&self, mut unit: Unit) {
        let signals = Signals::new(self.tx.clone());
        let id = unit.id().to_owned();
        log::debug!("worker {} claimed {id}", self.id);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            run_lifecycle(unit.as_mut(), &signals)
        }));

        match outcome {
            Ok(state) => {
                if !signals.has_completed() {
                    settle(
                        &signals,
                        &id,
                        "unit finished its lifecycle without signalling completion",
                        anyhow!("lifecycle ended in state {state:?}"),
                    );
                }
                log::debug!("worker {} finished {id}", self.id);
            }
            Err(payload) => {
                let msg = panic_message(&*payload);
                log::error!("{id} panicked: {msg}");
                if !signals.has_completed() {
                    settle(&signals, &id, "unit panicked", anyhow!(msg));
                }
            }
        }
    }
}

/// Carry `unit` through every phase, stopping early after a failed phase.
/// Returns the state the unit ended in.
pub fn run_lifecycle(unit: &mut dyn Scalable, signals: &Signals) -> State {
    let id = unit.id().to_owned();
    let transition = |state: State| {
        log::trace!("{id}: {state:?}");
        state
    };

    transition(State::Pending);
    transition(State::Preparing);
    unit.prepare(signals);
    if signals.has_failed() {
        transition(State::PrepareFailed);
        return transition(State::CompletedFailure);
    }
    transition(State::Prepared);

    transition(State::Working);
    unit.work(signals);
    if signals.has_failed() {
        transition(State::WorkFailed);
        return transition(State::CompletedFailure);
    }
    transition(State::Worked);

    transition(State::Monitoring);
    unit.monitor(signals);
    if signals.has_failed() {
        return transition(State::CompletedFailure);
    }

    transition(State::CleaningUp);
    unit.cleanup(signals);
    if signals.has_failed() {
        transition(State::CompletedFailure)
    } else {
        transition(State::CompletedSuccess)
    }
}

// Records a failure for a unit that did not finish on its own,
// keeping started and completed counts in step.
fn settle(signals: &Signals, id: &str, notes: &str, cause: anyhow::Error) {
    if !signals.has_started() {
        signals.started();
    }
    signals.record_failure(id, notes, cause);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
