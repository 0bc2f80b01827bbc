use colored::Colorize;

use turnstile::{Counts, RunCounters};
use util::Timer;

use crate::discover::Discovered;
use crate::exec::Backend;
use crate::settings::Settings;

/// All interactions with the text UI should go through this struct.
pub struct Ui {
    /// -v setting, displays extra text info to user
    pub verbose: bool,
    /// keeps track of time for the whole run
    timer: Timer,
}

impl Ui {
    pub fn new(settings: &Settings) -> Self {
        Self {
            verbose: settings.verbose > 0 || settings.debug,
            timer: Timer::now(),
        }
    }

    pub fn start_timer(&mut self) {
        self.timer.reset();
    }

    pub fn verbose_msg(&self, msg: &str) {
        if self.verbose {
            eprintln!("{}", msg);
        }
    }

    /// What will run, and which arguments couldn't be resolved.
    pub fn print_setup_summary(&self, settings: &Settings, discovered: &Discovered) {
        for (arg, err) in &discovered.errors {
            eprintln!("{} {arg}: {err}", "SKIP".yellow());
        }
        if discovered.models.is_empty() {
            return;
        }

        let backend = match &settings.backend {
            Backend::Local => "locally".to_owned(),
            Backend::Sge { qsub } => format!("on the grid engine via {qsub}"),
        };
        eprintln!(
            "{} {} model(s) {backend}, {} at a time",
            "RUN".green(),
            discovered.models.len(),
            settings.threads,
        );
        if self.verbose {
            if let Some(config) = &settings.config {
                eprintln!("Using config file {config:?}");
            }
            for model in &discovered.models {
                eprintln!("  {:?} -> {:?}", model.path, model.output_dir);
            }
        }
    }

    /// Overwrites the current line, so only call while nothing else prints.
    pub fn progress(&self, completed: u64, total: u64) {
        if self.verbose {
            eprint!("\r{completed}/{total} models completed");
        }
    }

    pub fn print_run_summary(&self, counters: &RunCounters) {
        if self.verbose {
            eprintln!();
        }
        if !counters.errors.is_empty() {
            eprintln!(
                "{} errors were experienced during the run",
                counters.errors.len().to_string().red()
            );
            for error in &counters.errors {
                eprintln!(
                    "{} {}: {}",
                    "FAILED".red(),
                    error.run_identifier(),
                    error.notes()
                );
                log::debug!("{}: {:#}", error.run_identifier(), error.cause());
            }
        }
        let message = summary_line(counters.counts());
        let message = if counters.failed == 0 {
            message.green()
        } else {
            message.yellow()
        };
        eprintln!("{message} in {:?}", self.timer.elapsed());
    }
}

/// Final tally, e.g. `4 started, 1 failed, 4 completed`.
fn summary_line(counts: Counts) -> String {
    format!(
        "{} started, {} failed, {} completed",
        counts.started, counts.failed, counts.completed
    )
}
