use std::time::Duration;

use anyhow::{Context, Result};

use turnstile::{Manager, RunCounters, Scalable};

use crate::discover;
use crate::exec::{ModelJob, PostWorkOptions};
use crate::settings::Settings;
use crate::ui::Ui;

/// How often we check whether every model has finished.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("No models were located or loaded. Please verify the arguments provided and try again")]
    NoModels,
}

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// User interface
    ui: Ui,
}

impl App {
    /// Create a new `App`.
    pub fn new(settings: Settings) -> Self {
        let ui = Ui::new(&settings);
        Self { settings, ui }
    }

    /// Resolve the models, run them all, and report what happened.
    ///
    /// Individual model failures are part of the returned counters;
    /// an `Err` means nothing could run at all.
    pub fn run(mut self) -> Result<RunCounters> {
        let cwd = std::env::current_dir().context("reading current directory")?;
        self.ui.verbose_msg(&format!("Resolving models relative to {cwd:?}"));
        let discovered = discover::collect_models(&self.settings.models, &self.settings, &cwd);
        self.ui.print_setup_summary(&self.settings, &discovered);

        if discovered.models.is_empty() {
            return Err(Error::NoModels.into());
        }

        let options = PostWorkOptions {
            clean_exceptions: self.settings.clean_exceptions.clone(),
            copy_mandatory: self.settings.copy_mandatory.clone(),
        };
        let units: Vec<Box<dyn Scalable>> = discovered
            .models
            .into_iter()
            .map(|model| {
                let job = ModelJob::new(model, self.settings.backend.clone(), options.clone());
                Box::new(job) as Box<dyn Scalable>
            })
            .collect();

        let mut manager = Manager::new(units, self.settings.threads)?;
        self.ui.start_timer();
        manager.execute().context("starting worker pool")?;

        let mut last_completed = 0;
        while !manager.is_complete() {
            std::thread::sleep(POLL_INTERVAL);
            let completed = manager.counts().completed;
            if completed != last_completed {
                self.ui.progress(completed, manager.total());
                last_completed = completed;
            }
        }

        let counters = manager.wait().context("waiting for worker pool")?;
        self.ui.print_run_summary(&counters);
        Ok(counters)
    }
}
