/// High-level command line app
mod app;
/// Definition of command-line args
mod args;
/// Turning model arguments into jobs
mod discover;
/// Running models
mod exec;
/// Filesystem operations
mod fs;
/// Per-model description and settings
mod model;
/// Which NONMEM files to copy or clean up
mod policy;
/// Generated shell scripts
mod script;
/// Combined command-line and config file run settings
mod settings;
/// Text UI
mod ui;

// exported for tests:
pub use app::App;
pub use args::{Args, BackendArgs};
pub use exec::{Backend, ModelJob, PostWork, PostWorkOptions};
pub use model::{JobDescriptor, RunSettings, SetupError};
pub use policy::{FileCleanInstruction, FileCopyInstruction, FilePolicy, Role, TargetedFile};
pub use settings::{FileConfig, Settings};

/// Run the command-line app.
pub fn run() -> Result<(), anyhow::Error> {
    use clap::Parser;
    let args = Args::parse();

    // INTERPRET SETTINGS ///////////////
    let settings: Settings = args.try_into()?;

    let log_level = if settings.debug {
        log::LevelFilter::Trace
    } else {
        match settings.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    simple_logging::log_to_stderr(log_level);

    // RUN THE THING /////////////////
    let app = App::new(settings);
    app.run()?;

    Ok(())
}
