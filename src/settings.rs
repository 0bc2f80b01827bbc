use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::args::{Args, BackendArgs};
use crate::exec::Backend;
use crate::model::RunSettings;

/// Config file looked for in the current directory when none is given.
pub const DEFAULT_CONFIG: &str = "nmbatch.yml";
pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_NM_EXECUTABLE: &str = "nmfe74";
pub const DEFAULT_OUTPUT_DIR: &str = "{name}";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Config file {0:?} does not exist")]
    ConfigNotFound(PathBuf),
    #[error("Invalid config file {0:?}")]
    InvalidConfig(PathBuf, #[source] serde_yaml::Error),
    #[error("Thread count must be at least 1")]
    NoThreads,
}

/// Values that may be set in the YAML config file.
/// Keys are camelCase, e.g. `cleanLvl: 2`.
#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    pub git: bool,
    pub clean_lvl: Option<u8>,
    pub copy_lvl: Option<u8>,
    pub cache_dir: Option<String>,
    pub cache_exe: Option<String>,
    pub nm_executable: Option<String>,
    pub one_est: bool,
    pub overwrite: bool,
    pub threads: Option<usize>,
    pub output_dir: Option<String>,
    /// Files never removed during cleanup
    pub clean_exceptions: Vec<String>,
    /// Files always copied back after a run
    pub copy_mandatory: Vec<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path:?}"))?;
        Self::parse(path, &text)
    }

    fn parse(path: &Path, text: &str) -> Result<Self> {
        // an empty file deserializes as null:
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config =
            serde_yaml::from_str(text).map_err(|e| Error::InvalidConfig(path.to_owned(), e))?;
        Ok(config)
    }
}

/// Settings are like Args, except the config file has been merged in
/// and defaults have been applied.
#[derive(Debug)]
pub struct Settings {
    /// Config file that was loaded, if any
    pub config: Option<PathBuf>,
    pub verbose: u8,
    pub debug: bool,
    pub threads: usize,
    pub backend: Backend,
    /// Model arguments as given on the command line
    pub models: Vec<String>,
    /// Output directory template, relative to each model
    pub output_dir: String,
    pub run: RunSettings,
    pub clean_exceptions: Vec<String>,
    pub copy_mandatory: Vec<String>,
}

impl Settings {
    /// Merge `args` over `file`; command-line values win.
    pub fn merge(args: Args, file: FileConfig, config: Option<PathBuf>) -> Result<Self, Error> {
        let threads = args.threads.or(file.threads).unwrap_or(DEFAULT_THREADS);
        if threads == 0 {
            return Err(Error::NoThreads);
        }

        let (backend, models) = match args.backend {
            BackendArgs::Local { models } => (Backend::Local, models),
            BackendArgs::Sge { qsub, models } => (Backend::Sge { qsub }, models),
        };

        let run = RunSettings {
            git: args.git || file.git,
            verbose: args.verbose > 0,
            debug: args.debug,
            clean_lvl: args.clean_lvl.or(file.clean_lvl).unwrap_or(0),
            copy_lvl: args.copy_lvl.or(file.copy_lvl).unwrap_or(0),
            cache_dir: args.cache_dir.or(file.cache_dir),
            cache_exe: args.cache_exe.or(file.cache_exe),
            nm_executable: args
                .nm_executable
                .or(file.nm_executable)
                .unwrap_or_else(|| DEFAULT_NM_EXECUTABLE.to_owned()),
            one_est: args.one_est || file.one_est,
            overwrite: args.overwrite || file.overwrite,
        };

        Ok(Self {
            config,
            verbose: args.verbose,
            debug: args.debug,
            threads,
            backend,
            models,
            output_dir: args
                .output_dir
                .or(file.output_dir)
                .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_owned()),
            run,
            clean_exceptions: file.clean_exceptions,
            copy_mandatory: file.copy_mandatory,
        })
    }
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        // an explicit config must exist; the default one is optional.
        let config = match &args.config {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    return Err(Error::ConfigNotFound(path).into());
                }
                Some(path.canonicalize()?)
            }
            None => {
                let path = std::env::current_dir()
                    .context("reading current directory")?
                    .join(DEFAULT_CONFIG);
                path.exists().then_some(path)
            }
        };

        let file = match &config {
            Some(path) => {
                log::debug!("Loading config from {path:?}");
                FileConfig::load(path)?
            }
            None => FileConfig::default(),
        };

        Ok(Self::merge(args, file, config)?)
    }
}
