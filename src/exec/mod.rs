use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use turnstile::{Scalable, Signals};

use crate::fs::Fs;
use crate::model::JobDescriptor;
use crate::policy::{self, FileCleanInstruction, FileCopyInstruction, FilePolicy};
use crate::script::{self, ScriptBuilder};

/// Run models on this machine
mod local;
/// Submit models to Sun Grid Engine
mod sge;
/// Run a subprocess
mod run_cmd;

/// Mode of the generated `<name>.sh` script.
const SCRIPT_MODE: u32 = 0o750;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Output directory {0:?} already exists")]
    OutputDirExists(PathBuf),
    #[error("Couldn't locate '{0}' in PATH")]
    ExecutableNotFound(String),
    #[error("Process exited unsuccessfully ({0})")]
    NonZeroExit(ExitStatus),
    #[error("Cannot attach to child {0}")]
    NoPipe(&'static str),
    #[error("Error joining output thread")]
    PipeThreadPanicked,
}

/// Where a model runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Run `<name>.sh` in a subprocess and wait for it.
    Local,
    /// Hand `<name>.sh` to the grid engine's `qsub`; success means the job was accepted.
    Sge { qsub: String },
}

/// Files kept or removed after a model runs.
#[derive(Debug, Clone, Default)]
pub struct PostWorkOptions {
    /// Never removed during cleanup, in addition to the model file itself
    pub clean_exceptions: Vec<String>,
    /// Always copied back to the model's directory
    pub copy_mandatory: Vec<String>,
}

/// Copy and clean instructions for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostWork {
    pub copy: FileCopyInstruction,
    pub clean: FileCleanInstruction,
}

/// Why a phase failed: a note for the user plus the underlying error.
#[derive(Debug)]
struct PhaseFailure {
    notes: String,
    cause: anyhow::Error,
}

impl PhaseFailure {
    fn new(notes: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            notes: notes.into(),
            cause: cause.into(),
        }
    }

    fn record(self, id: &str, signals: &Signals) {
        log::error!("{id}: {} ({:#})", self.notes, self.cause);
        signals.record_failure(id, self.notes, self.cause);
    }
}

/// Like `anyhow::Context`, but attaches the note shown to the user.
trait Note<T> {
    fn note<F: FnOnce() -> String>(self, f: F) -> Result<T, PhaseFailure>;
}

impl<T, E: Into<anyhow::Error>> Note<T> for Result<T, E> {
    fn note<F: FnOnce() -> String>(self, f: F) -> Result<T, PhaseFailure> {
        self.map_err(|e| PhaseFailure::new(f(), e))
    }
}

/// One model carried through the worker pool.
#[derive(Debug)]
pub struct ModelJob {
    model: JobDescriptor,
    backend: Backend,
    options: PostWorkOptions,
    /// File operations are limited to the model's directory
    fs: Fs,
}

impl ModelJob {
    pub fn new(model: JobDescriptor, backend: Backend, options: PostWorkOptions) -> Self {
        let fs = Fs::new(&model.original_path);
        Self {
            model,
            backend,
            options,
            fs,
        }
    }

    pub fn model(&self) -> &JobDescriptor {
        &self.model
    }

    /// Copy and clean instructions, from the copied model in the output directory.
    /// If it can't be read, its `$TABLE` outputs are left out.
    pub fn post_work(&self) -> PostWork {
        let policy = FilePolicy::for_model(&self.model.output_dir, &self.model.model)
            .unwrap_or_else(|e| {
                log::warn!(
                    "{}: could not read output tables, none will be copied or removed: {e:#}",
                    self.model.model
                );
                FilePolicy::without_outputs(&self.model.model)
            });

        let settings = &self.model.settings;
        let mut exceptions = self.options.clean_exceptions.clone();
        exceptions.push(self.model.model.clone());

        PostWork {
            copy: policy.copy_instruction(
                &self.model.output_dir,
                &self.model.original_path,
                settings.copy_lvl,
                &self.options.copy_mandatory,
            ),
            clean: policy.clean_instruction(&self.model.output_dir, settings.clean_lvl, &exceptions),
        }
    }

    fn try_prepare(&self) -> Result<(), PhaseFailure> {
        let dir = &self.model.output_dir;

        if self.fs.exists(dir) {
            if self.model.settings.overwrite {
                log::debug!("Removing existing output directory {dir:?}");
                self.fs.delete(dir).note(|| {
                    "An error occurred trying to remove the directory as specified in the overwrite flag".to_owned()
                })?;
            } else {
                return Err(PhaseFailure::new(
                    format!(
                        "The target directory {dir:?} already exists, but we are configured to not overwrite. Invalid configuration / run state"
                    ),
                    Error::OutputDirExists(dir.clone()),
                ));
            }
        }

        self.copy_model().note(|| {
            format!(
                "There appears to have been an issue trying to copy {} to {dir:?}",
                self.model.model
            )
        })?;

        if self.model.settings.git {
            self.write_gitignore()
                .note(|| "Unable to write a .gitignore for this model".to_owned())?;
        }

        self.write_script().note(|| {
            "An error occurred during the creation of the executable script for this model".to_owned()
        })?;

        Ok(())
    }

    /// Copy the model into its output directory, adjusting `$DATA` paths for the extra level.
    fn copy_model(&self) -> anyhow::Result<()> {
        let model = &self.model;
        self.fs.create_dir(&model.output_dir)?;

        let lines = self.fs.read_lines(&model.path)?;
        let mut contents = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in &lines {
            contents.push_str(&syntax::add_path_level_to_data(line));
            contents.push('\n');
        }

        let mode = self.fs.mode(&model.path)?;
        let mut pathbuf = PathBuf::new();
        let target = self.fs.model_copy(&model.output_dir, &model.model, &mut pathbuf);
        self.fs.write_file_with_mode(target, contents.as_bytes(), mode)
    }

    fn write_gitignore(&self) -> anyhow::Result<()> {
        let mut strbuf = String::with_capacity(1024);
        script::write_gitignore(&mut strbuf, policy::scratch_files());
        let mut pathbuf = PathBuf::new();
        let target = self.fs.gitignore(&self.model.output_dir, &mut pathbuf);
        self.fs.write_file(target, strbuf.as_bytes())
    }

    fn write_script(&self) -> anyhow::Result<()> {
        let mut strbuf = String::with_capacity(512);
        ScriptBuilder::new(&mut strbuf).write_script(&self.model, &self.backend)?;
        let mut pathbuf = PathBuf::new();
        let target = self.fs.script(&self.model.output_dir, &self.model.file_name, &mut pathbuf);
        self.fs.write_file_with_mode(target, strbuf.as_bytes(), SCRIPT_MODE)
    }

    /// Copy files back to the model's directory, then remove files from the output directory.
    /// Files that don't exist are skipped.
    fn run_post_work(&self) -> Result<(), PhaseFailure> {
        let PostWork { copy, clean } = self.post_work();

        for targeted in &copy.files_to_copy {
            let src = copy.copy_from.join(&targeted.file);
            if !self.fs.exists(&src) {
                log::trace!("{}: nothing to copy at {src:?}", self.model.model);
                continue;
            }
            self.fs
                .copy(&src, copy.copy_to.join(&targeted.file))
                .note(|| format!("Unable to copy {} back to {:?}", targeted.file, copy.copy_to))?;
        }

        for targeted in &clean.files_to_remove {
            let path = clean.location.join(&targeted.file);
            if !self.fs.exists(&path) {
                continue;
            }
            self.fs
                .delete(&path)
                .note(|| format!("Unable to remove {path:?} during cleanup"))?;
        }
        Ok(())
    }
}

impl Scalable for ModelJob {
    fn id(&self) -> &str {
        &self.model.model
    }

    fn prepare(&mut self, signals: &Signals) {
        signals.started();
        log::info!("{}: preparing {:?}", self.model.model, self.model.output_dir);
        if let Err(failure) = self.try_prepare() {
            failure.record(self.id(), signals);
        }
    }

    fn work(&mut self, signals: &Signals) {
        let result = match &self.backend {
            Backend::Local => local::work(&self.model, &self.fs),
            Backend::Sge { qsub } => sge::work(&self.model, &self.fs, qsub),
        };
        if let Err(failure) = result {
            failure.record(self.id(), signals);
        }
    }

    fn cleanup(&mut self, signals: &Signals) {
        match self.backend {
            Backend::Local => {
                if let Err(failure) = self.run_post_work() {
                    failure.record(self.id(), signals);
                    return;
                }
                log::info!("{}: completed", self.model.model);
            }
            // the job is still queued; its files aren't there yet.
            Backend::Sge { .. } => {
                log::info!("{}: submitted; no post-work for grid engine jobs", self.model.model);
            }
        }
        signals.completed();
    }
}

/// Find an executable by path (if `name` contains a separator) or on `PATH`.
fn find_executable(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|path| is_executable(path))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
