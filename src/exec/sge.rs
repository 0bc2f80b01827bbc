use std::path::PathBuf;
use std::process::Command;

use crate::fs::Fs;
use crate::model::JobDescriptor;

use super::run_cmd::run_cmd;
use super::{find_executable, Error, Note, PhaseFailure};

/// Submit the model's script to the grid engine.
/// This only waits for `qsub` to accept the job, not for the job to run.
pub(super) fn work(model: &JobDescriptor, fs: &Fs, qsub: &str) -> Result<(), PhaseFailure> {
    log::info!("{}: submitting to grid engine", model.model);

    let binary = find_executable(qsub)
        .ok_or_else(|| Error::ExecutableNotFound(qsub.to_owned()))
        .note(|| format!("Couldn't locate {qsub} in path; is the grid engine installed?"))?;

    let mut pathbuf = PathBuf::with_capacity(256);
    let script = fs.script(&model.output_dir, &model.file_name, &mut pathbuf);

    let mut cmd = Command::new(&binary);
    cmd.arg(script).current_dir(&model.output_dir);

    let result = run_cmd(&mut cmd, model.settings.debug)
        .note(|| format!("Unable to run {binary:?} for this model"))?;

    if !result.status.success() {
        return Err(PhaseFailure::new(
            format!(
                "Submitting this model to the grid engine failed ({}). Output: {}",
                result.status,
                result.output_lossy().trim_end()
            ),
            Error::NonZeroExit(result.status),
        ));
    }

    let target = fs.captured_output(&model.output_dir, &model.model, &mut pathbuf);
    fs.write_file(target, &result.output)
        .note(|| "Unable to save the grid engine's response for this model".to_owned())?;

    log::info!("{}: accepted by grid engine", model.model);
    Ok(())
}
