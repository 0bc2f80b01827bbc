use std::path::PathBuf;
use std::process::Command;

use crate::fs::Fs;
use crate::model::JobDescriptor;

use super::run_cmd::run_cmd;
use super::{find_executable, Error, Note, PhaseFailure};

/// Run the model's script in its output directory and wait for it to finish.
/// Combined output is saved to `<model>.out` on success, and included in the note on failure.
pub(super) fn work(model: &JobDescriptor, fs: &Fs) -> Result<(), PhaseFailure> {
    log::info!("{}: beginning local work phase", model.model);

    let exe = &model.settings.nm_executable;
    let found = find_executable(exe)
        .ok_or_else(|| Error::ExecutableNotFound(exe.clone()))
        .note(|| format!("Couldn't locate {exe} in path"))?;
    log::debug!("{}: using NONMEM executable {found:?}", model.model);

    let mut pathbuf = PathBuf::with_capacity(256);
    let script = fs.script(&model.output_dir, &model.file_name, &mut pathbuf);

    let mut cmd = Command::new("/usr/bin/env");
    cmd.arg("bash").arg(script).current_dir(&model.output_dir);

    let result = run_cmd(&mut cmd, model.settings.debug)
        .note(|| "Unable to start the execution script for this model".to_owned())?;

    if !result.status.success() {
        let code = result
            .status
            .code()
            .map_or_else(|| "none, killed by a signal".to_owned(), |c| c.to_string());
        return Err(PhaseFailure::new(
            format!(
                "Running the model's execution script failed with exit code {code}. Output: {}",
                result.output_lossy().trim_end()
            ),
            Error::NonZeroExit(result.status),
        ));
    }

    let target = fs.captured_output(&model.output_dir, &model.model, &mut pathbuf);
    fs.write_file(target, &result.output)
        .note(|| "Unable to save the output of this model's run".to_owned())?;

    log::info!("{}: local work phase finished", model.model);
    Ok(())
}
