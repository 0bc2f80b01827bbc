use std::io::{stderr, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use anyhow::{Context, Result};

use super::Error;

/// Exit status and interleaved stdout/stderr of a finished subprocess.
#[derive(Debug)]
pub struct CmdOutput {
    pub status: ExitStatus,
    pub output: Vec<u8>,
}

impl CmdOutput {
    pub fn output_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }
}

/// Run a subprocess, collecting stdout and stderr into one buffer.
/// If `echo` is set, output is also copied to our stderr as it arrives.
/// Based on:
/// <https://stackoverflow.com/questions/66060139/how-to-tee-stdout-stderr-from-a-subprocess-in-rust>
pub fn run_cmd(cmd: &mut Command, echo: bool) -> Result<CmdOutput> {
    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| {
            format!(
                "failed to execute child process {:?} {:?}",
                cmd.get_program(),
                cmd.get_args(),
            )
        })?;

    let child_out = child.stdout.take().ok_or(Error::NoPipe("stdout"))?;
    let child_err = child.stderr.take().ok_or(Error::NoPipe("stderr"))?;

    let combined = Arc::new(Mutex::new(Vec::with_capacity(4096)));

    let thread_out = thread::spawn({
        let sink = Arc::clone(&combined);
        move || communicate(child_out, &sink, echo)
    });
    let thread_err = thread::spawn({
        let sink = Arc::clone(&combined);
        move || communicate(child_err, &sink, echo)
    });

    let out_result = thread_out.join().map_err(|_| Error::PipeThreadPanicked)?;
    let err_result = thread_err.join().map_err(|_| Error::PipeThreadPanicked)?;
    out_result.context("reading child stdout")?;
    err_result.context("reading child stderr")?;

    let status = child.wait().context("waiting on child process")?;

    let output = std::mem::take(&mut *combined.lock().unwrap_or_else(PoisonError::into_inner));
    Ok(CmdOutput { status, output })
}

fn communicate<R: Read>(mut stream: R, sink: &Mutex<Vec<u8>>, echo: bool) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];
    loop {
        let num_read = stream.read(&mut buf)?;
        if num_read == 0 {
            break;
        }

        let buf = &buf[..num_read];
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        if echo {
            stderr().write_all(buf)?;
        }
    }

    Ok(())
}

#[cfg(all(test, unix))]
mod test {
    use super::*;

    #[test]
    fn test_collects_both_streams() -> Result<()> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo out; echo err 1>&2; exit 3");
        let result = run_cmd(&mut cmd, false)?;
        assert_eq!(Some(3), result.status.code());
        let text = result.output_lossy();
        assert!(text.contains("out\n"));
        assert!(text.contains("err\n"));
        Ok(())
    }

    #[test]
    fn test_missing_program() {
        let mut cmd = Command::new("/nonexistent/nmfe74");
        assert!(run_cmd(&mut cmd, false).is_err());
    }
}
