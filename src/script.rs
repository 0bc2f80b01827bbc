use std::borrow::Cow;

use util::PathEncodingError;

use crate::exec::Backend;
use crate::model::JobDescriptor;

/// Utility for building the contents of a model's `<name>.sh` script.
/// Note that it modifies a String reference held internally;
/// read that String to get the script's contents.
#[derive(Debug)]
pub struct ScriptBuilder<'a> {
    strbuf: &'a mut String,
}

impl<'a> ScriptBuilder<'a> {
    pub fn new(strbuf: &'a mut String) -> Self {
        Self { strbuf }
    }
}

impl ScriptBuilder<'_> {
    /// Write a complete script that runs `model` for the given backend.
    pub fn write_script(
        &mut self,
        model: &JobDescriptor,
        backend: &Backend,
    ) -> Result<(), PathEncodingError> {
        self.write_prefix();
        if let Backend::Sge { .. } = backend {
            let working_dir = model.output_dir.to_str().ok_or(PathEncodingError)?;
            self.write_sge_directives(&shell_quote(working_dir));
        }
        self.write_command(&command_string(model)?);
        Ok(())
    }

    /// shebang line
    fn write_prefix(&mut self) {
        self.strbuf.clear();
        self.strbuf.push_str("#!/usr/bin/env bash\n\n");
    }

    /// grid engine reads `#$` lines as submission options
    fn write_sge_directives(&mut self, working_dir: &str) {
        self.strbuf.push_str("#$ -wd ");
        self.strbuf.push_str(working_dir);
        self.strbuf.push_str("\n\n");
    }

    fn write_command(&mut self, command: &str) {
        self.strbuf.push_str(command);
        self.strbuf.push('\n');
    }
}

/// `<nm_executable> <output_dir>/<model> <output_dir>/<file_name>.lst`
///
/// Both paths are shell-quoted. The executable is written as configured,
/// so it may carry its own arguments.
pub fn command_string(model: &JobDescriptor) -> Result<String, PathEncodingError> {
    let model_copy = model.output_dir.join(&model.model);
    let listing = model.output_dir.join(format!("{}.lst", model.file_name));
    Ok(format!(
        "{} {} {}",
        model.settings.nm_executable,
        shell_quote(model_copy.to_str().ok_or(PathEncodingError)?),
        shell_quote(listing.to_str().ok_or(PathEncodingError)?),
    ))
}

/// Quote `word` for bash if it contains anything besides plain path characters.
/// Single quotes inside become `'\''`.
pub fn shell_quote(word: &str) -> Cow<'_, str> {
    let plain = |c: char| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c);
    if !word.is_empty() && word.chars().all(plain) {
        return Cow::Borrowed(word);
    }
    let mut quoted = String::with_capacity(word.len() + 2);
    quoted.push('\'');
    for c in word.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    Cow::Owned(quoted)
}

/// Contents of the `.gitignore` written into output directories:
/// one line per scratch file.
pub fn write_gitignore(strbuf: &mut String, scratch_files: &[&str]) {
    strbuf.clear();
    for file in scratch_files {
        strbuf.push_str(file);
        strbuf.push('\n');
    }
}
