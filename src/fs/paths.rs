use std::path::{Path, PathBuf};

use super::Fs;

/// Utility fns for making the paths of files written into a model's output directory.
impl Fs {
    /// $OUTPUT/run001.mod
    pub fn model_copy<'a>(&self, output_dir: &Path, model: &str, buf: &'a mut PathBuf) -> &'a Path {
        self.parts2(output_dir, model, buf)
    }

    /// $OUTPUT/run001.sh
    pub fn script<'a>(&self, output_dir: &Path, file_name: &str, buf: &'a mut PathBuf) -> &'a Path {
        self.with_suffix(output_dir, file_name, ".sh", buf)
    }

    /// $OUTPUT/run001.mod.out
    pub fn captured_output<'a>(
        &self,
        output_dir: &Path,
        model: &str,
        buf: &'a mut PathBuf,
    ) -> &'a Path {
        self.with_suffix(output_dir, model, ".out", buf)
    }

    /// $OUTPUT/.gitignore
    pub fn gitignore<'a>(&self, output_dir: &Path, buf: &'a mut PathBuf) -> &'a Path {
        self.parts2(output_dir, ".gitignore", buf)
    }

    fn parts2<'a, T, U>(&self, p1: T, p2: U, buf: &'a mut PathBuf) -> &'a Path
    where
        T: AsRef<Path>,
        U: AsRef<Path>,
    {
        buf.clear();
        buf.push(p1);
        buf.push(p2);
        &*buf
    }

    // appends `suffix` verbatim, so `run001.mod` + `.out` keeps both extensions:
    fn with_suffix<'a>(&self, dir: &Path, name: &str, suffix: &str, buf: &'a mut PathBuf) -> &'a Path {
        self.parts2(dir, name, buf);
        buf.as_mut_os_string().push(suffix);
        &*buf
    }
}
