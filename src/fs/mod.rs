use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

use util::PathEncodingError;

/// Utility fns
mod ops;

/// Defines fns for creating common paths in a model's output directory
mod paths;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Path is neither file nor dir: {0}")]
    UnknownPathType(String),
    #[error("Can't perform IO operation: \"{0}\" is not whitelisted")]
    NotWhitelisted(String),
}

/// All file operations performed on behalf of a model go through this struct.
///
/// Destructive operations check that the path in question is strictly below the
/// single whitelisted prefix (the directory containing the model) and has no `..`
/// components, otherwise they will not be performed.
#[derive(Debug, Clone)]
pub struct Fs {
    /// The directory we are allowed to modify
    prefix: PathBuf,
}

impl Fs {
    /// Create a new `Fs` that may modify anything below `prefix`.
    pub fn new(prefix: &Path) -> Self {
        Self {
            prefix: prefix.to_path_buf(),
        }
    }

    /// Check if path exists on disk.
    pub fn exists<T: AsRef<Path>>(&self, path: T) -> bool {
        let path = path.as_ref();
        path.exists() || path.is_symlink()
    }

    /// Create a directory (uses `std::fs::create_dir_all`, so an entire tree of dirs can be created).
    pub fn create_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::create_dir_all(path).context("creating dir")?;
        Ok(())
    }

    /// Write bytes to a file, replacing it if it exists.
    pub fn write_file<T: AsRef<Path>>(&self, path: T, contents: &[u8]) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::write(path, contents).with_context(|| format!("writing file {path:?}"))?;
        Ok(())
    }

    /// Write bytes to a file and set its permission bits to `mode`.
    pub fn write_file_with_mode<T: AsRef<Path>>(
        &self,
        path: T,
        contents: &[u8],
        mode: u32,
    ) -> Result<()> {
        let path = path.as_ref();
        self.write_file(path, contents)?;
        ops::set_mode(path, mode).with_context(|| format!("setting mode of {path:?}"))?;
        Ok(())
    }

    /// Permission bits of an existing file.
    pub fn mode<T: AsRef<Path>>(&self, path: T) -> Result<u32> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).with_context(|| format!("reading metadata of {path:?}"))?;
        Ok(ops::mode(&metadata))
    }

    /// Delete a file, or recursively delete a directory.
    pub fn delete<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        if !path.is_symlink() && path.is_dir() {
            self.delete_dir(path)
        } else {
            self.delete_file(path)
        }
    }

    /// Delete a file.
    pub fn delete_file<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::remove_file(path).with_context(|| format!("deleting file {path:?}"))?;
        Ok(())
    }

    /// Recursively delete a directory.
    pub fn delete_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::remove_dir_all(path).with_context(|| format!("deleting dir {path:?}"))?;
        Ok(())
    }

    /// Copy `src` to `tgt`, recursively if `src` is a directory.
    pub fn copy<T: AsRef<Path>, U: AsRef<Path>>(&self, src: T, tgt: U) -> Result<()> {
        let (src, tgt) = (src.as_ref(), tgt.as_ref());
        self.check_whitelist(tgt)?;
        ops::copy(src, tgt).with_context(|| format!("copying {src:?} to {tgt:?}"))?;
        Ok(())
    }

    /// Read a text file into a list of lines.
    pub fn read_lines<T: AsRef<Path>>(&self, path: T) -> Result<Vec<String>> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
        Ok(text.lines().map(str::to_owned).collect())
    }

    fn is_whitelisted<T: AsRef<Path>>(&self, path: T) -> bool {
        let path = path.as_ref();
        path != self.prefix
            && path.starts_with(&self.prefix)
            && !path.components().any(|c| c == Component::ParentDir)
    }

    fn check_whitelist(&self, path: &Path) -> Result<()> {
        if !self.is_whitelisted(path) {
            Err(Error::NotWhitelisted(path.to_str().ok_or(PathEncodingError)?.to_owned()).into())
        } else {
            Ok(())
        }
    }
}
