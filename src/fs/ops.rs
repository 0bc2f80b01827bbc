use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

use util::PathEncodingError;

use super::Error;

/// Copy `src` to `tgt`, recursively if needed.
pub fn copy(src: &Path, tgt: &Path) -> Result<()> {
    if src.is_symlink() {
        let link_tgt = fs::read_link(src)?;
        symlink(&link_tgt, tgt)?;
    } else if src.is_file() {
        fs::copy(src, tgt)?;
    } else if src.is_dir() {
        cp_dir(src, tgt, src, tgt)?;
    } else {
        return Err(
            Error::UnknownPathType(src.to_str().ok_or(PathEncodingError)?.to_owned()).into(),
        );
    }
    Ok(())
}

fn cp_dir(src_root: &Path, tgt_root: &Path, src: &Path, tgt: &Path) -> Result<()> {
    fs::create_dir_all(tgt)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        let src_entry = entry.path();
        let tgt_entry = tgt.join(entry.file_name());
        if ty.is_symlink() {
            let orig_link_tgt = fs::read_link(&src_entry)?;
            let new_link_tgt = resolve_new_link_tgt(src_root, tgt_root, orig_link_tgt)?;
            symlink(&new_link_tgt, &tgt_entry)?;
        } else if ty.is_dir() {
            cp_dir(src_root, tgt_root, &src_entry, &tgt_entry)?;
        } else if ty.is_file() {
            fs::copy(&src_entry, &tgt_entry)?;
        } else {
            return Err(Error::UnknownPathType(
                entry.path().to_str().ok_or(PathEncodingError)?.to_owned(),
            )
            .into());
        }
    }
    Ok(())
}

/// If link is internal to `src_root`, create a new internal link in `tgt_root`.
/// O/w, just link to the same external target.
fn resolve_new_link_tgt(
    src_root: &Path,
    tgt_root: &Path,
    orig_link_tgt: PathBuf,
) -> Result<PathBuf> {
    if orig_link_tgt.starts_with(src_root) {
        Ok(tgt_root.join(orig_link_tgt.strip_prefix(src_root)?))
    } else {
        Ok(orig_link_tgt)
    }
}

/// Permission bits from file metadata.
#[cfg(unix)]
pub fn mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

/// Non-unix platforms only report the readonly flag.
#[cfg(not(unix))]
pub fn mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Set permission bits on `path`.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

/// Only the readonly flag survives on non-unix platforms.
#[cfg(not(unix))]
pub fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o222 == 0);
    fs::set_permissions(path, perms)
}

/// Symlink the given `link` to `tgt`; works for unix and windows.
pub fn symlink(tgt: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    std::os::unix::fs::symlink(tgt, link)?;

    #[cfg(windows)]
    if tgt.is_dir() {
        std::os::windows::fs::link_dir(tgt, link)?;
    } else {
        std::os::windows::fs::link_file(tgt, link)?;
    }
    Ok(())
}
