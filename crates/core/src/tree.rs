//! File and directory tree operations
//!
//! Every operation is synchronous and fail-fast: the first error aborts the
//! call and is returned to the caller. Nothing is retried, and the only
//! tolerated failure is [`mkdirs`] losing a race against a concurrent creator
//! of the same directory.
//!
//! # Example
//!
//! ```rust,no_run
//! use treeops_core::tree::{clean_output_dir, copy_directory};
//!
//! clean_output_dir("build/staging")?;
//! copy_directory("src/main/res", "build/staging/res")?;
//! # Ok::<(), treeops_core::Error>(())
//! ```

use crate::error::{Error, ErrorCode, Result, ResultExt};
use crate::logging::OpTimer;
use crate::paths::{self, FileKind};
use filetime::FileTime;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Remove `path` and everything below it; a missing path is not an error
///
/// Symbolic links are removed, never followed.
pub fn delete_path(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match paths::file_kind(path)? {
        FileKind::Missing => Ok(()),
        FileKind::Directory => {
            debug!(path = %path.display(), "Deleting directory tree");
            fs::remove_dir_all(path).map_err(|e| Error::io_at(path, e))
        }
        FileKind::RegularFile | FileKind::Other => {
            debug!(path = %path.display(), "Deleting file");
            fs::remove_file(path).map_err(|e| Error::io_at(path, e))
        }
    }
}

/// Remove every child of `dir`, leaving `dir` itself in place
pub fn delete_directory_contents(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(Error::not_a_directory(dir).with_context("delete_directory_contents"));
    }

    for entry in fs::read_dir(dir).map_err(|e| Error::io_at(dir, e))? {
        let entry = entry.map_err(|e| Error::io_at(dir, e))?;
        delete_path(entry.path())?;
    }
    Ok(())
}

/// Make `path` an empty directory, whatever it was before
pub fn clean_output_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if paths::file_kind(path)? == FileKind::Directory {
        return delete_directory_contents(path);
    }

    delete_path(path)?;
    mkdirs(path)
        .context(format!("Could not create empty folder {}", path.display()))
        .map(|_| ())
}

/// Create `dir` and its parents
///
/// Succeeds when the directory already exists, including when another
/// caller created it between our check and our attempt.
pub fn mkdirs(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(dir.to_path_buf()),
        Err(_) if dir.is_dir() => {
            warn!(path = %dir.display(), "Directory appeared concurrently, treating as created");
            Ok(dir.to_path_buf())
        }
        Err(e) => Err(Error::io_at(dir, e)
            .with_context(format!("Cannot create directory {}", dir.display()))),
    }
}

/// Remove a file or an empty directory; fails when `path` is missing
pub fn delete(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match paths::file_kind(path)? {
        FileKind::Missing => Err(Error::file_not_found(path)),
        FileKind::Directory => fs::remove_dir(path).map_err(|e| Error::io_at(path, e)),
        FileKind::RegularFile | FileKind::Other => {
            fs::remove_file(path).map_err(|e| Error::io_at(path, e))
        }
    }
}

/// Like [`delete`], but a missing path is not an error
///
/// Returns whether something was removed.
pub fn delete_if_exists(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    if paths::file_kind(path)? == FileKind::Missing {
        return Ok(false);
    }
    delete(path)?;
    Ok(true)
}

/// Move `src` to `dst`
pub fn rename_to(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();
    debug!(from = %src.display(), to = %dst.display(), "Renaming");
    fs::rename(src, dst)
        .map_err(|e| Error::io_at(src, e))
        .context(format!("Renaming to {}", dst.display()))
}

/// Copy a regular file, overwriting `dst` and keeping permissions and timestamps
pub fn copy_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    fs::copy(src, dst)
        .map_err(|e| Error::io_at(src, e))
        .context(format!("Copying to {}", dst.display()))?;

    let meta = fs::metadata(src).map_err(|e| Error::io_at(src, e))?;
    filetime::set_file_times(
        dst,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )
    .map_err(|e| Error::io_at(dst, e))?;
    Ok(())
}

/// Copy `file` into `dir`, keeping its file name
pub fn copy_file_to_directory(file: impl AsRef<Path>, dir: impl AsRef<Path>) -> Result<()> {
    let file = file.as_ref();
    let dir = dir.as_ref();
    let name = file
        .file_name()
        .ok_or_else(|| Error::invalid_argument(format!("{} has no file name", file.display())))?;
    mkdirs(dir)?;
    copy_file(file, dir.join(name))
}

/// Merge-copy the tree under `src` into `dst`
///
/// Files from `src` overwrite same-named files under `dst`; anything else
/// already under `dst` is left alone. Children that are neither regular
/// files nor directories abort the copy.
pub fn copy_directory(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if !src.is_dir() {
        return Err(Error::invalid_argument(format!(
            "Source path is not a directory: {}",
            src.display()
        )));
    }
    if dst.exists() && !dst.is_dir() {
        return Err(Error::invalid_argument(format!(
            "Destination path exists and is not a directory: {}",
            dst.display()
        )));
    }

    debug!(from = %src.display(), to = %dst.display(), "Copying directory");
    mkdirs(dst)?;
    for entry in fs::read_dir(src).map_err(|e| Error::io_at(src, e))? {
        let entry = entry.map_err(|e| Error::io_at(src, e))?;
        let child = entry.path();
        let file_type = entry.file_type().map_err(|e| Error::io_at(&child, e))?;

        if file_type.is_file() {
            copy_file_to_directory(&child, dst)?;
        } else if file_type.is_dir() {
            copy_directory_to_directory(&child, dst)?;
        } else {
            return Err(Error::unsupported_child(&child));
        }
    }
    Ok(())
}

/// Copy `src` to `dir/<name of src>`
pub fn copy_directory_to_directory(src: impl AsRef<Path>, dir: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let name = src
        .file_name()
        .ok_or_else(|| Error::invalid_argument(format!("{} has no file name", src.display())))?;
    copy_directory(src, dir.as_ref().join(name))
}

/// Replicate the whole subtree of `src` under `dst`
///
/// Unlike [`copy_directory`], `dst` is not validated up front and children
/// that are neither files nor directories are skipped.
pub fn copy_directory_content_to_directory(
    src: impl AsRef<Path>,
    dst: impl AsRef<Path>,
) -> Result<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if !src.is_dir() {
        return Err(Error::invalid_argument(format!(
            "Source path is not a directory: {}",
            src.display()
        )));
    }

    let _timer = OpTimer::start("copy_directory_content_to_directory");
    for entry in walkdir::WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).map_err(|_| {
            Error::new(
                ErrorCode::Internal,
                format!("{} escaped {}", entry.path().display(), src.display()),
            )
        })?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            mkdirs(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                mkdirs(parent)?;
            }
            copy_file(entry.path(), &target)?;
        } else {
            debug!(path = %entry.path().display(), "Skipping special file");
        }
    }
    Ok(())
}

/// Create `file` with `content`; fails if it already exists
pub fn create_file(file: impl AsRef<Path>, content: &str) -> Result<()> {
    let file = file.as_ref();
    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
        mkdirs(parent)?;
    }

    let mut handle = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(file)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => Error::already_exists(file),
            _ => Error::io_at(file, e),
        })?;
    handle
        .write_all(content.as_bytes())
        .map_err(|e| Error::io_at(file, e))
}

/// Create or overwrite `file` with `content`, creating parents as needed
pub fn write_to_file(file: impl AsRef<Path>, content: &str) -> Result<()> {
    let file = file.as_ref();
    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
        mkdirs(parent)?;
    }
    fs::write(file, content).map_err(|e| Error::io_at(file, e))
}

/// Read a text file, normalizing `\r\n` and lone `\r` to `\n`
pub fn load_file_with_unix_line_separators(file: impl AsRef<Path>) -> Result<String> {
    let file = file.as_ref();
    let content = fs::read_to_string(file).map_err(|e| Error::io_at(file, e))?;
    Ok(normalize_line_separators(&content))
}

fn normalize_line_separators(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    out
}
