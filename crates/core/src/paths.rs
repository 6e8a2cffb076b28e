//! Path manipulation
//!
//! Pure string/path helpers (joining, separator translation, file name
//! sanitizing) plus the canonical-path based predicates. Separator handling
//! always goes through [`MAIN_SEPARATOR`] at call time, and every translation
//! has a `_with` variant taking the separator explicitly.

use crate::error::{Error, Result};
use std::path::{Component, MAIN_SEPARATOR, MAIN_SEPARATOR_STR, Path, PathBuf};

/// Characters not allowed in file names on at least one supported platform
const ILLEGAL_FILE_NAME_CHARS: [char; 10] = [':', '\\', '/', '*', '"', '?', '|', '<', '>', '\''];

/// Kind of filesystem object a path refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    RegularFile,
    Directory,
    Missing,
    /// Symbolic link, device, socket or fifo
    Other,
}

/// Inspect `path` without following a final symbolic link
pub fn file_kind(path: impl AsRef<Path>) -> Result<FileKind> {
    let path = path.as_ref();
    match std::fs::symlink_metadata(path) {
        Ok(meta) => {
            let file_type = meta.file_type();
            Ok(if file_type.is_file() {
                FileKind::RegularFile
            } else if file_type.is_dir() {
                FileKind::Directory
            } else {
                FileKind::Other
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileKind::Missing),
        Err(e) => Err(Error::io_at(path, e)),
    }
}

/// Join `segments` onto `base`, skipping empty segments
pub fn join(base: impl AsRef<Path>, segments: &[&str]) -> PathBuf {
    let joined = join_segments(segments);
    if joined.is_empty() {
        base.as_ref().to_path_buf()
    } else {
        base.as_ref().join(joined)
    }
}

/// Join path segments with the host separator, skipping empty segments
pub fn join_segments(segments: &[&str]) -> String {
    segments
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(MAIN_SEPARATOR_STR)
}

/// Translate `/` into the host separator
pub fn to_system_dependent_path(path: &str) -> String {
    to_system_dependent_path_with(path, MAIN_SEPARATOR)
}

/// Translate `/` into `separator`
pub fn to_system_dependent_path_with(path: &str, separator: char) -> String {
    path.chars()
        .map(|c| if c == '/' { separator } else { c })
        .collect()
}

/// Translate the host separator into `/`
pub fn to_system_independent_path(path: &str) -> String {
    to_system_independent_path_with(path, MAIN_SEPARATOR)
}

/// Translate `separator` into `/`
pub fn to_system_independent_path_with(path: &str, separator: char) -> String {
    path.chars()
        .map(|c| if c == separator { '/' } else { c })
        .collect()
}

/// Replace every character that is illegal in a file name with `_`
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if ILLEGAL_FILE_NAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Path of `file` relative to `dir`, using the host separator
///
/// Both paths must exist and `dir` must be a directory. When `file` is itself
/// a directory the result carries a trailing separator, so callers can tell
/// `lib/` from `lib`. A `file` outside `dir` is rejected.
pub fn relative_path(file: impl AsRef<Path>, dir: impl AsRef<Path>) -> Result<String> {
    let file = file.as_ref();
    let dir = dir.as_ref();

    if !file.is_file() && !file.is_dir() {
        return Err(Error::file_not_found(file).with_context("relative_path: file must exist"));
    }
    if !dir.is_dir() {
        return Err(Error::not_a_directory(dir).with_context("relative_path: base must be a directory"));
    }

    let relative = lexical_relative(file, dir)?;
    let mut rendered = render_components(&relative);
    if file.is_dir() && !rendered.is_empty() {
        rendered.push(MAIN_SEPARATOR);
    }
    Ok(rendered)
}

/// Lexical counterpart of [`relative_path`]: neither path needs to exist
pub fn relative_possibly_non_existing_path(
    file: impl AsRef<Path>,
    dir: impl AsRef<Path>,
) -> Result<String> {
    let relative = lexical_relative(file.as_ref(), dir.as_ref())?;
    Ok(render_components(&relative))
}

fn lexical_relative(file: &Path, dir: &Path) -> Result<PathBuf> {
    let file_abs = normalize_lexically(&std::path::absolute(file)?);
    let dir_abs = normalize_lexically(&std::path::absolute(dir)?);

    file_abs
        .strip_prefix(&dir_abs)
        .map(Path::to_path_buf)
        .map_err(|_| {
            Error::invalid_argument(format!(
                "{} is not located under {}",
                file.display(),
                dir.display()
            ))
        })
}

fn render_components(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(MAIN_SEPARATOR_STR)
}

/// Drop `.` components and resolve `..` against preceding components
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Canonical form of `path`, which does not need to exist
///
/// The deepest existing ancestor is resolved by the filesystem (symbolic
/// links followed), the remaining components are normalized lexically.
/// Ancestors that do not resolve because they are missing or sit below a
/// regular file are skipped.
pub fn canonical_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let absolute = std::path::absolute(path).map_err(|e| Error::io_at(path, e))?;

    for ancestor in absolute.ancestors() {
        match dunce::canonicalize(ancestor) {
            Ok(resolved) => {
                let rest = absolute.strip_prefix(ancestor).unwrap_or(Path::new(""));
                let mut canonical = resolved;
                for component in rest.components() {
                    match component {
                        Component::CurDir => {}
                        Component::ParentDir => {
                            canonical.pop();
                        }
                        other => canonical.push(other),
                    }
                }
                return Ok(canonical);
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
                ) =>
            {
                continue;
            }
            Err(e) => return Err(Error::io_at(ancestor, e)),
        }
    }

    Ok(normalize_lexically(&absolute))
}

/// Whether the canonical parent of `path` exists
pub fn parent_dir_exists(path: impl AsRef<Path>) -> Result<bool> {
    let canonical = canonical_path(path)?;
    Ok(canonical.parent().is_some_and(Path::exists))
}

/// Whether `dir` is an ancestor of `file` once both are canonicalized
pub fn is_file_in_directory(file: impl AsRef<Path>, dir: impl AsRef<Path>) -> Result<bool> {
    let file = canonical_path(file)?;
    let dir = canonical_path(dir)?;
    Ok(file.ancestors().skip(1).any(|ancestor| ancestor == dir))
}

/// Whether `a` and `b` refer to the same physical file
///
/// Uses the native identity check when both exist, canonical path equality
/// otherwise.
pub fn is_same_file(a: impl AsRef<Path>, b: impl AsRef<Path>) -> Result<bool> {
    let a = a.as_ref();
    let b = b.as_ref();
    if a.exists() && b.exists() {
        native_same_file(a, b)
    } else {
        Ok(canonical_path(a)? == canonical_path(b)?)
    }
}

#[cfg(unix)]
fn native_same_file(a: &Path, b: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let meta_a = std::fs::metadata(a).map_err(|e| Error::io_at(a, e))?;
    let meta_b = std::fs::metadata(b).map_err(|e| Error::io_at(b, e))?;
    Ok(meta_a.dev() == meta_b.dev() && meta_a.ino() == meta_b.ino())
}

#[cfg(not(unix))]
fn native_same_file(a: &Path, b: &Path) -> Result<bool> {
    Ok(canonical_path(a)? == canonical_path(b)?)
}
