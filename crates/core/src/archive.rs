//! Zip archives viewed as read-only file trees
//!
//! A [`ZipFileSystem`] owns the open archive until it is closed or dropped.
//! Prefer [`with_zip_filesystem`], which releases the archive on every exit
//! path of the closure, errors included.
//!
//! # Example
//!
//! ```rust,no_run
//! use treeops_core::archive::with_zip_filesystem;
//!
//! let manifest = with_zip_filesystem("libs/classes.jar", |zip| {
//!     zip.read_to_string("META-INF/MANIFEST.MF")
//! })?;
//! # Ok::<(), treeops_core::Error>(())
//! ```

use crate::config::{ArchiveConfig, Compression};
use crate::error::{Error, ErrorCode, Result, ResultExt};
use crate::logging::OpTimer;
use crate::paths::{self, to_system_independent_path};
use crate::tree::mkdirs;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Upper bound on the buffer preallocated for an entry read
const READ_CAPACITY_HINT: u64 = 1 << 20;

/// Read-only view of a zip archive
pub struct ZipFileSystem {
    path: PathBuf,
    archive: Option<ZipArchive<BufReader<File>>>,
}

impl std::fmt::Debug for ZipFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipFileSystem")
            .field("path", &self.path)
            .field("open", &self.archive.is_some())
            .finish()
    }
}

impl ZipFileSystem {
    /// Open `archive`; fails when it is unreadable or not a zip container
    pub fn open(archive: impl AsRef<Path>) -> Result<Self> {
        let path = archive.as_ref();
        let file = File::open(path).map_err(|e| Error::io_at(path, e))?;
        let archive = ZipArchive::new(BufReader::new(file))
            .map_err(Error::from)
            .context(format!("Opening archive {}", path.display()))?;

        debug!(path = %path.display(), entries = archive.len(), "Opened zip filesystem");
        Ok(Self {
            path: path.to_path_buf(),
            archive: Some(archive),
        })
    }

    /// Location of the archive on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn archive(&mut self) -> Result<&mut ZipArchive<BufReader<File>>> {
        let path = &self.path;
        self.archive.as_mut().ok_or_else(|| {
            Error::archive(format!("{} has already been closed", path.display()))
        })
    }

    /// Names of all entries, in archive order
    pub fn entries(&mut self) -> Result<Vec<String>> {
        let archive = self.archive()?;
        let mut names = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            names.push(archive.by_index(i)?.name().to_string());
        }
        Ok(names)
    }

    /// Whether an entry called `name` exists
    pub fn contains(&mut self, name: &str) -> Result<bool> {
        let archive = self.archive()?;
        Ok(archive.file_names().any(|n| n == name || n.trim_end_matches('/') == name))
    }

    /// Whether `name` is a directory entry
    pub fn is_dir(&mut self, name: &str) -> Result<bool> {
        let dir_name = format!("{}/", name.trim_end_matches('/'));
        let archive = self.archive()?;
        Ok(archive.file_names().any(|n| n == dir_name || n.starts_with(&dir_name)))
    }

    /// Full contents of the entry `name`
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>> {
        let archive = self.archive()?;
        let mut entry = archive
            .by_name(name)
            .map_err(Error::from)
            .context(format!("Reading entry {}", name))?;
        let mut contents = Vec::with_capacity(capacity_hint(entry.size()));
        entry.read_to_end(&mut contents)?;
        Ok(contents)
    }

    /// Entry `name` decoded as UTF-8
    pub fn read_to_string(&mut self, name: &str) -> Result<String> {
        let bytes = self.read(name)?;
        String::from_utf8(bytes).map_err(|e| {
            Error::new(ErrorCode::InvalidArchive, format!("Entry {} is not UTF-8", name))
                .with_source(e)
        })
    }

    /// Unpack every entry under `dest`
    ///
    /// Entries whose names would escape `dest` abort the extraction.
    pub fn extract_to(&mut self, dest: impl AsRef<Path>) -> Result<()> {
        let dest = dest.as_ref();
        mkdirs(dest)?;
        let archive = self.archive()?;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                return Err(Error::new(
                    ErrorCode::UnsafeArchiveEntry,
                    format!("Unsafe path in archive at entry {}: {}", i, entry.name()),
                ));
            };
            let out_path = dest.join(relative);

            if entry.is_dir() {
                mkdirs(&out_path)?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                mkdirs(parent)?;
            }

            let mut out_file = File::create(&out_path).map_err(|e| Error::io_at(&out_path, e))?;
            std::io::copy(&mut entry, &mut out_file).map_err(|e| Error::io_at(&out_path, e))?;
            apply_unix_mode(&out_path, entry.unix_mode())?;
        }
        Ok(())
    }

    /// Release the archive; later calls on this view fail
    pub fn close(mut self) -> Result<()> {
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        if self.archive.take().is_some() {
            debug!(path = %self.path.display(), "Closed zip filesystem");
        }
    }
}

impl Drop for ZipFileSystem {
    fn drop(&mut self) {
        self.release();
    }
}

/// Open `archive`, run `f` against it and release it whatever `f` returns
pub fn with_zip_filesystem<T>(
    archive: impl AsRef<Path>,
    f: impl FnOnce(&mut ZipFileSystem) -> Result<T>,
) -> Result<T> {
    let mut zip = ZipFileSystem::open(archive)?;
    let result = f(&mut zip);
    zip.close()?;
    result
}

/// Pack the tree under `src` into a new zip `archive`
///
/// Entries are written in depth-first pre-order with `/` separators and
/// directory entries included, so the same tree always yields the same
/// entry list. The archive is staged next to its destination and only
/// moved into place once every entry is written; on failure nothing is left
/// at `archive`. An `archive` located inside `src` is never packed into
/// itself.
pub fn zip_directory(
    src: impl AsRef<Path>,
    archive: impl AsRef<Path>,
    config: &ArchiveConfig,
) -> Result<()> {
    let src = src.as_ref();
    let archive = archive.as_ref();
    if !src.is_dir() {
        return Err(Error::not_a_directory(src).with_context("zip_directory"));
    }
    let parent = match archive.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            mkdirs(parent)?;
            parent
        }
        None => Path::new("."),
    };

    let _timer = OpTimer::start("zip_directory");
    let staging = NamedTempFile::new_in(parent).map_err(|e| Error::io_at(parent, e))?;
    let outputs = [archive.to_path_buf(), staging.path().to_path_buf()];
    let mut writer = ZipWriter::new(staging);
    let method = match config.compression {
        Compression::Stored => CompressionMethod::Stored,
        Compression::Deflated => CompressionMethod::Deflated,
    };

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if is_output(&entry, &outputs)? {
            continue;
        }
        let relative = entry.path().strip_prefix(src).map_err(|_| {
            Error::new(
                ErrorCode::Internal,
                format!("{} escaped {}", entry.path().display(), src.display()),
            )
        })?;
        let name = to_system_independent_path(&relative.to_string_lossy());
        let mut options = FileOptions::default().compression_method(method);
        if config.unix_permissions {
            options = options.unix_permissions(entry_mode(&entry)?);
        }

        if entry.file_type().is_dir() {
            writer.add_directory(format!("{}/", name), options)?;
        } else if entry.file_type().is_file() {
            writer.start_file(name, options)?;
            let mut input = File::open(entry.path()).map_err(|e| Error::io_at(entry.path(), e))?;
            std::io::copy(&mut input, &mut writer).map_err(|e| Error::io_at(entry.path(), e))?;
        } else {
            return Err(Error::unsupported_child(entry.path()));
        }
    }

    let staging = writer.finish()?;
    apply_unix_mode(staging.path(), Some(0o644))?;
    staging.persist(archive).map_err(|e| Error::io_at(archive, e.error))?;
    debug!(src = %src.display(), archive = %archive.display(), "Packed directory");
    Ok(())
}

/// Preallocation for an entry declaring `declared` uncompressed bytes
///
/// The declared size is read from the archive and may be forged.
fn capacity_hint(declared: u64) -> usize {
    declared.min(READ_CAPACITY_HINT) as usize
}

/// Whether `entry` is the archive being written or its staging file
fn is_output(entry: &walkdir::DirEntry, outputs: &[PathBuf]) -> Result<bool> {
    for output in outputs {
        if output.file_name() == Some(entry.file_name())
            && paths::is_same_file(entry.path(), output)?
        {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(unix)]
fn apply_unix_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))
            .map_err(|e| Error::io_at(path, e))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_unix_mode(_path: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn entry_mode(entry: &walkdir::DirEntry) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    let meta = entry.metadata()?;
    Ok(meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn entry_mode(entry: &walkdir::DirEntry) -> Result<u32> {
    Ok(if entry.file_type().is_dir() { 0o755 } else { 0o644 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn packed_fixture(temp: &TempDir) -> PathBuf {
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("META-INF")).unwrap();
        fs::create_dir_all(src.join("com/example")).unwrap();
        fs::write(src.join("META-INF/MANIFEST.MF"), "Manifest-Version: 1.0\n").unwrap();
        fs::write(src.join("com/example/A.class"), [0xCA, 0xFE, 0xBA, 0xBE]).unwrap();

        let jar = temp.path().join("out/classes.jar");
        zip_directory(&src, &jar, &ArchiveConfig::default()).unwrap();
        jar
    }

    #[test]
    fn test_zip_directory_entry_order() {
        let temp = TempDir::new().unwrap();
        let jar = packed_fixture(&temp);

        let mut zip = ZipFileSystem::open(&jar).unwrap();
        assert_eq!(
            zip.entries().unwrap(),
            vec![
                "META-INF/",
                "META-INF/MANIFEST.MF",
                "com/",
                "com/example/",
                "com/example/A.class"
            ]
        );
        zip.close().unwrap();
    }

    #[test]
    fn test_read_entries() {
        let temp = TempDir::new().unwrap();
        let jar = packed_fixture(&temp);

        let manifest = with_zip_filesystem(&jar, |zip| {
            assert!(zip.contains("com/example/A.class")?);
            assert!(zip.is_dir("com/example")?);
            assert!(!zip.is_dir("META-INF/MANIFEST.MF")?);
            assert_eq!(zip.read("com/example/A.class")?, vec![0xCA, 0xFE, 0xBA, 0xBE]);
            zip.read_to_string("META-INF/MANIFEST.MF")
        })
        .unwrap();
        assert_eq!(manifest, "Manifest-Version: 1.0\n");
    }

    #[test]
    fn test_scoped_view_released_on_error() {
        let temp = TempDir::new().unwrap();
        let jar = packed_fixture(&temp);

        let result = with_zip_filesystem(&jar, |zip| zip.read("missing.txt"));
        assert_eq!(result.unwrap_err().code, ErrorCode::FileNotFound);

        // The archive can be reopened and replaced once released
        with_zip_filesystem(&jar, |zip| zip.entries()).unwrap();
        fs::remove_file(&jar).unwrap();
    }

    #[test]
    fn test_extract_to() {
        let temp = TempDir::new().unwrap();
        let jar = packed_fixture(&temp);
        let dest = temp.path().join("exploded");

        with_zip_filesystem(&jar, |zip| zip.extract_to(&dest)).unwrap();
        assert_eq!(
            fs::read(dest.join("com/example/A.class")).unwrap(),
            vec![0xCA, 0xFE, 0xBA, 0xBE]
        );
        assert!(dest.join("META-INF").is_dir());
    }

    #[test]
    fn test_open_invalid_archive() {
        let temp = TempDir::new().unwrap();
        let bogus = temp.path().join("bogus.zip");
        fs::write(&bogus, "not a zip").unwrap();

        let err = ZipFileSystem::open(&bogus).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArchive);
        assert!(ZipFileSystem::open(temp.path().join("absent.zip")).is_err());
    }

    #[test]
    fn test_closed_view_rejects_calls() {
        let temp = TempDir::new().unwrap();
        let jar = packed_fixture(&temp);

        let mut zip = ZipFileSystem::open(&jar).unwrap();
        zip.release();
        assert_eq!(zip.entries().unwrap_err().code, ErrorCode::ArchiveError);
    }

    #[test]
    fn test_stored_compression() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("data.txt"), "stored").unwrap();
        let archive = temp.path().join("stored.zip");
        let config = ArchiveConfig {
            compression: Compression::Stored,
            unix_permissions: false,
        };

        zip_directory(&src, &archive, &config).unwrap();
        assert_eq!(
            with_zip_filesystem(&archive, |zip| zip.read_to_string("data.txt")).unwrap(),
            "stored"
        );
    }

    #[test]
    fn test_zip_directory_skips_archive_inside_source() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();
        let archive = src.join("out.zip");

        zip_directory(&src, &archive, &ArchiveConfig::default()).unwrap();
        // A second run finds the previous archive in the tree
        zip_directory(&src, &archive, &ArchiveConfig::default()).unwrap();

        let mut zip = ZipFileSystem::open(&archive).unwrap();
        assert_eq!(zip.entries().unwrap(), vec!["a.txt"]);
        assert_eq!(fs::read_dir(&src).unwrap().count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_zip_directory_leaves_nothing_on_failure() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();
        std::os::unix::fs::symlink(src.join("a.txt"), src.join("z.lnk")).unwrap();
        let out = temp.path().join("out");
        let archive = out.join("src.zip");

        let err = zip_directory(&src, &archive, &ArchiveConfig::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedChildType);
        assert!(!archive.exists());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_zip_directory_replaces_existing_archive() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("new.txt"), "new").unwrap();
        let archive = temp.path().join("out.zip");
        fs::write(&archive, "stale").unwrap();

        zip_directory(&src, &archive, &ArchiveConfig::default()).unwrap();
        assert_eq!(
            with_zip_filesystem(&archive, |zip| zip.entries()).unwrap(),
            vec!["new.txt"]
        );
    }

    #[test]
    fn test_capacity_hint_is_bounded() {
        assert_eq!(capacity_hint(0), 0);
        assert_eq!(capacity_hint(42), 42);
        assert_eq!(capacity_hint(u64::MAX), READ_CAPACITY_HINT as usize);
    }

    #[test]
    fn test_read_entry_with_forged_size() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("data.txt"), "tiny").unwrap();
        let archive = temp.path().join("forged.zip");
        let config = ArchiveConfig {
            compression: Compression::Stored,
            unix_permissions: false,
        };
        zip_directory(&src, &archive, &config).unwrap();

        // Uncompressed size field of the central directory header
        let mut bytes = fs::read(&archive).unwrap();
        let header = bytes
            .windows(4)
            .position(|w| w == b"PK\x01\x02")
            .unwrap();
        bytes[header + 24..header + 28].copy_from_slice(&0xFFFF_FFFEu32.to_le_bytes());
        fs::write(&archive, &bytes).unwrap();

        let data = with_zip_filesystem(&archive, |zip| zip.read("data.txt")).unwrap();
        assert_eq!(data, b"tiny");
    }
}
