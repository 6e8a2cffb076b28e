//! Directory traversal and lookup
//!
//! All traversals are depth-first pre-order with siblings visited in file
//! name order, so results are stable across runs and platforms. A
//! [`FileScanner`] holds only its configuration: every call to
//! [`FileScanner::iter`] walks the tree again, nothing is cached.
//!
//! Symbolic links are never descended into. A link whose target is a
//! regular file is yielded as a file, under the link's own path.

use crate::error::{Error, Result};
use crate::paths::to_system_independent_path;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Restartable, lazy sequence of the regular files under a root directory
#[derive(Debug, Clone)]
pub struct FileScanner {
    root: PathBuf,
    extensions: Vec<String>,
    exclude_patterns: Vec<glob::Pattern>,
    include_hidden: bool,
}

impl FileScanner {
    /// Create a new file scanner rooted at the given path
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: Vec::new(),
            exclude_patterns: Vec::new(),
            include_hidden: true,
        }
    }

    /// Filter by file extensions (e.g., "jar", "so", "class")
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Exclude files whose `/`-separated path relative to the root matches
    /// one of the glob patterns
    pub fn exclude(mut self, patterns: &[&str]) -> Result<Self> {
        self.exclude_patterns = patterns
            .iter()
            .map(|p| glob::Pattern::new(p))
            .collect::<std::result::Result<_, _>>()?;
        Ok(self)
    }

    /// Whether to descend into dot-directories and yield dot-files
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Root the scanner walks from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree, yielding regular files lazily
    ///
    /// Entries that cannot be read are logged and skipped.
    pub fn iter(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| self.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "Skipping unreadable entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file() || (e.path_is_symlink() && e.path().is_file()))
            .map(walkdir::DirEntry::into_path)
            .filter(move |path| self.accepts(path))
    }

    /// Collect every matching file
    pub fn scan(&self) -> Vec<PathBuf> {
        self.iter().collect()
    }

    fn accepts(&self, path: &Path) -> bool {
        if !self.extensions.is_empty() {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !self.extensions.iter().any(|e| e == ext) {
                return false;
            }
        }

        if self.exclude_patterns.is_empty() {
            return true;
        }
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let relative = to_system_independent_path(&relative.to_string_lossy());
        !self.exclude_patterns.iter().any(|p| p.matches(&relative))
    }
}

impl<'a> IntoIterator for &'a FileScanner {
    type Item = PathBuf;
    type IntoIter = Box<dyn Iterator<Item = PathBuf> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') && n != "." && n != "..")
        .unwrap_or(false)
}

/// Every regular file under `dir`, hidden ones included
pub fn all_files(dir: impl Into<PathBuf>) -> FileScanner {
    FileScanner::new(dir)
}

fn require_directory(base: &Path) -> Result<()> {
    if base.is_dir() {
        Ok(())
    } else {
        Err(Error::not_a_directory(base))
    }
}

fn pre_order(base: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(base)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.into_path()),
            Err(err) => {
                warn!(error = %err, "Skipping unreadable entry");
                None
            }
        })
}

/// All paths under `base` (itself included) whose `/`-separated form
/// contains a match for `pattern`
pub fn find_matching(base: impl AsRef<Path>, pattern: &Regex) -> Result<Vec<PathBuf>> {
    let base = base.as_ref();
    require_directory(base)?;

    Ok(pre_order(base)
        .filter(|path| pattern.is_match(&to_system_independent_path(&path.to_string_lossy())))
        .collect())
}

/// Last path under `base` in pre-order whose file name is exactly `name`
pub fn find_by_name(base: impl AsRef<Path>, name: &str) -> Result<Option<PathBuf>> {
    let base = base.as_ref();
    require_directory(base)?;

    Ok(pre_order(base)
        .filter(|path| path.file_name().is_some_and(|n| n == name))
        .last())
}

/// Regular files under `base` whose `/`-separated path relative to `base`
/// matches the glob `pattern`
pub fn find_glob(base: impl AsRef<Path>, pattern: &str) -> Result<Vec<PathBuf>> {
    let base = base.as_ref();
    require_directory(base)?;
    let glob_pattern = glob::Pattern::new(pattern)?;

    Ok(all_files(base)
        .iter()
        .filter(|path| {
            let relative = path.strip_prefix(base).unwrap_or(path);
            glob_pattern.matches(&to_system_independent_path(&relative.to_string_lossy()))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::create_dir_all(root.join("c")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("a/b/AndroidManifest.xml"), "1").unwrap();
        fs::write(root.join("a/lib.jar"), "2").unwrap();
        fs::write(root.join("c/AndroidManifest.xml"), "3").unwrap();
        fs::write(root.join(".git/config"), "4").unwrap();
        fs::write(root.join("z.txt"), "5").unwrap();
        temp
    }

    fn relative(root: &Path, paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| to_system_independent_path(&p.strip_prefix(root).unwrap().to_string_lossy()))
            .collect()
    }

    #[test]
    fn test_all_files_pre_order() {
        let temp = fixture();
        let files = all_files(temp.path()).scan();

        assert_eq!(
            relative(temp.path(), &files),
            vec![".git/config", "a/b/AndroidManifest.xml", "a/lib.jar", "c/AndroidManifest.xml", "z.txt"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_all_files_yields_links_to_files() {
        let temp = fixture();
        let root = temp.path();
        std::os::unix::fs::symlink(root.join("z.txt"), root.join("c/link.txt")).unwrap();
        std::os::unix::fs::symlink(root.join("a"), root.join("c/linked_dir")).unwrap();
        std::os::unix::fs::symlink(root.join("gone"), root.join("c/dangling")).unwrap();

        let files = all_files(root).scan();
        assert_eq!(
            relative(root, &files),
            vec![
                ".git/config",
                "a/b/AndroidManifest.xml",
                "a/lib.jar",
                "c/AndroidManifest.xml",
                "c/link.txt",
                "z.txt"
            ]
        );
    }

    #[test]
    fn test_all_files_is_restartable() {
        let temp = fixture();
        let scanner = all_files(temp.path());

        let first: Vec<_> = scanner.iter().collect();
        fs::write(temp.path().join("c/new.txt"), "6").unwrap();
        let second: Vec<_> = (&scanner).into_iter().collect();

        assert_eq!(first.len() + 1, second.len());
    }

    #[test]
    fn test_scanner_filters() {
        let temp = fixture();

        let jars = FileScanner::new(temp.path()).with_extensions(&["jar"]).scan();
        assert_eq!(relative(temp.path(), &jars), vec!["a/lib.jar"]);

        let visible = FileScanner::new(temp.path())
            .include_hidden(false)
            .exclude(&["c/**"])
            .unwrap()
            .scan();
        assert_eq!(
            relative(temp.path(), &visible),
            vec!["a/b/AndroidManifest.xml", "a/lib.jar", "z.txt"]
        );
    }

    #[test]
    fn test_find_matching() {
        let temp = fixture();
        let pattern = Regex::new(r"/a/b").unwrap();

        let found = find_matching(temp.path(), &pattern).unwrap();
        assert_eq!(relative(temp.path(), &found), vec!["a/b", "a/b/AndroidManifest.xml"]);
    }

    #[test]
    fn test_find_by_name_returns_last_in_pre_order() {
        let temp = fixture();

        let found = find_by_name(temp.path(), "AndroidManifest.xml").unwrap().unwrap();
        assert_eq!(found, temp.path().join("c/AndroidManifest.xml"));
        assert!(find_by_name(temp.path(), "missing.xml").unwrap().is_none());
    }

    #[test]
    fn test_find_requires_directory() {
        let temp = fixture();
        let err = find_by_name(temp.path().join("z.txt"), "z.txt").unwrap_err();
        assert_eq!(err.code, ErrorCode::NotADirectory);
        assert!(find_matching(temp.path().join("nope"), &Regex::new("x").unwrap()).is_err());
    }

    #[test]
    fn test_find_glob() {
        let temp = fixture();
        let found = find_glob(temp.path(), "**/AndroidManifest.xml").unwrap();
        assert_eq!(found.len(), 2);
        assert!(find_glob(temp.path(), "[").is_err());
    }
}
