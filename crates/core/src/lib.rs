//! Fail-fast file tree operations for build tool plugins
//!
//! This crate provides the filesystem primitives a build plugin reaches for
//! while staging publishable artifacts and exploding dependency archives:
//!
//! - **Tree operations**: recursive delete, clean, merge-copy, create and write
//! - **Paths**: joining, separator translation, relative and canonical paths
//! - **File scanning**: restartable pre-order traversal and lookup by name or pattern
//! - **Hashing**: file digests and stable extraction directory names for jars
//! - **Archives**: zip files as scoped read-only trees, directory packing
//! - **Configuration**: TOML-based settings with best-effort loading
//!
//! Every operation is synchronous and independent. Failures are returned as
//! [`Error`] values whose [`ErrorCode`] separates violated preconditions from
//! I/O faults.
//!
//! # Example
//!
//! ```rust,no_run
//! use treeops_core::{file_scanner, hash, tree};
//!
//! tree::clean_output_dir("build/intermediates/staged")?;
//! tree::copy_directory("build/classes", "build/intermediates/staged")?;
//!
//! for file in file_scanner::all_files("build/intermediates/staged").iter() {
//!     println!("{} {}", hash::sha1(&file)?, file.display());
//! }
//! # Ok::<(), treeops_core::Error>(())
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod config;
pub mod error;
pub mod file_scanner;
pub mod hash;
pub mod logging;
pub mod paths;
pub mod tree;

pub use error::{Error, ErrorCode, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::archive::{with_zip_filesystem, zip_directory, ZipFileSystem};
    pub use crate::config::{ArchiveConfig, Compression, Config, LoggingConfig};
    pub use crate::error::{Error, ErrorCode, Result, ResultExt};
    pub use crate::file_scanner::{all_files, find_by_name, find_matching, FileScanner};
    pub use crate::hash::{directory_name_for_jar, sha1, ArchiveLayout};
    pub use crate::paths::{join, relative_path, FileKind};
    pub use crate::tree::{clean_output_dir, copy_directory, copy_file, delete_path, mkdirs};
}
