//! Error handling with codes, context and recovery suggestions
//!
//! Every file tree operation reports failures through [`Error`]. The
//! [`ErrorCode`] tells callers whether a precondition on the arguments was
//! violated (wrong file kind, target already present) or whether the
//! filesystem itself failed underneath a valid request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // General errors (1xxx)
    Unknown = 1000,
    Internal = 1001,

    // IO errors (2xxx)
    IoError = 2000,
    FileNotFound = 2001,
    PermissionDenied = 2002,
    InvalidPath = 2003,
    DirectoryNotFound = 2004,

    // Configuration errors (3xxx)
    ConfigError = 3000,
    ConfigParseError = 3002,

    // Precondition errors (4xxx)
    InvalidArgument = 4000,
    NotADirectory = 4001,
    AlreadyExists = 4002,
    UnsupportedChildType = 4003,
    InvalidPattern = 4004,

    // Archive errors (5xxx)
    ArchiveError = 5000,
    InvalidArchive = 5001,
    UnsafeArchiveEntry = 5002,
}

impl ErrorCode {
    /// Get the numeric code
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get a human-readable category
    pub fn category(&self) -> &'static str {
        match self.code() / 1000 {
            1 => "General",
            2 => "IO",
            3 => "Configuration",
            4 => "Precondition",
            5 => "Archive",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

/// Main error type with rich context
#[derive(Error, Debug)]
pub struct Error {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Additional context
    pub context: Option<String>,
    /// Recovery suggestion
    pub suggestion: Option<String>,
    /// Source error
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ctx) = &self.context {
            write!(f, "\n  Context: {}", ctx)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }
        Ok(())
    }
}

impl Error {
    /// Create a new error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            suggestion: None,
            source: None,
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a recovery suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether the error is a violated precondition rather than an I/O fault
    pub fn is_precondition(&self) -> bool {
        self.code.category() == "Precondition"
    }

    /// Convert to a serializable report
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code,
            code_str: self.code.to_string(),
            category: self.code.category().to_string(),
            message: self.message.clone(),
            context: self.context.clone(),
            suggestion: self.suggestion.clone(),
            source: self.source.as_ref().map(|e| e.to_string()),
        }
    }

    // Convenience constructors

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IoError, message)
    }

    /// Wrap an I/O error raised while operating on `path`
    pub fn io_at(path: impl AsRef<Path>, err: std::io::Error) -> Self {
        let path = path.as_ref();
        let code = io_error_code(&err);
        Self::new(code, format!("{}: {}", path.display(), err)).with_source(err)
    }

    pub fn file_not_found(path: impl AsRef<Path>) -> Self {
        Self::new(
            ErrorCode::FileNotFound,
            format!("File not found: {}", path.as_ref().display()),
        )
        .with_suggestion("Check that the file exists and you have read permissions")
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn not_a_directory(path: impl AsRef<Path>) -> Self {
        Self::new(
            ErrorCode::NotADirectory,
            format!("Not a directory: {}", path.as_ref().display()),
        )
    }

    pub fn already_exists(path: impl AsRef<Path>) -> Self {
        Self::new(
            ErrorCode::AlreadyExists,
            format!("{} exists already", path.as_ref().display()),
        )
        .with_suggestion("Delete the existing file first or use write_to_file to overwrite it")
    }

    pub fn unsupported_child(path: impl AsRef<Path>) -> Self {
        Self::new(
            ErrorCode::UnsupportedChildType,
            format!("Don't know how to copy {}", path.as_ref().display()),
        )
        .with_suggestion("Only regular files and directories can be copied")
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    pub fn archive(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ArchiveError, message)
    }
}

fn io_error_code(err: &std::io::Error) -> ErrorCode {
    match err.kind() {
        std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
        std::io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
        _ => ErrorCode::IoError,
    }
}

/// Serializable error report for logging and API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub code_str: String,
    pub category: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

// Implement From for common error types

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let code = io_error_code(&err);
        Error::new(code, err.to_string()).with_source(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        let message = match err.path() {
            Some(path) => format!("Failed to traverse {}: {}", path.display(), err),
            None => format!("Failed to traverse directory tree: {}", err),
        };
        Error::new(ErrorCode::IoError, message).with_source(err)
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        let code = match err {
            zip::result::ZipError::Io(_) => ErrorCode::IoError,
            zip::result::ZipError::InvalidArchive(_)
            | zip::result::ZipError::UnsupportedArchive(_) => ErrorCode::InvalidArchive,
            zip::result::ZipError::FileNotFound => ErrorCode::FileNotFound,
            #[allow(unreachable_patterns)]
            _ => ErrorCode::ArchiveError,
        };
        Error::new(code, format!("Zip error: {}", err)).with_source(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::new(ErrorCode::ConfigParseError, format!("TOML parse error: {}", err))
            .with_source(err)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::new(ErrorCode::InvalidPattern, format!("Regex error: {}", err)).with_source(err)
    }
}

impl From<glob::PatternError> for Error {
    fn from(err: glob::PatternError) -> Self {
        Error::new(ErrorCode::InvalidPattern, format!("Glob error: {}", err)).with_source(err)
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
    fn with_suggestion(self, suggestion: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_suggestion(self, suggestion: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_suggestion(suggestion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::FileNotFound.to_string(), "E2001");
        assert_eq!(ErrorCode::AlreadyExists.to_string(), "E4002");
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::IoError.category(), "IO");
        assert_eq!(ErrorCode::UnsupportedChildType.category(), "Precondition");
        assert_eq!(ErrorCode::InvalidArchive.category(), "Archive");
    }

    #[test]
    fn test_precondition_vs_io() {
        assert!(Error::already_exists("/tmp/x").is_precondition());
        assert!(Error::not_a_directory("/tmp/x").is_precondition());
        assert!(!Error::io("disk full").is_precondition());
    }

    #[test]
    fn test_io_error_mapping() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.code, ErrorCode::FileNotFound);

        let err = Error::io_at(
            "/locked",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert_eq!(err.code, ErrorCode::PermissionDenied);
        assert!(err.message.contains("/locked"));
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::file_not_found("/path/to/file").with_context("While hashing artifact");

        assert_eq!(err.code, ErrorCode::FileNotFound);
        assert!(err.context.is_some());
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn test_error_report_serialization() {
        let err = Error::unsupported_child("/src/link").with_context("During copy_directory");

        let report = err.to_report();
        let json = serde_json::to_string(&report).unwrap();

        assert!(json.contains("E4003"));
        assert!(json.contains("Precondition"));
    }
}
