//! Configuration schema definitions

use serde::{Deserialize, Serialize};

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Show the module path of each event
    #[serde(default)]
    pub show_target: bool,

    /// Show source file names
    #[serde(default)]
    pub show_file: bool,

    /// Show source line numbers
    #[serde(default)]
    pub show_line_number: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            show_target: false,
            show_file: false,
            show_line_number: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Compression used for archive entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Stored,
    #[default]
    Deflated,
}

/// Archive packing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Entry compression
    #[serde(default)]
    pub compression: Compression,

    /// Record unix permission bits on entries
    #[serde(default = "default_true")]
    pub unix_permissions: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            unix_permissions: true,
        }
    }
}

fn default_true() -> bool {
    true
}
