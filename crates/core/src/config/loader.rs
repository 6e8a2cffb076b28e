//! Configuration file loading

use super::schema::ConfigSchema;
use crate::error::{Error, ErrorCode, Result, ResultExt};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Configuration wrapper
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub schema: ConfigSchema,
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file path or the first standard location
    /// found; defaults when there is none
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).or_else(find_config_file);

        let schema = if let Some(ref p) = config_path {
            load_config_file(p)?
        } else {
            ConfigSchema::default()
        };

        Ok(Self {
            schema,
            path: config_path,
        })
    }

    /// Like [`Config::load`], but an unreadable or malformed file is logged
    /// and replaced by defaults
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "Failed to load configuration, using defaults");
                Self::default()
            }
        }
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<PathBuf> {
    let local = ["treeops.toml", ".treeops.toml", ".config/treeops.toml"]
        .into_iter()
        .map(PathBuf::from);
    let user = dirs::config_dir().map(|d| d.join("treeops").join("config.toml"));

    local.chain(user).find(|candidate| candidate.exists())
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &Path) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::new(
            ErrorCode::ConfigError,
            format!("Failed to read config file {}: {}", path.display(), e),
        )
        .with_source(e)
    })?;

    toml::from_str(&content)
        .map_err(Error::from)
        .context(format!("Parsing config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Compression, LoggingConfig};
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.path.is_none());
        assert_eq!(config.schema.logging.level, "info");
        assert_eq!(config.schema.archive.compression, Compression::Deflated);
    }

    #[test]
    fn test_config_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("treeops.toml");
        std::fs::write(
            &path,
            "[logging]\nlevel = \"debug\"\n\n[archive]\ncompression = \"stored\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.schema.logging.level, "debug");
        assert_eq!(config.schema.archive.compression, Compression::Stored);
        assert!(config.schema.archive.unix_permissions);
        assert_eq!(config.path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_config_parse_error_is_fatal() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.toml");
        std::fs::write(&path, "[archive\ncompression = ").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigParseError);
        assert!(err.context.as_deref().unwrap().contains("broken.toml"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_config_load_or_default_falls_back() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.toml");

        let config = Config::load_or_default(Some(&missing));
        assert!(config.path.is_none());
        assert_eq!(config.schema.logging, LoggingConfig::default());
    }
}
