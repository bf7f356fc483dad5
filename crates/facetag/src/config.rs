//! Configuration for a facetag workspace.
//!
//! ```toml
//! documents_dir = "documents"
//! database_path = "facetag.db"
//! fingerprint_precision = 4
//! log_filter = "info"
//! ```

use std::env;
use std::path::{Path, PathBuf};

use facetag_ir::DEFAULT_PRECISION;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from reading or writing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The TOML is malformed or has wrongly typed fields.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serialization failed.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Workspace configuration. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetagConfig {
    /// Directory holding `<document_id>.step` files.
    pub documents_dir: PathBuf,
    /// SQLite database of the fingerprint store.
    pub database_path: PathBuf,
    /// Decimal places kept when fingerprinting geometry.
    pub fingerprint_precision: u32,
    /// Default `tracing` filter for the command-line tool.
    pub log_filter: String,
}

impl Default for FacetagConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("documents"),
            database_path: PathBuf::from("facetag.db"),
            fingerprint_precision: DEFAULT_PRECISION,
            log_filter: "info".to_string(),
        }
    }
}

impl FacetagConfig {
    /// Highest accepted `fingerprint_precision`.
    pub const MAX_PRECISION: u32 = 12;

    /// Read configuration from a TOML file. A missing file yields the
    /// defaults; an unreadable or malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fingerprint_precision > Self::MAX_PRECISION {
            return Err(ConfigError::Invalid(format!(
                "fingerprint_precision {} exceeds {}",
                self.fingerprint_precision,
                Self::MAX_PRECISION
            )));
        }
        if self.documents_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("documents_dir is empty".into()));
        }
        Ok(())
    }

    /// Apply environment overrides.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `FACETAG_DOCUMENTS_DIR` | `documents_dir` |
    /// | `FACETAG_DATABASE` | `database_path` |
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = env::var("FACETAG_DOCUMENTS_DIR") {
            self.documents_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("FACETAG_DATABASE") {
            self.database_path = PathBuf::from(val);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FacetagConfig::default();
        assert_eq!(config.documents_dir, PathBuf::from("documents"));
        assert_eq!(config.database_path, PathBuf::from("facetag.db"));
        assert_eq!(config.fingerprint_precision, 4);
        assert_eq!(config.log_filter, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = FacetagConfig::from_toml_str("database_path = \"/var/lib/facetag.db\"").unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/facetag.db"));
        assert_eq!(config.documents_dir, PathBuf::from("documents"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            FacetagConfig::from_toml_str("fingerprint_precision = 40"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FacetagConfig::from_toml_str("fingerprint_precision = \"four\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = FacetagConfig {
            fingerprint_precision: 6,
            ..FacetagConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(FacetagConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = FacetagConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, FacetagConfig::default());

        let path = dir.path().join("facetag.toml");
        std::fs::write(&path, "log_filter = \"debug\"\n").unwrap();
        assert_eq!(FacetagConfig::load(&path).unwrap().log_filter, "debug");
    }
}
