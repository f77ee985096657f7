//! Engine configuration.
//!
//! # Responsibility
//! - Describe the actor stamp, audit report labels, index sync switch and
//!   logging settings of a transfer service.
//! - Load them from JSON and reject unusable values before any request runs.
//!
//! # Invariants
//! - Every field has a default, so `{}` is a complete configuration.
//! - A config that passed [`TransferConfig::validate`] never makes
//!   [`crate::logging::init_logging`] fail on level or directory shape.

use crate::logging::{default_log_level, normalize_level};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_ACTOR: &str = "transfer";
pub const DEFAULT_REPORT_NAME: &str = "TransferReport";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Logging backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Rolling log file directory; logs go to stderr when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Written to `created_by`/`last_updated_by` and the change log.
    pub actor: String,
    pub report_file_name: String,
    pub report_type: String,
    /// Run search index maintenance after each committed transfer.
    pub sync_index: bool,
    pub logging: LoggingConfig,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            actor: DEFAULT_ACTOR.to_string(),
            report_file_name: DEFAULT_REPORT_NAME.to_string(),
            report_type: DEFAULT_REPORT_NAME.to_string(),
            sync_index: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl TransferConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("actor", &self.actor),
            ("report_file_name", &self.report_file_name),
            ("report_type", &self.report_type),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("`{name}` cannot be blank")));
            }
        }
        normalize_level(&self.logging.level).map_err(ConfigError::Invalid)?;
        if let Some(log_dir) = &self.logging.log_dir {
            if !log_dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "`logging.log_dir` must be absolute, got `{}`",
                    log_dir.display()
                )));
            }
        }
        Ok(())
    }
}
