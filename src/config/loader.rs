//! Configuration loading from disk or from inline base64 text.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use thiserror::Error;

use crate::config::schema::Configuration;
use crate::config::validation::{check_upstreams, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(#[from] serde_yaml::Error),

    #[error("invalid inline config: {0}")]
    Decode(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Load and validate configuration from a YAML file.
///
/// An empty file is an empty configuration, not an error.
pub fn load_config(path: &Path) -> Result<Configuration, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            LoadError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            LoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    tracing::info!(path = %path.display(), "Loading config");
    parse_config(&content)
}

/// Load configuration from base64-encoded YAML.
pub fn decode_inline(encoded: &str) -> Result<Configuration, LoadError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| LoadError::Decode(e.to_string()))?;
    let content = String::from_utf8(bytes).map_err(|e| LoadError::Decode(e.to_string()))?;

    parse_config(&content)
}

/// Parse YAML text and check upstream schemes.
pub fn parse_config(content: &str) -> Result<Configuration, LoadError> {
    if content.trim().is_empty() {
        return Ok(Configuration::default());
    }

    let config: Configuration = serde_yaml::from_str(content)?;
    check_upstreams(&config.upstreams)?;

    tracing::debug!(
        upstreams = config.upstreams.len(),
        rules = config.rules.len(),
        "Config parsed"
    );
    Ok(config)
}

impl Configuration {
    /// Render the configuration in the source file format.
    pub fn dump(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Write the configuration to `path`, readable by the owner only.
    pub fn write_to(&self, path: &Path) -> Result<(), io::Error> {
        let content = self
            .dump()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}
