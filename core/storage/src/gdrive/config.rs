//! Google Drive backend configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use driveup_common::{Error, Result};

/// Environment variable holding the credential file location.
pub const CREDENTIALS_ENV: &str = "GDRIVE_SERVICE_ACCOUNT_JSON";
/// Environment variable holding the root folder ID.
pub const ROOT_FOLDER_ENV: &str = "GDRIVE_ROOT_FOLDER_ID";

/// Google Drive backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GDriveConfig {
    /// Path to a Google credential JSON file.
    pub credentials_path: PathBuf,
    /// Drive folder ID that remote paths are resolved under.
    pub root_folder_id: String,
}

impl GDriveConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// - Either variable is missing or empty
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !is_blank(v))
                .ok_or_else(|| Error::Config(format!("{} is not set", key)))
        };

        Ok(Self {
            credentials_path: PathBuf::from(required(CREDENTIALS_ENV)?),
            root_folder_id: required(ROOT_FOLDER_ENV)?,
        })
    }

    /// Parse configuration from a JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("Invalid GDrive config: {}", e)))?;
        if is_blank(&config.root_folder_id) {
            return Err(Error::Config("root_folder_id cannot be empty".to_string()));
        }
        if is_blank(&config.credentials_path.to_string_lossy()) {
            return Err(Error::Config("credentials_path cannot be empty".to_string()));
        }
        Ok(config)
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
