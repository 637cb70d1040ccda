//! Google Drive storage backend implementation.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use driveup_common::{Error, RemotePath, Result};

use crate::backend::StorageBackend;

use super::auth::Credentials;
use super::client::{DriveApi, DriveClient};
use super::config::GDriveConfig;

/// Google Drive storage backend.
///
/// Remote paths are resolved under a fixed root folder. Folder IDs are
/// looked up on every call and never cached.
pub struct GDriveStorage {
    api: Arc<dyn DriveApi>,
    root_folder_id: String,
}

impl GDriveStorage {
    /// Create a backend from environment configuration.
    ///
    /// # Errors
    /// - `GDRIVE_SERVICE_ACCOUNT_JSON` or `GDRIVE_ROOT_FOLDER_ID` missing
    /// - Credential file unreadable or invalid
    pub fn from_env() -> Result<Self> {
        Self::new(GDriveConfig::from_env()?)
    }

    /// Create a backend from explicit configuration.
    ///
    /// Loads the credential file; no network request is made until the
    /// first upload.
    pub fn new(config: GDriveConfig) -> Result<Self> {
        let credentials = Credentials::from_file(&config.credentials_path)?;
        info!(
            "Google Drive backend for {} rooted at folder {}",
            credentials.principal(),
            config.root_folder_id
        );
        let client = DriveClient::new(credentials)?;
        Ok(Self::with_api(Arc::new(client), config.root_folder_id))
    }

    /// Create a backend over any Drive API implementation.
    pub fn with_api(api: Arc<dyn DriveApi>, root_folder_id: impl Into<String>) -> Self {
        Self {
            api,
            root_folder_id: root_folder_id.into(),
        }
    }

    /// Return the ID of folder `name` under `parent_id`, creating it if absent.
    async fn ensure_folder(&self, name: &str, parent_id: &str) -> Result<String> {
        let matches = self.api.find_folders(name, parent_id).await?;

        if matches.len() > 1 {
            warn!(
                "{} folders named '{}' under {}; using {}",
                matches.len(),
                name,
                parent_id,
                matches[0].id
            );
        }

        if let Some(existing) = matches.into_iter().next() {
            debug!("Found folder '{}' ({})", name, existing.id);
            return Ok(existing.id);
        }

        let folder = self.api.create_folder(name, parent_id).await?;
        debug!("Created folder '{}' ({}) under {}", name, folder.id, parent_id);
        Ok(folder.id)
    }
}

#[async_trait]
impl StorageBackend for GDriveStorage {
    fn name(&self) -> &str {
        "gdrive"
    }

    async fn upload_file(&self, local_path: &Path, remote_path: &RemotePath) -> Result<()> {
        let file_name = remote_path
            .name()
            .ok_or_else(|| Error::InvalidInput("Remote path must name a file".to_string()))?;

        let mut parent_id = self.root_folder_id.clone();
        for folder in remote_path.folders() {
            parent_id = self.ensure_folder(folder, &parent_id).await?;
        }

        let file = self.api.create_file(file_name, &parent_id, local_path).await?;
        info!(
            "Uploaded {} to {} ({})",
            local_path.display(),
            remote_path,
            file.id
        );
        Ok(())
    }

    async fn delete_prefix(&self, remote_prefix: &RemotePath) -> Result<()> {
        // TODO: list and trash the subtree once deletion semantics are settled
        warn!(
            "Prefix deletion is not supported by the Google Drive backend; ignoring {}",
            remote_prefix
        );
        Ok(())
    }

    fn supports_prefix_delete(&self) -> bool {
        false
    }
}

/// Create a Google Drive backend from registry configuration.
///
/// `null` reads the process environment; an object is parsed as
/// [`GDriveConfig`].
pub fn create_gdrive_storage(config: serde_json::Value) -> Result<Arc<dyn StorageBackend>> {
    let storage = if config.is_null() {
        GDriveStorage::from_env()?
    } else {
        GDriveStorage::new(GDriveConfig::from_value(config)?)?
    };
    Ok(Arc::new(storage))
}
