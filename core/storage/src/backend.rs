//! Storage backend trait definition.

use async_trait::async_trait;
use std::path::Path;

use driveup_common::{RemotePath, Result};

/// A pluggable upload target.
///
/// Implementations own their authentication and the mapping from
/// [`RemotePath`] onto their native namespace.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Get the backend name (e.g., "gdrive", "local").
    fn name(&self) -> &str;

    /// Copy a local file to the given remote path.
    ///
    /// # Preconditions
    /// - `remote_path` names a file, i.e. is not the root
    ///
    /// # Postconditions
    /// - Every folder segment of `remote_path` exists remotely
    /// - The file content is stored under the terminal segment
    ///
    /// # Errors
    /// - Local file cannot be read
    /// - Authentication or network errors
    async fn upload_file(&self, local_path: &Path, remote_path: &RemotePath) -> Result<()>;

    /// Remove every remote entry under `remote_prefix`.
    async fn delete_prefix(&self, remote_prefix: &RemotePath) -> Result<()>;

    /// Whether `delete_prefix` actually removes anything.
    fn supports_prefix_delete(&self) -> bool {
        true
    }
}
