//! Local filesystem storage backend.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::backend::StorageBackend;
use driveup_common::{Error, RemotePath, Result};

/// Local filesystem storage backend.
///
/// Mirrors remote paths as a directory tree under `root`. Unlike the
/// Drive backend, uploading to an existing path overwrites the file.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create a new local backend with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Root exists but is not a directory
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Sync for constructor
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        } else if !root.is_dir() {
            return Err(Error::InvalidInput(format!(
                "Local root is not a directory: {}",
                root.display()
            )));
        }

        Ok(Self { root })
    }

    fn to_fs_path(&self, path: &RemotePath) -> PathBuf {
        let mut fs_path = self.root.clone();
        for component in path.components() {
            fs_path.push(component);
        }
        fs_path
    }

    async fn clear_dir(dir: &Path) -> Result<()> {
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(entry.path()).await?;
            } else {
                fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload_file(&self, local_path: &Path, remote_path: &RemotePath) -> Result<()> {
        if remote_path.is_root() {
            return Err(Error::InvalidInput(
                "Remote path must name a file".to_string(),
            ));
        }

        let target = self.to_fs_path(remote_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let bytes = fs::copy(local_path, &target).await?;
        info!("Copied {} ({} bytes) to {}", local_path.display(), bytes, target.display());
        Ok(())
    }

    async fn delete_prefix(&self, remote_prefix: &RemotePath) -> Result<()> {
        let target = self.to_fs_path(remote_prefix);

        if remote_prefix.is_root() {
            debug!("Clearing local root {}", target.display());
            return Self::clear_dir(&target).await;
        }

        match fs::metadata(&target).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&target).await?,
            Ok(_) => fs::remove_file(&target).await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Nothing to delete under {}", remote_prefix);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        info!("Deleted {}", target.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_source(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_upload_creates_intermediate_dirs() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let source = write_source(&src, "input.txt", b"hello");

        let storage = LocalStorage::new(dst.path()).unwrap();
        let remote = RemotePath::parse("problems/p1/input.txt").unwrap();
        storage.upload_file(&source, &remote).await.unwrap();

        let stored = std::fs::read(dst.path().join("problems/p1/input.txt")).unwrap();
        assert_eq!(stored, b"hello");
    }

    #[tokio::test]
    async fn test_upload_overwrites_existing() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let storage = LocalStorage::new(dst.path()).unwrap();
        let remote = RemotePath::parse("a.txt").unwrap();

        let first = write_source(&src, "first", b"one");
        let second = write_source(&src, "second", b"two");
        storage.upload_file(&first, &remote).await.unwrap();
        storage.upload_file(&second, &remote).await.unwrap();

        assert_eq!(std::fs::read(dst.path().join("a.txt")).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_upload_root_fails() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let source = write_source(&src, "x", b"x");
        let storage = LocalStorage::new(dst.path()).unwrap();

        let result = storage.upload_file(&source, &RemotePath::root()).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_upload_missing_source_fails() {
        let dst = TempDir::new().unwrap();
        let storage = LocalStorage::new(dst.path()).unwrap();
        let remote = RemotePath::parse("a.txt").unwrap();

        let result = storage
            .upload_file(Path::new("/definitely/not/here"), &remote)
            .await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_delete_prefix_removes_subtree() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let source = write_source(&src, "f", b"data");
        let storage = LocalStorage::new(dst.path()).unwrap();

        for remote in ["p1/a.txt", "p1/sub/b.txt", "p2/c.txt"] {
            storage
                .upload_file(&source, &RemotePath::parse(remote).unwrap())
                .await
                .unwrap();
        }

        storage
            .delete_prefix(&RemotePath::parse("p1").unwrap())
            .await
            .unwrap();

        assert!(!dst.path().join("p1").exists());
        assert!(dst.path().join("p2/c.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_prefix_missing_is_noop() {
        let dst = TempDir::new().unwrap();
        let storage = LocalStorage::new(dst.path()).unwrap();

        storage
            .delete_prefix(&RemotePath::parse("nope/nothing").unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_root_keeps_root_dir() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let source = write_source(&src, "f", b"data");
        let storage = LocalStorage::new(dst.path()).unwrap();
        storage
            .upload_file(&source, &RemotePath::parse("x/y.txt").unwrap())
            .await
            .unwrap();

        storage.delete_prefix(&RemotePath::root()).await.unwrap();

        assert!(dst.path().exists());
        assert_eq!(std::fs::read_dir(dst.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_root_must_be_directory() {
        let src = TempDir::new().unwrap();
        let file = write_source(&src, "plain", b"");
        assert!(LocalStorage::new(&file).is_err());
    }
}
