//! driveup CLI - upload files to a storage backend.
//!
//! The Google Drive backend reads `GDRIVE_SERVICE_ACCOUNT_JSON` and
//! `GDRIVE_ROOT_FOLDER_ID` from the environment.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use driveup_common::RemotePath;
use driveup_storage::{create_default_registry, StorageBackend};

#[derive(Parser)]
#[command(name = "driveup")]
#[command(about = "driveup - Upload files to cloud storage")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Storage backend: "gdrive" or "local".
    #[arg(short, long, default_value = "gdrive")]
    backend: String,

    /// Root directory for the local backend.
    #[arg(short, long)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file to a remote path.
    Upload {
        /// Local file to upload.
        #[arg(short, long)]
        source: PathBuf,

        /// Destination path, e.g. "problems/p1/statement.pdf".
        #[arg(short, long)]
        dest: String,
    },

    /// Delete everything under a remote prefix.
    DeletePrefix {
        /// Remote prefix to delete.
        #[arg(short, long)]
        prefix: String,
    },

    /// List available backends.
    Backends,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Upload { ref source, ref dest } => {
            let backend = open_backend(&cli.backend, cli.root.as_deref())?;
            cmd_upload(backend.as_ref(), source, dest).await
        }
        Commands::DeletePrefix { ref prefix } => {
            let backend = open_backend(&cli.backend, cli.root.as_deref())?;
            cmd_delete_prefix(backend.as_ref(), prefix).await
        }
        Commands::Backends => {
            for name in create_default_registry().backends() {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

/// Registry configuration for a backend chosen on the command line.
fn backend_config(backend: &str, root: Option<&Path>) -> Result<Value> {
    match (backend, root) {
        ("local", Some(root)) => Ok(serde_json::json!({ "root": root })),
        ("local", None) => anyhow::bail!("The local backend requires --root"),
        // Other backends configure themselves from the environment
        _ => Ok(Value::Null),
    }
}

fn open_backend(backend: &str, root: Option<&Path>) -> Result<Arc<dyn StorageBackend>> {
    let config = backend_config(backend, root)?;
    create_default_registry()
        .resolve(backend, config)
        .with_context(|| format!("Failed to open '{}' backend", backend))
}

/// Upload a file.
async fn cmd_upload(backend: &dyn StorageBackend, source: &Path, dest: &str) -> Result<()> {
    let remote = RemotePath::parse(dest).context("Invalid destination path")?;

    if !source.is_file() {
        anyhow::bail!("Source is not a file: {}", source.display());
    }

    info!("Uploading {} to {}:{}", source.display(), backend.name(), remote);
    backend
        .upload_file(source, &remote)
        .await
        .with_context(|| format!("Failed to upload {}", source.display()))?;

    println!("Uploaded {} -> {}", source.display(), remote);
    Ok(())
}

/// Delete a remote prefix.
async fn cmd_delete_prefix(backend: &dyn StorageBackend, prefix: &str) -> Result<()> {
    let remote = RemotePath::parse(prefix).context("Invalid prefix")?;

    backend
        .delete_prefix(&remote)
        .await
        .with_context(|| format!("Failed to delete prefix {}", remote))?;

    println!("{}", delete_summary(backend, &remote));
    Ok(())
}

fn delete_summary(backend: &dyn StorageBackend, remote: &RemotePath) -> String {
    if backend.supports_prefix_delete() {
        format!("Deleted prefix {}", remote)
    } else {
        format!(
            "The {} backend does not support prefix deletion; nothing under {} was deleted",
            backend.name(),
            remote
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parses_upload() {
        let cli = Cli::try_parse_from([
            "driveup", "--backend", "local", "--root", "/tmp/out", "upload", "--source",
            "a.txt", "--dest", "x/a.txt",
        ])
        .unwrap();

        assert_eq!(cli.backend, "local");
        assert!(matches!(cli.command, Commands::Upload { ref dest, .. } if dest == "x/a.txt"));
    }

    #[test]
    fn test_cli_defaults_to_gdrive() {
        let cli = Cli::try_parse_from(["driveup", "delete-prefix", "--prefix", "p1"]).unwrap();
        assert_eq!(cli.backend, "gdrive");
        assert!(cli.root.is_none());
    }

    #[test]
    fn test_local_backend_requires_root() {
        assert!(backend_config("local", None).is_err());
        assert!(backend_config("gdrive", None).unwrap().is_null());
    }

    #[tokio::test]
    async fn test_upload_through_local_backend() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let source = src.path().join("statement.pdf");
        std::fs::write(&source, b"%PDF").unwrap();

        let backend = open_backend("local", Some(dst.path())).unwrap();
        cmd_upload(backend.as_ref(), &source, "problems/p1/statement.pdf")
            .await
            .unwrap();

        assert!(dst.path().join("problems/p1/statement.pdf").is_file());

        cmd_delete_prefix(backend.as_ref(), "problems").await.unwrap();
        assert!(!dst.path().join("problems").exists());
    }

    /// Backend that accepts prefix deletion without removing anything.
    struct KeepEverything;

    #[async_trait::async_trait]
    impl StorageBackend for KeepEverything {
        fn name(&self) -> &str {
            "keep"
        }

        async fn upload_file(&self, _: &Path, _: &RemotePath) -> driveup_common::Result<()> {
            Ok(())
        }

        async fn delete_prefix(&self, _: &RemotePath) -> driveup_common::Result<()> {
            Ok(())
        }

        fn supports_prefix_delete(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_delete_summary_reports_noop_backend() {
        let remote = RemotePath::parse("problems").unwrap();
        let summary = delete_summary(&KeepEverything, &remote);
        assert!(summary.contains("does not support prefix deletion"));
        assert!(!summary.starts_with("Deleted"));

        let dst = TempDir::new().unwrap();
        let local = open_backend("local", Some(dst.path())).unwrap();
        assert_eq!(delete_summary(local.as_ref(), &remote), "Deleted prefix /problems");
    }

    #[tokio::test]
    async fn test_upload_missing_source_fails() {
        let dst = TempDir::new().unwrap();
        let backend = open_backend("local", Some(dst.path())).unwrap();
        let result = cmd_upload(backend.as_ref(), Path::new("/no/such/file"), "a.txt").await;
        assert!(result.is_err());
    }
}
