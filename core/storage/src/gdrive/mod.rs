//! Google Drive storage backend for driveup.
//!
//! This module provides a storage backend using Google Drive with:
//! - Service-account and authorized-user credentials with token refresh
//! - Folder path resolution that creates missing folders
//! - Multipart uploads for small files, resumable uploads for large ones

pub mod auth;
pub mod client;
pub mod config;
pub mod storage;

pub use auth::{AccessToken, Credentials, TokenManager};
pub use client::{DriveApi, DriveClient, DriveFile};
pub use config::{GDriveConfig, CREDENTIALS_ENV, ROOT_FOLDER_ENV};
pub use storage::{create_gdrive_storage, GDriveStorage};
