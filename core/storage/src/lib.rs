//! Storage backend abstraction for driveup.
//!
//! This crate provides a trait-based interface for pluggable upload targets
//! (Google Drive, local filesystem) and a registry for resolving a backend
//! by name and configuration.
//!
//! # Design Principles
//! - Backend isolation: callers only see [`StorageBackend`]
//! - Async operations: all I/O is async, issued one call at a time
//! - Unified error semantics: every backend reports `driveup_common::Error`

pub mod backend;
pub mod gdrive;
pub mod local;
pub mod registry;

pub use backend::StorageBackend;
pub use gdrive::{GDriveConfig, GDriveStorage};
pub use local::LocalStorage;
pub use registry::{create_default_registry, BackendFactory, BackendRegistry};
