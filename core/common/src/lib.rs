//! Common utilities and types shared across driveup crates.
//!
//! Provides the error type every backend reports through and the
//! logical remote path that backends map onto their own namespaces.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{RemotePath, Secret};
