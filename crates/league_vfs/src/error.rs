//! Error types for storage configuration and IO.
//!
//! Resource loading and saving never return these: their outcome is reported
//! through [`LoadState`](crate::LoadState) and [`SaveState`](crate::SaveState)
//! so a failed load can be retried on the next reload.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`VfsConfig`](crate::VfsConfig).
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// The configuration could not be serialized.
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}
