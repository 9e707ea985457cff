use crate::archive::StorageKind;
use std::io;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WadError>;

/// Errors that can occur while reading a WAD archive.
#[derive(Error, Debug)]
pub enum WadError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse WAD: {0}")]
    Parse(#[from] binrw::Error),

    #[error("Invalid WAD magic: {0:02x?}")]
    InvalidMagic([u8; 2]),

    /// Only major version 3 is supported.
    #[error("Unsupported WAD version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("No entry with path hash {0:016x}")]
    MissingEntry(u64),

    #[error("Unsupported storage kind {0:?}")]
    UnsupportedStorage(StorageKind),

    /// The zstd decoder rejected an entry or one of its sub-chunks.
    #[error("Failed to decompress entry {path_hash:016x}: {source}")]
    Zstd {
        path_hash: u64,
        #[source]
        source: io::Error,
    },

    #[error("Entry {0:016x} is split into sub-chunks but the archive has no sub-chunk table")]
    MissingSubChunkToc(u64),

    #[error("Sub-chunk {index} is outside the sub-chunk table ({len} records)")]
    SubChunkOutOfRange { index: usize, len: usize },

    #[error("Sub-chunk {index} is corrupt: compressed size {compressed} exceeds uncompressed size {uncompressed}")]
    CorruptSubChunk {
        index: usize,
        compressed: u32,
        uncompressed: u32,
    },

    #[error("Expected {expected} bytes but only {actual} are available")]
    Truncated { expected: usize, actual: usize },
}
