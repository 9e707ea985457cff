use league_vfs::LoadState;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BinError>;

/// Errors that can occur while decoding a BIN document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BinError {
    #[error("Invalid BIN magic: {0:02x?}")]
    InvalidMagic([u8; 4]),

    #[error("Unsupported BIN version {0}")]
    UnsupportedVersion(u32),

    #[error("Unexpected end of data: wanted {wanted} bytes at offset {offset}")]
    UnexpectedEof { offset: usize, wanted: usize },

    /// The type catalogue has no entry for this tag. The rest of the document
    /// can't be located past it.
    #[error("Unknown type tag {tag:#04x} at offset {offset}")]
    UnknownType { tag: u8, offset: usize },

    #[error("{kind} at offset {offset} declares {declared} bytes but {consumed} were decoded")]
    LengthMismatch {
        kind: &'static str,
        declared: usize,
        consumed: usize,
        offset: usize,
    },

    #[error("Map keys must be scalar values")]
    InvalidMapKey,

    #[error("String at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    #[error("Backing resource is {0}")]
    NotLoaded(LoadState),
}
