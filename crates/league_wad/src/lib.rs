//! WAD archive support for League of Legends assets.
//!
//! [`WadArchive`] parses an archive's header and entry table and extracts
//! entries stored verbatim, as one zstd frame, or as a run of sub-chunks.
//! [`WadBackend`] exposes every archive under a directory as a read-only
//! [`league_vfs`] backend.
//!
//! # Example
//!
//! ```no_run
//! use league_wad::WadArchive;
//!
//! # fn main() -> league_wad::Result<()> {
//! let archive = WadArchive::open("DATA/FINAL/Champions/Aatrox.wad.client")?;
//! let bytes = archive.extract_path("data/characters/aatrox/aatrox.bin")?;
//! println!("{} bytes", bytes.len());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod backend;
pub mod error;

pub use archive::{
    hash_path, subchunk_toc_path, StorageKind, SubChunk, SubChunkToc, WadArchive, WadEntry,
    WadHeader, WadPreamble,
};
pub use backend::WadBackend;
pub use error::{Result, WadError};
