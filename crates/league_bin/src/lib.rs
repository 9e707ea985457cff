//! Lazy decoder for League of Legends BIN property files.
//!
//! A BIN document is a header followed by a run of top-level entries, each a
//! length-prefixed object identified by the FNV-1a hash of its name.
//! [`BinDocument`] reads the header eagerly and decodes an entry only when it
//! is looked up, caching what it found.
//!
//! # Example
//!
//! ```no_run
//! use league_bin::BinDocument;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("skin0.bin")?;
//! let doc = BinDocument::parse(bytes)?;
//! let entry = doc.get("Characters/Aatrox/Skins/Skin0")?;
//! println!("{:?}", entry["skinScale"].as_f64());
//! # Ok(())
//! # }
//! ```

pub mod decoder;
pub mod document;
pub mod error;
pub mod hash;
pub mod load;
pub mod source;
pub mod types;
pub mod value;

pub use document::{empty_value, BinDocument, BinOptions, BIN_MAGIC, MAX_VERSION};
pub use error::{BinError, Result};
pub use hash::fnv1a;
pub use load::{load, load_with};
pub use source::BinSource;
pub use types::BinType;
pub use value::{BinKey, BinMap, BinObject, BinValue, Color, EMPTY};
