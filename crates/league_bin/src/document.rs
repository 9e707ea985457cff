use crate::decoder::Reader;
use crate::error::{BinError, Result};
use crate::hash::fnv1a;
use crate::source::BinSource;
use crate::value::{BinObject, BinValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

pub const BIN_MAGIC: [u8; 4] = *b"PROP";
pub const MAX_VERSION: u32 = 3;

/// Options controlling how much of the header a [`BinDocument`] retains.
#[derive(Debug, Clone, Copy)]
pub struct BinOptions {
    /// Keep the names of linked files listed in version 2+ headers.
    pub keep_linked_files: bool,
}

impl Default for BinOptions {
    fn default() -> Self {
        Self {
            keep_linked_files: true,
        }
    }
}

#[derive(Default)]
struct FindState {
    cache: HashMap<u32, Arc<BinValue>>,
    /// Set once the stream contained a type tag the decoder doesn't know.
    /// Nothing past that point can be located again.
    poisoned: Option<BinError>,
}

/// A BIN property document, decoded lazily one top-level entry at a time.
///
/// Only the header is read up front. [`BinDocument::find`] scans entry headers
/// and decodes just the entry it was asked for, caching the result.
pub struct BinDocument<S: BinSource = Arc<[u8]>> {
    source: S,
    version: u32,
    linked_files: Vec<String>,
    entry_types: Vec<u32>,
    entries_offset: usize,
    state: Mutex<FindState>,
}

/// The shared value returned for lookups that found nothing.
pub fn empty_value() -> Arc<BinValue> {
    static EMPTY_VALUE: OnceLock<Arc<BinValue>> = OnceLock::new();
    EMPTY_VALUE
        .get_or_init(|| Arc::new(BinValue::Empty))
        .clone()
}

impl<S: BinSource> BinDocument<S> {
    pub fn parse(source: S) -> Result<Self> {
        Self::parse_with(source, BinOptions::default())
    }

    /// Validate the header and record where the entries start.
    pub fn parse_with(source: S, options: BinOptions) -> Result<Self> {
        let mut reader = Reader::new(&source, 0);

        let magic: [u8; 4] = reader
            .read_bytes(4)?
            .try_into()
            .map_err(|_| BinError::UnexpectedEof { offset: 0, wanted: 4 })?;
        if magic != BIN_MAGIC {
            return Err(BinError::InvalidMagic(magic));
        }

        let version = reader.read_u32()?;
        if version > MAX_VERSION {
            return Err(BinError::UnsupportedVersion(version));
        }

        let mut linked_files = Vec::new();
        if version >= 2 {
            let count = reader.read_u32()?;
            for _ in 0..count {
                if options.keep_linked_files {
                    linked_files.push(reader.read_string()?);
                } else {
                    let len = reader.read_u16()? as usize;
                    reader.seek(reader.offset() + len);
                }
            }
        }

        let entry_count = reader.read_u32()? as usize;
        let mut entry_types = Vec::with_capacity(entry_count.min(4096));
        for _ in 0..entry_count {
            entry_types.push(reader.read_u32()?);
        }

        tracing::debug!(
            "Parsed BIN header: version={} entries={} linked_files={}",
            version,
            entry_count,
            linked_files.len()
        );

        Ok(Self {
            version,
            linked_files,
            entry_types,
            entries_offset: reader.offset(),
            source,
            state: Mutex::new(FindState::default()),
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn linked_files(&self) -> &[String] {
        &self.linked_files
    }

    /// Type hashes of the top-level entries, in stream order.
    pub fn entry_types(&self) -> &[u32] {
        &self.entry_types
    }

    pub fn entry_count(&self) -> usize {
        self.entry_types.len()
    }

    /// Number of entries decoded so far.
    pub fn cached_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cache
            .len()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Look up a top-level entry by its name.
    pub fn get(&self, name: &str) -> Result<Arc<BinValue>> {
        self.find(fnv1a(name))
    }

    /// Look up a top-level entry by name hash.
    ///
    /// Entries that were found before are served from the cache. A hash that
    /// isn't in the document yields [`empty_value`]; misses are not cached.
    pub fn find(&self, hash: u32) -> Result<Arc<BinValue>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = state.cache.get(&hash) {
            return Ok(Arc::clone(value));
        }
        if let Some(err) = &state.poisoned {
            return Err(err.clone());
        }

        match self.scan(hash) {
            Ok(Some(value)) => {
                let value = Arc::new(value);
                state.cache.insert(hash, Arc::clone(&value));
                Ok(value)
            }
            Ok(None) => Ok(empty_value()),
            Err(err) => {
                if matches!(err, BinError::UnknownType { .. }) {
                    state.poisoned = Some(err.clone());
                }
                Err(err)
            }
        }
    }

    fn scan(&self, hash: u32) -> Result<Option<BinValue>> {
        let mut reader = Reader::new(&self.source, self.entries_offset);

        for &type_hash in &self.entry_types {
            let length = reader.read_u32()?;
            let begin = reader.offset();
            let name_hash = reader.read_u32()?;

            if name_hash != hash {
                reader.seek(begin + length as usize);
                continue;
            }

            let count = reader.read_u16()? as usize;
            let mut object = BinObject::new(type_hash);
            reader.read_fields(&mut object, count)?;

            let consumed = reader.offset() - begin;
            if consumed != length as usize {
                tracing::warn!(
                    "BIN entry {:#010x} declares {} bytes but {} were decoded",
                    hash,
                    length,
                    consumed
                );
                return Err(BinError::LengthMismatch {
                    kind: "Entry",
                    declared: length as usize,
                    consumed,
                    offset: begin,
                });
            }

            tracing::trace!("Decoded BIN entry {:#010x} with {} fields", hash, object.len());
            return Ok(Some(BinValue::Object(object)));
        }

        Ok(None)
    }
}

impl<S: BinSource> std::fmt::Debug for BinDocument<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinDocument")
            .field("version", &self.version)
            .field("entry_count", &self.entry_types.len())
            .field("linked_files", &self.linked_files)
            .finish_non_exhaustive()
    }
}
