//! WAD archive parsing and entry extraction.
//!
//! A WAD (v3) starts with a 4 byte preamble (`RW`, major, minor), followed by
//! a 256 byte signature, a checksum and a table of fixed-size entries keyed by
//! the XXH64 hash of the lower-cased asset path. Entry data is stored either
//! verbatim, as a single zstd frame, or split into independently compressed
//! sub-chunks described by a separate sub-chunk table.

use crate::error::{Result, WadError};
use binrw::{binrw, BinRead, BinWrite};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use xxhash_rust::xxh64::xxh64;

pub const WAD_MAGIC: [u8; 2] = *b"RW";

/// Size in bytes of the preamble and the v3 header, excluding the entry table.
pub const HEADER_SIZE: usize = 4 + 256 + 8 + 4;

/// Size in bytes of one v3 entry record.
pub const ENTRY_SIZE: usize = 32;

/// Size in bytes of one sub-chunk table record.
pub const SUBCHUNK_SIZE: usize = 16;

/// Hash an asset path the way WAD entry tables key it.
///
/// Separators are normalized to `/` and the path is lower-cased before hashing.
pub fn hash_path(path: &str) -> u64 {
    xxh64(path.replace('\\', "/").to_lowercase().as_bytes(), 0)
}

/// Path of the sub-chunk table that accompanies an archive on disk.
///
/// `Aatrox.wad.client` maps to `Aatrox.wad.SubChunkTOC`. Returns `None` for
/// paths without a `.client` extension.
pub fn subchunk_toc_path(archive_path: &Utf8Path) -> Option<Utf8PathBuf> {
    archive_path
        .as_str()
        .strip_suffix(".client")
        .map(|stripped| Utf8PathBuf::from(format!("{}.SubChunkTOC", stripped)))
}

/// How an entry's bytes are stored. Taken from the low nibble of the entry type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Uncompressed,
    Zlib,
    Unknown,
    Zstd,
    ZstdMulti,
}

impl StorageKind {
    pub fn from_tag(tag: u8) -> Self {
        match tag & 0x0f {
            0 => StorageKind::Uncompressed,
            1 => StorageKind::Zlib,
            3 => StorageKind::Zstd,
            4 => StorageKind::ZstdMulti,
            _ => StorageKind::Unknown,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            StorageKind::Uncompressed => 0,
            StorageKind::Zlib => 1,
            StorageKind::Unknown => 2,
            StorageKind::Zstd => 3,
            StorageKind::ZstdMulti => 4,
        }
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WadPreamble {
    pub magic: [u8; 2],
    pub major: u8,
    pub minor: u8,
}

impl WadPreamble {
    pub fn new(major: u8, minor: u8) -> Self {
        Self {
            magic: WAD_MAGIC,
            major,
            minor,
        }
    }
}

/// One record of the entry table.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WadEntry {
    pub path_hash: u64,
    pub offset: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    /// Storage kind in the low nibble, sub-chunk count in the high nibble.
    pub type_tag: u8,
    pub duplicate: u8,
    pub first_subchunk_index: u16,
    pub checksum: u64,
}

impl WadEntry {
    pub fn storage(&self) -> StorageKind {
        StorageKind::from_tag(self.type_tag)
    }

    pub fn subchunk_count(&self) -> u8 {
        self.type_tag >> 4
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate != 0
    }

    /// Compose a type byte from a storage kind and a sub-chunk count (0..=15).
    pub fn make_type_tag(kind: StorageKind, subchunk_count: u8) -> u8 {
        kind.tag() | (subchunk_count.min(0x0f) << 4)
    }
}

/// The v3 header that follows the preamble.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WadHeader {
    pub signature: [u8; 256],
    pub checksum: u64,

    #[br(temp)]
    #[bw(try_calc(u32::try_from(entries.len())))]
    entry_count: u32,

    #[br(count = entry_count)]
    pub entries: Vec<WadEntry>,
}

impl WadHeader {
    pub fn new(entries: Vec<WadEntry>) -> Self {
        Self {
            signature: [0u8; 256],
            checksum: 0,
            entries,
        }
    }
}

/// One record of a sub-chunk table.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubChunk {
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub hash: u64,
}

/// Flat table of sub-chunk records, indexed by [`WadEntry::first_subchunk_index`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubChunkToc {
    chunks: Vec<SubChunk>,
}

impl SubChunkToc {
    pub fn new(chunks: Vec<SubChunk>) -> Self {
        Self { chunks }
    }

    /// Parse a table from raw bytes. Trailing bytes that do not form a full
    /// record are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let count = bytes.len() / SUBCHUNK_SIZE;
        if bytes.len() % SUBCHUNK_SIZE != 0 {
            tracing::warn!(
                "Sub-chunk table has {} trailing bytes",
                bytes.len() % SUBCHUNK_SIZE
            );
        }

        let mut cursor = Cursor::new(bytes);
        let chunks = (0..count)
            .map(|_| SubChunk::read(&mut cursor))
            .collect::<binrw::BinResult<Vec<_>>>()?;
        Ok(Self { chunks })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(self.chunks.len() * SUBCHUNK_SIZE));
        for chunk in &self.chunks {
            chunk.write(&mut cursor)?;
        }
        Ok(cursor.into_inner())
    }

    pub fn get(&self, index: usize) -> Option<&SubChunk> {
        self.chunks.get(index)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubChunk> {
        self.chunks.iter()
    }
}

/// A parsed WAD archive.
///
/// Only the header and entry table are kept in memory. Every extraction
/// reopens the archive file, so `&self` extraction is safe from several
/// threads for different entries.
#[derive(Debug)]
pub struct WadArchive {
    path: Utf8PathBuf,
    major: u8,
    minor: u8,
    checksum: u64,
    entries: HashMap<u64, WadEntry>,
    subchunks: Option<SubChunkToc>,
}

impl WadArchive {
    /// Parse the archive at `path` and attach its sibling sub-chunk table if one exists.
    pub fn open(path: impl AsRef<Utf8Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path.as_std_path())?;
        let mut archive = Self::from_reader(&mut BufReader::new(file), path)?;

        if let Some(toc_path) = subchunk_toc_path(path) {
            if toc_path.as_std_path().exists() {
                let toc = SubChunkToc::parse(&std::fs::read(toc_path.as_std_path())?)?;
                tracing::debug!("Loaded {} sub-chunks from {}", toc.len(), toc_path);
                archive.subchunks = Some(toc);
            }
        }

        tracing::debug!(
            "Parsed {} (v{}.{}, {} entries)",
            path,
            archive.major,
            archive.minor,
            archive.entries.len()
        );
        Ok(archive)
    }

    /// Parse the header and entry table from `reader`.
    ///
    /// `path` is the file later reopened by [`extract`](Self::extract).
    pub fn from_reader<R: Read + Seek>(reader: &mut R, path: impl Into<Utf8PathBuf>) -> Result<Self> {
        let preamble = WadPreamble::read(reader)?;
        if preamble.magic != WAD_MAGIC {
            return Err(WadError::InvalidMagic(preamble.magic));
        }
        if preamble.major != 3 {
            return Err(WadError::UnsupportedVersion {
                major: preamble.major,
                minor: preamble.minor,
            });
        }

        let header = WadHeader::read(reader)?;
        let entries = header
            .entries
            .into_iter()
            .map(|entry| (entry.path_hash, entry))
            .collect();

        Ok(Self {
            path: path.into(),
            major: preamble.major,
            minor: preamble.minor,
            checksum: header.checksum,
            entries,
            subchunks: None,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }

    pub fn version(&self) -> (u8, u8) {
        (self.major, self.minor)
    }

    pub fn checksum(&self) -> u64 {
        self.checksum
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (u64, &WadEntry)> {
        self.entries.iter().map(|(hash, entry)| (*hash, entry))
    }

    pub fn entry(&self, path_hash: u64) -> Option<&WadEntry> {
        self.entries.get(&path_hash)
    }

    pub fn has_file(&self, path_hash: u64) -> bool {
        self.entries.contains_key(&path_hash)
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.has_file(hash_path(path))
    }

    /// Uncompressed size of an entry.
    pub fn file_size(&self, path_hash: u64) -> Option<usize> {
        self.entries
            .get(&path_hash)
            .map(|entry| entry.uncompressed_size as usize)
    }

    pub fn subchunk_toc(&self) -> Option<&SubChunkToc> {
        self.subchunks.as_ref()
    }

    pub fn set_subchunk_toc(&mut self, toc: SubChunkToc) {
        self.subchunks = Some(toc);
    }

    /// Extract an entry by path hash, reopening the archive file.
    pub fn extract(&self, path_hash: u64) -> Result<Vec<u8>> {
        let file = std::fs::File::open(self.path.as_std_path())?;
        self.read_entry(&mut BufReader::new(file), path_hash)
    }

    /// Extract an entry by asset path.
    pub fn extract_path(&self, path: &str) -> Result<Vec<u8>> {
        self.extract(hash_path(path))
    }

    /// Extract an entry into `dest`, which must hold at least
    /// [`file_size`](Self::file_size) bytes. Returns the number of bytes written.
    pub fn extract_to_slice(&self, path_hash: u64, dest: &mut [u8]) -> Result<usize> {
        let data = self.extract(path_hash)?;
        if dest.len() < data.len() {
            return Err(WadError::Truncated {
                expected: data.len(),
                actual: dest.len(),
            });
        }

        dest[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    /// Extract an entry from an already open view of the archive.
    pub fn read_entry<R: Read + Seek>(&self, reader: &mut R, path_hash: u64) -> Result<Vec<u8>> {
        let entry = self
            .entries
            .get(&path_hash)
            .ok_or(WadError::MissingEntry(path_hash))?;

        reader.seek(SeekFrom::Start(entry.offset as u64))?;
        let mut raw = vec![0u8; entry.compressed_size as usize];
        reader.read_exact(&mut raw)?;

        match entry.storage() {
            StorageKind::Uncompressed => Ok(raw),
            StorageKind::Zstd => zstd::bulk::decompress(&raw, entry.uncompressed_size as usize)
                .map_err(|source| WadError::Zstd { path_hash, source }),
            StorageKind::ZstdMulti => self.decompress_subchunks(entry, &raw),
            kind => Err(WadError::UnsupportedStorage(kind)),
        }
    }

    fn decompress_subchunks(&self, entry: &WadEntry, raw: &[u8]) -> Result<Vec<u8>> {
        let toc = self
            .subchunks
            .as_ref()
            .ok_or(WadError::MissingSubChunkToc(entry.path_hash))?;

        let first = entry.first_subchunk_index as usize;
        let mut output = Vec::with_capacity(entry.uncompressed_size as usize);
        let mut cursor = 0usize;

        for index in first..first + entry.subchunk_count() as usize {
            let chunk = toc.get(index).ok_or(WadError::SubChunkOutOfRange {
                index,
                len: toc.len(),
            })?;
            if chunk.compressed_size > chunk.uncompressed_size {
                return Err(WadError::CorruptSubChunk {
                    index,
                    compressed: chunk.compressed_size,
                    uncompressed: chunk.uncompressed_size,
                });
            }

            let end = cursor + chunk.compressed_size as usize;
            let frame = raw.get(cursor..end).ok_or(WadError::Truncated {
                expected: end,
                actual: raw.len(),
            })?;

            if chunk.compressed_size == chunk.uncompressed_size {
                output.extend_from_slice(frame);
            } else {
                let decompressed =
                    zstd::bulk::decompress(frame, chunk.uncompressed_size as usize).map_err(
                        |source| WadError::Zstd {
                            path_hash: entry.path_hash,
                            source,
                        },
                    )?;
                output.extend_from_slice(&decompressed);
            }
            cursor = end;
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive_bytes(preamble: WadPreamble, entries: Vec<WadEntry>, data: &[u8]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        preamble.write(&mut cursor).unwrap();
        WadHeader::new(entries).write(&mut cursor).unwrap();
        let mut bytes = cursor.into_inner();
        bytes.extend_from_slice(data);
        bytes
    }

    fn parse(bytes: Vec<u8>) -> Result<WadArchive> {
        WadArchive::from_reader(&mut Cursor::new(bytes), "test.wad.client")
    }

    #[test]
    fn test_hash_path_is_case_and_separator_insensitive() {
        assert_eq!(hash_path("DATA\\Test.txt"), hash_path("data/test.txt"));
        assert_eq!(hash_path("data/test.txt"), xxh64(b"data/test.txt", 0));
    }

    #[test]
    fn test_subchunk_toc_path() {
        assert_eq!(
            subchunk_toc_path(Utf8Path::new("DATA/FINAL/Aatrox.wad.client")),
            Some(Utf8PathBuf::from("DATA/FINAL/Aatrox.wad.SubChunkTOC"))
        );
        assert_eq!(subchunk_toc_path(Utf8Path::new("Aatrox.wad")), None);
    }

    #[test]
    fn test_type_tag_nibbles() {
        let entry = WadEntry {
            type_tag: WadEntry::make_type_tag(StorageKind::ZstdMulti, 3),
            ..Default::default()
        };
        assert_eq!(entry.type_tag, 0x34);
        assert_eq!(entry.storage(), StorageKind::ZstdMulti);
        assert_eq!(entry.subchunk_count(), 3);

        assert_eq!(StorageKind::from_tag(0x07), StorageKind::Unknown);
        assert_eq!(StorageKind::from_tag(0x21), StorageKind::Zlib);
    }

    #[test]
    fn test_header_layout_size() {
        let entry = WadEntry {
            path_hash: 1,
            ..Default::default()
        };
        let bytes = archive_bytes(WadPreamble::new(3, 4), vec![entry, entry], &[]);
        assert_eq!(bytes.len(), HEADER_SIZE + 2 * ENTRY_SIZE);
    }

    #[test]
    fn test_parse_entries_and_lookups() {
        let hash = hash_path("data/test.txt");
        let entry = WadEntry {
            path_hash: hash,
            offset: (HEADER_SIZE + ENTRY_SIZE) as u32,
            compressed_size: 5,
            uncompressed_size: 5,
            ..Default::default()
        };
        let archive = parse(archive_bytes(WadPreamble::new(3, 1), vec![entry], b"hello")).unwrap();

        assert_eq!(archive.version(), (3, 1));
        assert_eq!(archive.len(), 1);
        assert!(archive.has_path("DATA/test.txt"));
        assert_eq!(archive.file_size(hash), Some(5));
        assert_eq!(archive.file_size(hash + 1), None);
        assert_eq!(archive.file_name(), Some("test.wad.client"));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut preamble = WadPreamble::new(3, 0);
        preamble.magic = *b"XX";
        let err = parse(archive_bytes(preamble, vec![], &[])).unwrap_err();
        assert!(matches!(err, WadError::InvalidMagic(magic) if magic == *b"XX"));
    }

    #[test]
    fn test_rejects_other_major_versions() {
        for major in [1, 2, 4] {
            let err = parse(archive_bytes(WadPreamble::new(major, 0), vec![], &[])).unwrap_err();
            assert!(matches!(err, WadError::UnsupportedVersion { major: m, minor: 0 } if m == major));
        }
    }

    #[test]
    fn test_truncated_table_is_parse_error() {
        let mut bytes = archive_bytes(WadPreamble::new(3, 0), vec![WadEntry::default()], &[]);
        bytes.truncate(bytes.len() - 8);
        assert!(matches!(parse(bytes), Err(WadError::Parse(_))));
    }

    #[test]
    fn test_zlib_entries_are_unsupported() {
        let hash = hash_path("old.bin");
        let entry = WadEntry {
            path_hash: hash,
            offset: (HEADER_SIZE + ENTRY_SIZE) as u32,
            compressed_size: 1,
            uncompressed_size: 1,
            type_tag: WadEntry::make_type_tag(StorageKind::Zlib, 0),
            ..Default::default()
        };
        let bytes = archive_bytes(WadPreamble::new(3, 0), vec![entry], &[0]);
        let archive = parse(bytes.clone()).unwrap();

        let err = archive.read_entry(&mut Cursor::new(bytes), hash).unwrap_err();
        assert!(matches!(err, WadError::UnsupportedStorage(StorageKind::Zlib)));
    }

    #[test]
    fn test_missing_entry() {
        let bytes = archive_bytes(WadPreamble::new(3, 0), vec![], &[]);
        let archive = parse(bytes.clone()).unwrap();
        let err = archive.read_entry(&mut Cursor::new(bytes), 42).unwrap_err();
        assert!(matches!(err, WadError::MissingEntry(42)));
    }

    #[test]
    fn test_subchunk_toc_parse() {
        let toc = SubChunkToc::new(vec![
            SubChunk {
                compressed_size: 4,
                uncompressed_size: 8,
                hash: 0xabcd,
            },
            SubChunk {
                compressed_size: 3,
                uncompressed_size: 3,
                hash: 0,
            },
        ]);
        let mut bytes = toc.to_bytes().unwrap();
        assert_eq!(bytes.len(), 2 * SUBCHUNK_SIZE);

        bytes.push(0xff);
        let parsed = SubChunkToc::parse(&bytes).unwrap();
        assert_eq!(parsed, toc);
        assert_eq!(parsed.get(0).map(|c| c.hash), Some(0xabcd));
    }
}
