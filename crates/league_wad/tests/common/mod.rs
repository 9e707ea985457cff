#![allow(dead_code)]

use binrw::BinWrite;
use camino::{Utf8Path, Utf8PathBuf};
use league_wad::archive::{ENTRY_SIZE, HEADER_SIZE};
use league_wad::{
    hash_path, StorageKind, SubChunk, SubChunkToc, WadEntry, WadHeader, WadPreamble,
};
use std::io::Cursor;
use xxhash_rust::xxh64::xxh64;

enum Stored {
    Raw(Vec<u8>),
    Zstd(Vec<u8>),
    Multi(Vec<Vec<u8>>),
    Bytes { data: Vec<u8>, entry: WadEntry },
}

/// Builds v3 archives in memory using the same records the parser reads.
#[derive(Default)]
pub struct WadFixture {
    files: Vec<(String, Stored)>,
    embedded_toc: Option<String>,
}

pub struct BuiltWad {
    pub bytes: Vec<u8>,
    pub toc: SubChunkToc,
}

impl WadFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(mut self, path: &str, data: &[u8]) -> Self {
        self.files.push((path.to_string(), Stored::Raw(data.to_vec())));
        self
    }

    pub fn zstd(mut self, path: &str, data: &[u8]) -> Self {
        self.files.push((path.to_string(), Stored::Zstd(data.to_vec())));
        self
    }

    /// Store `chunks` as consecutive sub-chunks. Chunks that don't shrink under
    /// zstd are stored verbatim.
    pub fn multi(mut self, path: &str, chunks: Vec<Vec<u8>>) -> Self {
        self.files.push((path.to_string(), Stored::Multi(chunks)));
        self
    }

    /// Store `data` under a hand-made entry. The offset is filled in on build.
    pub fn entry(mut self, path: &str, data: &[u8], entry: WadEntry) -> Self {
        self.files.push((
            path.to_string(),
            Stored::Bytes {
                data: data.to_vec(),
                entry,
            },
        ));
        self
    }

    /// Also store the sub-chunk table inside the archive under `path`.
    pub fn embed_toc(mut self, path: &str) -> Self {
        self.embedded_toc = Some(path.to_string());
        self
    }

    pub fn build(&self) -> BuiltWad {
        let mut blobs = Vec::new();
        let mut records = Vec::new();

        for (path, stored) in &self.files {
            let path_hash = hash_path(path);
            let (blob, entry) = match stored {
                Stored::Raw(data) => (
                    data.clone(),
                    WadEntry {
                        path_hash,
                        compressed_size: data.len() as u32,
                        uncompressed_size: data.len() as u32,
                        type_tag: WadEntry::make_type_tag(StorageKind::Uncompressed, 0),
                        checksum: xxh64(data, 0),
                        ..Default::default()
                    },
                ),
                Stored::Zstd(data) => {
                    let compressed = zstd::bulk::compress(data, 3).unwrap();
                    let entry = WadEntry {
                        path_hash,
                        compressed_size: compressed.len() as u32,
                        uncompressed_size: data.len() as u32,
                        type_tag: WadEntry::make_type_tag(StorageKind::Zstd, 0),
                        checksum: xxh64(data, 0),
                        ..Default::default()
                    };
                    (compressed, entry)
                }
                Stored::Multi(chunks) => {
                    let first = records.len() as u16;
                    let mut blob = Vec::new();
                    let mut total = 0;
                    for chunk in chunks {
                        let compressed = zstd::bulk::compress(chunk, 3).unwrap();
                        let frame = if compressed.len() < chunk.len() {
                            compressed
                        } else {
                            chunk.clone()
                        };
                        records.push(SubChunk {
                            compressed_size: frame.len() as u32,
                            uncompressed_size: chunk.len() as u32,
                            hash: xxh64(chunk, 0),
                        });
                        blob.extend_from_slice(&frame);
                        total += chunk.len();
                    }
                    let entry = WadEntry {
                        path_hash,
                        compressed_size: blob.len() as u32,
                        uncompressed_size: total as u32,
                        type_tag: WadEntry::make_type_tag(StorageKind::ZstdMulti, chunks.len() as u8),
                        first_subchunk_index: first,
                        ..Default::default()
                    };
                    (blob, entry)
                }
                Stored::Bytes { data, entry } => (data.clone(), *entry),
            };
            blobs.push((blob, entry));
        }

        let toc = SubChunkToc::new(records);
        if let Some(path) = &self.embedded_toc {
            let data = toc.to_bytes().unwrap();
            let entry = WadEntry {
                path_hash: hash_path(path),
                compressed_size: data.len() as u32,
                uncompressed_size: data.len() as u32,
                ..Default::default()
            };
            blobs.push((data, entry));
        }

        let mut offset = HEADER_SIZE + blobs.len() * ENTRY_SIZE;
        let mut entries = Vec::new();
        for (blob, entry) in &blobs {
            entries.push(WadEntry {
                offset: offset as u32,
                ..*entry
            });
            offset += blob.len();
        }

        let mut cursor = Cursor::new(Vec::new());
        WadPreamble::new(3, 4).write(&mut cursor).unwrap();
        WadHeader::new(entries).write(&mut cursor).unwrap();
        let mut bytes = cursor.into_inner();
        for (blob, _) in blobs {
            bytes.extend_from_slice(&blob);
        }

        BuiltWad { bytes, toc }
    }

    /// Write the archive to `dir/name`, plus a sibling sub-chunk table if any
    /// entry uses sub-chunks and the table isn't embedded.
    pub fn write(&self, dir: &Utf8Path, name: &str) -> Utf8PathBuf {
        let built = self.build();
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, &built.bytes).unwrap();

        if !built.toc.is_empty() && self.embedded_toc.is_none() {
            let toc_path = league_wad::subchunk_toc_path(&path).unwrap();
            std::fs::write(toc_path, built.toc.to_bytes().unwrap()).unwrap();
        }
        path
    }
}

pub fn utf8_tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, path)
}

/// Route library logs to the test harness; `RUST_LOG` picks the level.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
