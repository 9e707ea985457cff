#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use camino::Utf8PathBuf;
use league_bin::{BinSource, BinType};
use std::sync::{Arc, Mutex};

/// One encoded `(name hash, type tag, value)` field.
pub fn field(name: &str, ty: BinType, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.write_u32::<LittleEndian>(league_bin::fnv1a(name)).unwrap();
    bytes.push(ty.tag());
    bytes.extend_from_slice(payload);
    bytes
}

pub fn string(value: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.write_u16::<LittleEndian>(value.len() as u16).unwrap();
    bytes.extend_from_slice(value.as_bytes());
    bytes
}

pub fn floats(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for value in values {
        bytes.write_f32::<LittleEndian>(*value).unwrap();
    }
    bytes
}

/// A `Container` payload: element tag, byte length, count, elements.
pub fn container(elem: BinType, count: u32, elements: &[u8]) -> Vec<u8> {
    let mut bytes = vec![elem.tag()];
    bytes
        .write_u32::<LittleEndian>(4 + elements.len() as u32)
        .unwrap();
    bytes.write_u32::<LittleEndian>(count).unwrap();
    bytes.extend_from_slice(elements);
    bytes
}

/// An embedded struct payload holding `fields`.
pub fn embedded(type_name: &str, fields: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = fields.concat();
    let mut bytes = Vec::new();
    bytes.write_u32::<LittleEndian>(league_bin::fnv1a(type_name)).unwrap();
    bytes.write_u32::<LittleEndian>(2 + body.len() as u32).unwrap();
    bytes.write_u16::<LittleEndian>(fields.len() as u16).unwrap();
    bytes.extend_from_slice(&body);
    bytes
}

struct Entry {
    type_hash: u32,
    name_hash: u32,
    fields: Vec<Vec<u8>>,
    /// Bytes counted in the declared length but never decoded.
    padding: usize,
}

/// Builder for BIN documents.
pub struct BinFixture {
    version: u32,
    linked_files: Vec<String>,
    entries: Vec<Entry>,
}

impl BinFixture {
    pub fn new() -> Self {
        Self {
            version: 1,
            linked_files: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn linked(mut self, name: &str) -> Self {
        self.linked_files.push(name.to_string());
        self
    }

    pub fn entry(self, name: &str, type_name: &str, fields: Vec<Vec<u8>>) -> Self {
        self.entry_hash(league_bin::fnv1a(name), league_bin::fnv1a(type_name), fields)
    }

    pub fn entry_hash(mut self, name_hash: u32, type_hash: u32, fields: Vec<Vec<u8>>) -> Self {
        self.entries.push(Entry {
            type_hash,
            name_hash,
            fields,
            padding: 0,
        });
        self
    }

    /// Like [`BinFixture::entry`], with `padding` unread bytes inside the block.
    pub fn padded_entry(
        mut self,
        name: &str,
        type_name: &str,
        fields: Vec<Vec<u8>>,
        padding: usize,
    ) -> Self {
        self = self.entry(name, type_name, fields);
        if let Some(entry) = self.entries.last_mut() {
            entry.padding = padding;
        }
        self
    }

    /// Offset of the first entry block.
    pub fn header_len(&self) -> usize {
        let mut len = 8;
        if self.version >= 2 {
            len += 4 + self
                .linked_files
                .iter()
                .map(|name| 2 + name.len())
                .sum::<usize>();
        }
        len + 4 + 4 * self.entries.len()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = b"PROP".to_vec();
        bytes.write_u32::<LittleEndian>(self.version).unwrap();
        if self.version >= 2 {
            bytes
                .write_u32::<LittleEndian>(self.linked_files.len() as u32)
                .unwrap();
            for name in &self.linked_files {
                bytes.extend_from_slice(&string(name));
            }
        }

        bytes
            .write_u32::<LittleEndian>(self.entries.len() as u32)
            .unwrap();
        for entry in &self.entries {
            bytes.write_u32::<LittleEndian>(entry.type_hash).unwrap();
        }

        for entry in &self.entries {
            let body = entry.fields.concat();
            bytes
                .write_u32::<LittleEndian>((4 + 2 + body.len() + entry.padding) as u32)
                .unwrap();
            bytes.write_u32::<LittleEndian>(entry.name_hash).unwrap();
            bytes
                .write_u16::<LittleEndian>(entry.fields.len() as u16)
                .unwrap();
            bytes.extend_from_slice(&body);
            bytes.resize(bytes.len() + entry.padding, 0);
        }
        bytes
    }
}

/// A byte source that records the offset of every read.
#[derive(Clone)]
pub struct RecordingSource {
    data: Arc<[u8]>,
    reads: Arc<Mutex<Vec<usize>>>,
}

impl RecordingSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: data.into(),
            reads: Arc::default(),
        }
    }

    /// Offsets read since the last call.
    pub fn take_reads(&self) -> Vec<usize> {
        std::mem::take(&mut *self.reads.lock().unwrap())
    }
}

impl BinSource for RecordingSource {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn read_at(&self, offset: usize, dest: &mut [u8]) -> usize {
        self.reads.lock().unwrap().push(offset);
        self.data.read_at(offset, dest)
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
