use league_vfs::ResourceHandle;
use std::sync::Arc;

/// Random-access bytes a [`BinDocument`](crate::BinDocument) decodes from.
pub trait BinSource {
    fn len(&self) -> usize;

    /// Copy bytes starting at `offset` into `dest`, returning how many were
    /// available. Reads past the end are truncated, never an error.
    fn read_at(&self, offset: usize, dest: &mut [u8]) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read_slice(data: &[u8], offset: usize, dest: &mut [u8]) -> usize {
    let available = data.len().saturating_sub(offset);
    let count = dest.len().min(available);
    if count > 0 {
        dest[..count].copy_from_slice(&data[offset..offset + count]);
    }
    count
}

impl BinSource for Vec<u8> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn read_at(&self, offset: usize, dest: &mut [u8]) -> usize {
        read_slice(self, offset, dest)
    }
}

impl BinSource for Arc<[u8]> {
    fn len(&self) -> usize {
        self.as_ref().len()
    }

    fn read_at(&self, offset: usize, dest: &mut [u8]) -> usize {
        read_slice(self, offset, dest)
    }
}

impl BinSource for ResourceHandle {
    fn len(&self) -> usize {
        self.as_ref().len()
    }

    fn read_at(&self, offset: usize, dest: &mut [u8]) -> usize {
        let mut cursor = offset;
        self.read(dest, &mut cursor)
    }
}
