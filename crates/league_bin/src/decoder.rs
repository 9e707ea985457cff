//! Recursive value decoder over a [`BinSource`].

use crate::error::{BinError, Result};
use crate::source::BinSource;
use crate::types::BinType;
use crate::value::{BinKey, BinMap, BinObject, BinValue, Color};
use byteorder::{ByteOrder, LittleEndian};

/// Little-endian cursor over a [`BinSource`].
pub struct Reader<'a, S: BinSource + ?Sized> {
    source: &'a S,
    offset: usize,
}

impl<'a, S: BinSource + ?Sized> Reader<'a, S> {
    pub fn new(source: &'a S, offset: usize) -> Self {
        Self { source, offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn seek(&mut self, offset: usize) {
        self.offset = offset;
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<()> {
        if self.source.read_at(self.offset, dest) != dest.len() {
            return Err(BinError::UnexpectedEof {
                offset: self.offset,
                wanted: dest.len(),
            });
        }
        self.offset += dest.len();
        Ok(())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(&self.array::<2>()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(&self.array::<4>()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(&self.array::<8>()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(&self.array::<4>()?))
    }

    /// A string prefixed by its 16-bit byte length.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let start = self.offset;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|_| BinError::InvalidUtf8(start))
    }

    fn read_f32s<const N: usize>(&mut self) -> Result<[f32; N]> {
        let mut out = [0f32; N];
        for value in &mut out {
            *value = self.read_f32()?;
        }
        Ok(out)
    }

    fn read_type(&mut self) -> Result<BinType> {
        let offset = self.offset;
        let tag = self.read_u8()?;
        BinType::from_tag(tag).ok_or_else(|| {
            tracing::warn!("Unknown BIN type tag {:#04x} at offset {}", tag, offset);
            BinError::UnknownType { tag, offset }
        })
    }

    /// Check that an aggregate that started at `begin` consumed exactly `declared` bytes.
    fn expect_consumed(&self, kind: &'static str, begin: usize, declared: u32) -> Result<()> {
        let consumed = self.offset - begin;
        if consumed != declared as usize {
            tracing::warn!(
                "{} at offset {} declares {} bytes but {} were decoded",
                kind,
                begin,
                declared,
                consumed
            );
            return Err(BinError::LengthMismatch {
                kind,
                declared: declared as usize,
                consumed,
                offset: begin,
            });
        }
        Ok(())
    }

    /// Decode `count` fields of `(name hash, type tag, value)` into `object`.
    pub fn read_fields(&mut self, object: &mut BinObject, count: usize) -> Result<()> {
        for _ in 0..count {
            let hash = self.read_u32()?;
            let ty = self.read_type()?;
            let value = self.read_value(ty)?;
            object.insert(hash, value);
        }
        Ok(())
    }

    /// Decode a value whose type tag precedes it in the stream.
    pub fn read_tagged(&mut self) -> Result<BinValue> {
        let ty = self.read_type()?;
        self.read_value(ty)
    }

    /// Decode one value of type `ty`.
    pub fn read_value(&mut self, ty: BinType) -> Result<BinValue> {
        Ok(match ty {
            BinType::Empty => BinValue::Empty,
            BinType::Bool | BinType::Flag => BinValue::Bool(self.read_u8()? != 0),
            BinType::S8 => BinValue::I8(self.read_u8()? as i8),
            BinType::U8 => BinValue::U8(self.read_u8()?),
            BinType::S16 => BinValue::I16(self.read_u16()? as i16),
            BinType::U16 => BinValue::U16(self.read_u16()?),
            BinType::S32 => BinValue::I32(self.read_u32()? as i32),
            BinType::U32 | BinType::Hash | BinType::Link => BinValue::U32(self.read_u32()?),
            BinType::S64 => BinValue::I64(self.read_u64()? as i64),
            BinType::U64 | BinType::Path => BinValue::U64(self.read_u64()?),
            BinType::Float => BinValue::F64(self.read_f32()? as f64),
            BinType::Vec2f => BinValue::Vec2(self.read_f32s::<2>()?),
            BinType::Vec3f => BinValue::Vec3(self.read_f32s::<3>()?),
            BinType::Vec4f => BinValue::Vec4(self.read_f32s::<4>()?),
            BinType::Mat4 => {
                let mut matrix = [[0f32; 4]; 4];
                for row in &mut matrix {
                    *row = self.read_f32s::<4>()?;
                }
                BinValue::Mat4(matrix)
            }
            BinType::Rgba => {
                let [r, g, b, a] = self.array::<4>()?;
                BinValue::Color(Color { r, g, b, a })
            }
            BinType::String => BinValue::String(self.read_string()?),
            BinType::Struct | BinType::Embedded => self.read_struct()?,
            BinType::Container | BinType::Container2 => self.read_container()?,
            BinType::Array => self.read_array()?,
            BinType::Map => self.read_map()?,
        })
    }

    fn read_struct(&mut self) -> Result<BinValue> {
        let type_hash = self.read_u32()?;
        if type_hash == 0 {
            return Ok(BinValue::Object(BinObject::default()));
        }

        let length = self.read_u32()?;
        let begin = self.offset;
        let count = self.read_u16()? as usize;

        let mut object = BinObject::new(type_hash);
        self.read_fields(&mut object, count)?;
        self.expect_consumed("Struct", begin, length)?;
        Ok(BinValue::Object(object))
    }

    fn read_container(&mut self) -> Result<BinValue> {
        let ty = self.read_type()?;
        let length = self.read_u32()?;
        let begin = self.offset;
        let count = self.read_u32()? as usize;

        let mut items = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            items.push(self.read_value(ty)?);
        }
        self.expect_consumed("Container", begin, length)?;
        Ok(BinValue::Array(items))
    }

    fn read_array(&mut self) -> Result<BinValue> {
        let ty = self.read_type()?;
        let count = self.read_u8()? as usize;

        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.read_value(ty)?);
        }
        Ok(BinValue::Array(items))
    }

    fn read_map(&mut self) -> Result<BinValue> {
        let key_type = self.read_type()?;
        let value_type = self.read_type()?;
        let length = self.read_u32()?;
        let begin = self.offset;
        let count = self.read_u32()?;

        let mut map = BinMap::new();
        for _ in 0..count {
            let key = BinKey::try_from(self.read_value(key_type)?)?;
            let value = self.read_value(value_type)?;
            map.insert(key, value);
        }
        self.expect_consumed("Map", begin, length)?;
        Ok(BinValue::Map(map))
    }
}
