//! The decoded value tree.

use crate::error::BinError;
use crate::hash::fnv1a;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Index;

/// Canonical empty value returned by lookups that miss.
pub static EMPTY: BinValue = BinValue::Empty;

/// An 8-bit RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// A decoded BIN value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BinValue {
    #[default]
    Empty,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F64(f64),
    String(String),
    Color(Color),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    IVec2([i32; 2]),
    IVec3([i32; 3]),
    IVec4([i32; 4]),
    Mat4([[f32; 4]; 4]),
    Object(BinObject),
    Array(Vec<BinValue>),
    Map(BinMap),
}

/// A struct value: fields keyed by name hash, in stream order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BinObject {
    pub type_hash: u32,
    pub fields: IndexMap<u32, BinValue>,
}

impl BinObject {
    pub fn new(type_hash: u32) -> Self {
        Self {
            type_hash,
            fields: IndexMap::new(),
        }
    }

    pub fn field(&self, hash: u32) -> Option<&BinValue> {
        self.fields.get(&hash)
    }

    pub fn get(&self, name: &str) -> Option<&BinValue> {
        self.field(fnv1a(name))
    }

    pub fn insert(&mut self, hash: u32, value: BinValue) {
        self.fields.insert(hash, value);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &BinValue)> {
        self.fields.iter().map(|(hash, value)| (*hash, value))
    }
}

/// A map value. Keys are restricted to scalars, see [`BinKey`].
pub type BinMap = BTreeMap<BinKey, BinValue>;

/// A scalar usable as a map key.
#[derive(Debug, Clone)]
pub enum BinKey {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F64(f64),
    String(String),
}

impl BinKey {
    fn rank(&self) -> u8 {
        match self {
            BinKey::Bool(_) => 0,
            BinKey::I8(_) => 1,
            BinKey::I16(_) => 2,
            BinKey::I32(_) => 3,
            BinKey::I64(_) => 4,
            BinKey::U8(_) => 5,
            BinKey::U16(_) => 6,
            BinKey::U32(_) => 7,
            BinKey::U64(_) => 8,
            BinKey::F64(_) => 9,
            BinKey::String(_) => 10,
        }
    }

    fn integer(&self) -> i128 {
        match *self {
            BinKey::Bool(v) => v as i128,
            BinKey::I8(v) => v as i128,
            BinKey::I16(v) => v as i128,
            BinKey::I32(v) => v as i128,
            BinKey::I64(v) => v as i128,
            BinKey::U8(v) => v as i128,
            BinKey::U16(v) => v as i128,
            BinKey::U32(v) => v as i128,
            BinKey::U64(v) => v as i128,
            BinKey::F64(_) | BinKey::String(_) => 0,
        }
    }

    pub fn to_value(&self) -> BinValue {
        match self {
            BinKey::Bool(v) => BinValue::Bool(*v),
            BinKey::I8(v) => BinValue::I8(*v),
            BinKey::I16(v) => BinValue::I16(*v),
            BinKey::I32(v) => BinValue::I32(*v),
            BinKey::I64(v) => BinValue::I64(*v),
            BinKey::U8(v) => BinValue::U8(*v),
            BinKey::U16(v) => BinValue::U16(*v),
            BinKey::U32(v) => BinValue::U32(*v),
            BinKey::U64(v) => BinValue::U64(*v),
            BinKey::F64(v) => BinValue::F64(*v),
            BinKey::String(v) => BinValue::String(v.clone()),
        }
    }
}

impl Ord for BinKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| match (self, other) {
                (BinKey::F64(a), BinKey::F64(b)) => a.total_cmp(b),
                (BinKey::String(a), BinKey::String(b)) => a.cmp(b),
                _ => self.integer().cmp(&other.integer()),
            })
    }
}

impl PartialOrd for BinKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for BinKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BinKey {}

impl TryFrom<BinValue> for BinKey {
    type Error = BinError;

    fn try_from(value: BinValue) -> Result<Self, Self::Error> {
        Ok(match value {
            BinValue::Bool(v) => BinKey::Bool(v),
            BinValue::I8(v) => BinKey::I8(v),
            BinValue::I16(v) => BinKey::I16(v),
            BinValue::I32(v) => BinKey::I32(v),
            BinValue::I64(v) => BinKey::I64(v),
            BinValue::U8(v) => BinKey::U8(v),
            BinValue::U16(v) => BinKey::U16(v),
            BinValue::U32(v) => BinKey::U32(v),
            BinValue::U64(v) => BinKey::U64(v),
            BinValue::F64(v) => BinKey::F64(v),
            BinValue::String(v) => BinKey::String(v),
            _ => return Err(BinError::InvalidMapKey),
        })
    }
}

impl From<u32> for BinKey {
    fn from(value: u32) -> Self {
        BinKey::U32(value)
    }
}

impl From<&str> for BinKey {
    fn from(value: &str) -> Self {
        BinKey::String(value.to_string())
    }
}

impl BinValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, BinValue::Empty)
    }

    /// Field of an object by name. Returns [`EMPTY`] for misses and non-objects.
    pub fn get(&self, name: &str) -> &BinValue {
        self.field(fnv1a(name))
    }

    /// Field of an object by name hash. Returns [`EMPTY`] for misses and non-objects.
    pub fn field(&self, hash: u32) -> &BinValue {
        match self {
            BinValue::Object(object) => object.field(hash).unwrap_or(&EMPTY),
            _ => &EMPTY,
        }
    }

    /// Element of an array. Returns [`EMPTY`] when out of range or not an array.
    pub fn index(&self, index: usize) -> &BinValue {
        match self {
            BinValue::Array(items) => items.get(index).unwrap_or(&EMPTY),
            _ => &EMPTY,
        }
    }

    /// Value of a map entry. Returns [`EMPTY`] for misses and non-maps.
    pub fn entry(&self, key: &BinKey) -> &BinValue {
        match self {
            BinValue::Map(map) => map.get(key).unwrap_or(&EMPTY),
            _ => &EMPTY,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BinValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Any signed or unsigned integer that fits in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            BinValue::I8(v) => Some(v.into()),
            BinValue::I16(v) => Some(v.into()),
            BinValue::I32(v) => Some(v.into()),
            BinValue::I64(v) => Some(v),
            BinValue::U8(v) => Some(v.into()),
            BinValue::U16(v) => Some(v.into()),
            BinValue::U32(v) => Some(v.into()),
            BinValue::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Any non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            BinValue::U8(v) => Some(v.into()),
            BinValue::U16(v) => Some(v.into()),
            BinValue::U32(v) => Some(v.into()),
            BinValue::U64(v) => Some(v),
            _ => self.as_i64().and_then(|v| u64::try_from(v).ok()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            BinValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            BinValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            BinValue::Color(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<[f32; 2]> {
        match self {
            BinValue::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<[f32; 3]> {
        match self {
            BinValue::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec4(&self) -> Option<[f32; 4]> {
        match self {
            BinValue::Vec4(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_mat4(&self) -> Option<&[[f32; 4]; 4]> {
        match self {
            BinValue::Mat4(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BinObject> {
        match self {
            BinValue::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[BinValue]> {
        match self {
            BinValue::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BinMap> {
        match self {
            BinValue::Map(v) => Some(v),
            _ => None,
        }
    }
}

impl Index<&str> for BinValue {
    type Output = BinValue;

    fn index(&self, name: &str) -> &BinValue {
        self.get(name)
    }
}

impl Index<usize> for BinValue {
    type Output = BinValue;

    fn index(&self, index: usize) -> &BinValue {
        BinValue::index(self, index)
    }
}
