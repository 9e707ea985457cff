/// Type tags of BIN values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BinType {
    Empty = 0,
    Bool = 1,
    S8 = 2,
    U8 = 3,
    S16 = 4,
    U16 = 5,
    S32 = 6,
    U32 = 7,
    S64 = 8,
    U64 = 9,
    Float = 10,
    Vec2f = 11,
    Vec3f = 12,
    Vec4f = 13,
    Mat4 = 14,
    Rgba = 15,
    String = 16,
    Hash = 17,
    Path = 18,
    Container = 0x80,
    Container2 = 0x81,
    Struct = 0x82,
    Embedded = 0x83,
    Link = 0x84,
    Array = 0x85,
    Map = 0x86,
    Flag = 0x87,
}

impl BinType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        use BinType::*;
        Some(match tag {
            0 => Empty,
            1 => Bool,
            2 => S8,
            3 => U8,
            4 => S16,
            5 => U16,
            6 => S32,
            7 => U32,
            8 => S64,
            9 => U64,
            10 => Float,
            11 => Vec2f,
            12 => Vec3f,
            13 => Vec4f,
            14 => Mat4,
            15 => Rgba,
            16 => String,
            17 => Hash,
            18 => Path,
            0x80 => Container,
            0x81 => Container2,
            0x82 => Struct,
            0x83 => Embedded,
            0x84 => Link,
            0x85 => Array,
            0x86 => Map,
            0x87 => Flag,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_match_catalogue() {
        for tag in (0..=18).chain(0x80..=0x87) {
            assert_eq!(BinType::from_tag(tag).map(BinType::tag), Some(tag));
        }
        assert_eq!(BinType::from_tag(19), None);
        assert_eq!(BinType::from_tag(0x88), None);
        assert_eq!(BinType::from_tag(0xff), None);
    }
}
