// CDF element types and byte orders
use crate::domain::errors::DecodeError;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    /// Maps the CDR `Encoding` field. VAX-style float encodings are not
    /// supported.
    pub fn from_encoding(encoding: i32) -> Result<Self, DecodeError> {
        match encoding {
            1 | 2 | 5 | 7 | 9 | 11 | 12 => Ok(Endian::Big),
            4 | 6 | 13 | 16 => Ok(Endian::Little),
            other => Err(DecodeError::UnsupportedEncoding(other)),
        }
    }

    fn u16(self, b: &[u8]) -> u16 {
        match self {
            Endian::Big => BigEndian::read_u16(b),
            Endian::Little => LittleEndian::read_u16(b),
        }
    }

    fn i16(self, b: &[u8]) -> i16 {
        match self {
            Endian::Big => BigEndian::read_i16(b),
            Endian::Little => LittleEndian::read_i16(b),
        }
    }

    fn u32(self, b: &[u8]) -> u32 {
        match self {
            Endian::Big => BigEndian::read_u32(b),
            Endian::Little => LittleEndian::read_u32(b),
        }
    }

    fn i32(self, b: &[u8]) -> i32 {
        match self {
            Endian::Big => BigEndian::read_i32(b),
            Endian::Little => LittleEndian::read_i32(b),
        }
    }

    fn i64(self, b: &[u8]) -> i64 {
        match self {
            Endian::Big => BigEndian::read_i64(b),
            Endian::Little => LittleEndian::read_i64(b),
        }
    }

    fn f32(self, b: &[u8]) -> f32 {
        match self {
            Endian::Big => BigEndian::read_f32(b),
            Endian::Little => LittleEndian::read_f32(b),
        }
    }

    fn f64(self, b: &[u8]) -> f64 {
        match self {
            Endian::Big => BigEndian::read_f64(b),
            Endian::Little => LittleEndian::read_f64(b),
        }
    }
}

/// Numeric CDF data types this decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int1,
    Int2,
    Int4,
    Int8,
    Uint1,
    Uint2,
    Uint4,
    Byte,
    Real4,
    Float,
    Real8,
    Double,
    Epoch,
    TimeTt2000,
}

impl DataType {
    pub const INT1: i32 = 1;
    pub const INT2: i32 = 2;
    pub const INT4: i32 = 4;
    pub const INT8: i32 = 8;
    pub const UINT1: i32 = 11;
    pub const UINT2: i32 = 12;
    pub const UINT4: i32 = 14;
    pub const REAL4: i32 = 21;
    pub const REAL8: i32 = 22;
    pub const EPOCH: i32 = 31;
    pub const TIME_TT2000: i32 = 33;
    pub const BYTE: i32 = 41;
    pub const FLOAT: i32 = 44;
    pub const DOUBLE: i32 = 45;

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            Self::INT1 => DataType::Int1,
            Self::INT2 => DataType::Int2,
            Self::INT4 => DataType::Int4,
            Self::INT8 => DataType::Int8,
            Self::UINT1 => DataType::Uint1,
            Self::UINT2 => DataType::Uint2,
            Self::UINT4 => DataType::Uint4,
            Self::REAL4 => DataType::Real4,
            Self::REAL8 => DataType::Real8,
            Self::EPOCH => DataType::Epoch,
            Self::TIME_TT2000 => DataType::TimeTt2000,
            Self::BYTE => DataType::Byte,
            Self::FLOAT => DataType::Float,
            Self::DOUBLE => DataType::Double,
            _ => return None,
        })
    }

    pub fn size(self) -> usize {
        match self {
            DataType::Int1 | DataType::Uint1 | DataType::Byte => 1,
            DataType::Int2 | DataType::Uint2 => 2,
            DataType::Int4 | DataType::Uint4 | DataType::Real4 | DataType::Float => 4,
            DataType::Int8
            | DataType::Real8
            | DataType::Double
            | DataType::Epoch
            | DataType::TimeTt2000 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            DataType::Real4 | DataType::Float | DataType::Real8 | DataType::Double | DataType::Epoch
        )
    }

    /// `b` must be exactly `self.size()` bytes.
    pub fn to_f64(self, endian: Endian, b: &[u8]) -> f64 {
        match self {
            DataType::Real4 | DataType::Float => f64::from(endian.f32(b)),
            DataType::Real8 | DataType::Double | DataType::Epoch => endian.f64(b),
            _ => self.to_i64(endian, b).unwrap_or_default() as f64,
        }
    }

    /// `None` for floating-point types.
    pub fn to_i64(self, endian: Endian, b: &[u8]) -> Option<i64> {
        Some(match self {
            DataType::Int1 | DataType::Byte => i64::from(b[0] as i8),
            DataType::Uint1 => i64::from(b[0]),
            DataType::Int2 => i64::from(endian.i16(b)),
            DataType::Uint2 => i64::from(endian.u16(b)),
            DataType::Int4 => i64::from(endian.i32(b)),
            DataType::Uint4 => i64::from(endian.u32(b)),
            DataType::Int8 | DataType::TimeTt2000 => endian.i64(b),
            _ => return None,
        })
    }
}
