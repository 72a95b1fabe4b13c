//! Schema-less compact binary serializer
//!
//! The byte layout is MessagePack: every value starts with a tag byte that
//! either carries the value itself (fixint, nil, bool), a small length
//! (fixstr, fixarray, fixmap) or announces a big endian length/payload
//! that follows. Integers always take the narrowest form that round-trips.
//!
//! | Tag           | Value |
//! | ------------- | ----- |
//! | `0x00..=0x7f` | positive fixint |
//! | `0x80..=0x8f` | fixmap |
//! | `0x90..=0x9f` | fixarray |
//! | `0xa0..=0xbf` | fixstr |
//! | `0xc0`        | nil |
//! | `0xc1`        | never used, always a format error |
//! | `0xc2/0xc3`   | false / true |
//! | `0xc4..=0xc6` | bin 8/16/32 |
//! | `0xc7..=0xc9` | ext 8/16/32 |
//! | `0xca/0xcb`   | float 32/64 (only 64 is emitted) |
//! | `0xcc..=0xcf` | uint 8/16/32/64 |
//! | `0xd0..=0xd3` | int 8/16/32/64 |
//! | `0xd4..=0xd8` | fixext 1/2/4/8/16 |
//! | `0xd9..=0xdb` | str 8/16/32 |
//! | `0xdc/0xdd`   | array 16/32 |
//! | `0xde/0xdf`   | map 16/32 |
//! | `0xe0..=0xff` | negative fixint |
//!
//! Extension type `-1` is the timestamp, decoded into [`Timestamp`].
//! Map entries keep the order they were given in, but consumers look keys
//! up by name and must not rely on that order.
mod decode;
mod encode;

use thiserror::Error;
use time::OffsetDateTime;

pub use decode::{decode, from_slice};
pub use encode::to_vec;

/// Extension type reserved for timestamps
pub const TIMESTAMP_EXT: i8 = -1;

/// Nesting guard for the decoder
pub const MAX_DEPTH: usize = 64;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of data at byte {0}")]
    UnexpectedEof(usize),
    #[error("unrecognized tag byte {tag:#04x} at byte {pos}")]
    UnknownTag { tag: u8, pos: usize },
    #[error("invalid utf-8 string at byte {0}")]
    InvalidUtf8(usize),
    #[error("{0} trailing bytes after the value")]
    TrailingBytes(usize),
    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),
    #[error("invalid timestamp extension of {0} bytes")]
    InvalidTimestamp(usize),
    #[error("length {0} does not fit in 32 bits")]
    LengthOverflow(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

impl From<OffsetDateTime> for Timestamp {
    fn from(dt: OffsetDateTime) -> Self {
        Timestamp {
            secs: dt.unix_timestamp(),
            nanos: dt.nanosecond(),
        }
    }
}

impl Timestamp {
    pub fn to_datetime(self) -> Option<OffsetDateTime> {
        let nanos = i128::from(self.secs) * 1_000_000_000 + i128::from(self.nanos);
        OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
    }
}

/// A decoded value.
///
/// Integers are split by sign so the whole `[-2^63, 2^64-1]` range is
/// representable: `Uint` holds everything `>= 0` and `Int` is always negative.
/// Build integers through the `From` impls to keep that split canonical.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Uint(u64),
    Int(i64),
    Float(f64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Timestamp(Timestamp),
    Ext(i8, Vec<u8>),
}

impl Value {
    /// Integers outside of the 64 bit range clamp to the nearest extreme.
    pub fn from_i128(v: i128) -> Value {
        if v > i128::from(u64::MAX) {
            Value::Uint(u64::MAX)
        } else if v >= 0 {
            Value::Uint(v as u64)
        } else if v < i128::from(i64::MIN) {
            Value::Int(i64::MIN)
        } else {
            Value::Int(v as i64)
        }
    }

    /// Exact integers become integers, anything else stays a double.
    pub fn number(n: f64) -> Value {
        if n.is_finite() && n.fract() == 0.0 {
            // `as` saturates, from_i128 then clamps to the 64 bit range
            Value::from_i128(n as i128)
        } else {
            Value::Float(n)
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Uint(v) => i64::try_from(*v).ok(),
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Uint(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bin(&self) -> Option<&[u8]> {
        match self {
            Value::Bin(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Look up a string key in a map, whatever position it was encoded at.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint(u64::from(v))
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Uint(u64::from(v))
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Uint(u64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        if v >= 0 {
            Value::Uint(v as u64)
        } else {
            Value::Int(v)
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bin(v.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v)
    }
}
