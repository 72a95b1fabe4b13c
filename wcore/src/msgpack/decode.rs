use super::{CodecError, Timestamp, Value, MAX_DEPTH, TIMESTAMP_EXT};
use crate::buf;

/// Decode one value from the front of `data`, returning it with the number
/// of bytes it occupied. Trailing bytes are left for the caller.
pub fn decode(data: &[u8]) -> Result<(Value, usize), CodecError> {
    let mut decoder = Decoder { data, pos: 0 };
    let value = decoder.value(0)?;
    Ok((value, decoder.pos))
}

/// Decode exactly one value spanning all of `data`.
pub fn from_slice(data: &[u8]) -> Result<Value, CodecError> {
    let (value, used) = decode(data)?;
    if used != data.len() {
        return Err(CodecError::TrailingBytes(data.len() - used));
    }
    Ok(value)
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(CodecError::UnexpectedEof(self.pos))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(buf::read_u8(self.take(1)?, 0))
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        Ok(buf::read_u16(self.take(2)?, 0))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(buf::read_u32(self.take(4)?, 0))
    }

    fn u64(&mut self) -> Result<u64, CodecError> {
        Ok(buf::read_u64(self.take(8)?, 0))
    }

    fn value(&mut self, depth: usize) -> Result<Value, CodecError> {
        if depth > MAX_DEPTH {
            return Err(CodecError::TooDeep(MAX_DEPTH));
        }

        let tag_pos = self.pos;
        let tag = self.u8()?;

        let value = match tag {
            0x00..=0x7f => Value::Uint(u64::from(tag)),
            0x80..=0x8f => self.map(usize::from(tag & 0x0f), depth)?,
            0x90..=0x9f => self.array(usize::from(tag & 0x0f), depth)?,
            0xa0..=0xbf => self.str(usize::from(tag & 0x1f))?,
            0xc0 => Value::Nil,
            0xc2 => Value::Bool(false),
            0xc3 => Value::Bool(true),

            0xc4 => {
                let len = usize::from(self.u8()?);
                Value::Bin(self.take(len)?.to_vec())
            }
            0xc5 => {
                let len = usize::from(self.u16()?);
                Value::Bin(self.take(len)?.to_vec())
            }
            0xc6 => {
                let len = self.u32()? as usize;
                Value::Bin(self.take(len)?.to_vec())
            }

            0xc7 => {
                let len = usize::from(self.u8()?);
                self.ext(len)?
            }
            0xc8 => {
                let len = usize::from(self.u16()?);
                self.ext(len)?
            }
            0xc9 => {
                let len = self.u32()? as usize;
                self.ext(len)?
            }

            0xca => Value::Float(f64::from(f32::from_bits(self.u32()?))),
            0xcb => Value::Float(f64::from_bits(self.u64()?)),

            0xcc => Value::Uint(u64::from(self.u8()?)),
            0xcd => Value::Uint(u64::from(self.u16()?)),
            0xce => Value::Uint(u64::from(self.u32()?)),
            0xcf => Value::Uint(self.u64()?),

            0xd0 => Value::from(i64::from(self.u8()? as i8)),
            0xd1 => Value::from(i64::from(self.u16()? as i16)),
            0xd2 => Value::from(i64::from(self.u32()? as i32)),
            0xd3 => Value::from(self.u64()? as i64),

            0xd4 => self.ext(1)?,
            0xd5 => self.ext(2)?,
            0xd6 => self.ext(4)?,
            0xd7 => self.ext(8)?,
            0xd8 => self.ext(16)?,

            0xd9 => {
                let len = usize::from(self.u8()?);
                self.str(len)?
            }
            0xda => {
                let len = usize::from(self.u16()?);
                self.str(len)?
            }
            0xdb => {
                let len = self.u32()? as usize;
                self.str(len)?
            }

            0xdc => {
                let len = usize::from(self.u16()?);
                self.array(len, depth)?
            }
            0xdd => {
                let len = self.u32()? as usize;
                self.array(len, depth)?
            }
            0xde => {
                let len = usize::from(self.u16()?);
                self.map(len, depth)?
            }
            0xdf => {
                let len = self.u32()? as usize;
                self.map(len, depth)?
            }

            0xe0..=0xff => Value::Int(i64::from(tag as i8)),

            // 0xc1
            _ => return Err(CodecError::UnknownTag { tag, pos: tag_pos }),
        };
        Ok(value)
    }

    fn str(&mut self, len: usize) -> Result<Value, CodecError> {
        let start = self.pos;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(|s| Value::Str(s.to_string()))
            .map_err(|_| CodecError::InvalidUtf8(start))
    }

    // Every element is at least one byte, so a declared length beyond the
    // remaining input can never be satisfied and is not preallocated
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn array(&mut self, len: usize, depth: usize) -> Result<Value, CodecError> {
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            items.push(self.value(depth + 1)?);
        }
        Ok(Value::Array(items))
    }

    fn map(&mut self, len: usize, depth: usize) -> Result<Value, CodecError> {
        let mut entries = Vec::with_capacity(len.min(self.remaining() / 2));
        for _ in 0..len {
            let k = self.value(depth + 1)?;
            let v = self.value(depth + 1)?;
            entries.push((k, v));
        }
        Ok(Value::Map(entries))
    }

    fn ext(&mut self, len: usize) -> Result<Value, CodecError> {
        let kind = self.u8()? as i8;
        let data = self.take(len)?;

        if kind != TIMESTAMP_EXT {
            return Ok(Value::Ext(kind, data.to_vec()));
        }

        let ts = match len {
            4 => Timestamp {
                secs: i64::from(buf::read_u32(data, 0)),
                nanos: 0,
            },
            8 => {
                let packed = buf::read_u64(data, 0);
                Timestamp {
                    secs: (packed & 0x3_ffff_ffff) as i64,
                    nanos: (packed >> 34) as u32,
                }
            }
            12 => Timestamp {
                secs: buf::read_u64(data, 4) as i64,
                nanos: buf::read_u32(data, 0),
            },
            _ => return Err(CodecError::InvalidTimestamp(len)),
        };

        if ts.nanos >= 1_000_000_000 {
            return Err(CodecError::InvalidTimestamp(len));
        }
        Ok(Value::Timestamp(ts))
    }
}


#[cfg(test)]
mod test_roundtrip {
    use super::*;
    use crate::msgpack::to_vec;
    use proptest::collection::vec;
    use proptest::prelude::*;

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Nil),
            any::<bool>().prop_map(Value::Bool),
            any::<u64>().prop_map(Value::Uint),
            (i64::MIN..0i64).prop_map(Value::Int),
            any::<f64>()
                .prop_filter("finite", |f| f.is_finite())
                .prop_map(Value::Float),
            ".{0,40}".prop_map(Value::Str),
            vec(any::<u8>(), 0..300).prop_map(Value::Bin),
            (any::<i64>(), 0u32..1_000_000_000)
                .prop_map(|(secs, nanos)| Value::Timestamp(Timestamp { secs, nanos })),
            (0i8..100, vec(any::<u8>(), 0..20)).prop_map(|(k, d)| Value::Ext(k, d)),
        ];

        leaf.prop_recursive(5, 64, 8, |inner| {
            prop_oneof![
                vec(inner.clone(), 0..8).prop_map(Value::Array),
                vec((inner.clone(), inner), 0..8).prop_map(Value::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn roundtrip(value in arb_value()) {
            let bytes = to_vec(&value).unwrap();
            let (decoded, used) = decode(&bytes).unwrap();
            prop_assert_eq!(used, bytes.len());
            prop_assert_eq!(decoded, value);
        }

        #[test]
        fn integer_sizes(v in any::<i64>()) {
            let bytes = to_vec(&Value::from(v)).unwrap();
            let expect = match v {
                -32..=127 => 1,
                -128..=255 => 2,
                -32768..=65535 => 3,
                -2147483648..=4294967295 => 5,
                _ => 9,
            };
            prop_assert_eq!(bytes.len(), expect);
            prop_assert_eq!(from_slice(&bytes).unwrap().as_i64(), Some(v));
        }

        #[test]
        fn garbage_never_panics(bytes in vec(any::<u8>(), 0..200)) {
            let _ = decode(&bytes);
        }
    }
}
