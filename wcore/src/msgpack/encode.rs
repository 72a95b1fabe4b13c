use super::{CodecError, Timestamp, Value, TIMESTAMP_EXT};

pub fn to_vec(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    write_value(&mut out, value)?;
    Ok(out)
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> Result<(), CodecError> {
    match value {
        Value::Nil => out.push(0xc0),
        Value::Bool(false) => out.push(0xc2),
        Value::Bool(true) => out.push(0xc3),
        Value::Uint(v) => write_uint(out, *v),
        Value::Int(v) => write_int(out, *v),
        Value::Float(v) => {
            out.push(0xcb);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Value::Str(s) => {
            write_len(out, s.len(), Some(0xa0), 31, [0xd9, 0xda, 0xdb])?;
            out.extend_from_slice(s.as_bytes());
        }
        Value::Bin(b) => {
            write_len(out, b.len(), None, 0, [0xc4, 0xc5, 0xc6])?;
            out.extend_from_slice(b);
        }
        Value::Array(items) => {
            write_collection_len(out, items.len(), 0x90, 0xdc)?;
            for item in items {
                write_value(out, item)?;
            }
        }
        Value::Map(entries) => {
            write_collection_len(out, entries.len(), 0x80, 0xde)?;
            for (k, v) in entries {
                write_value(out, k)?;
                write_value(out, v)?;
            }
        }
        Value::Timestamp(ts) => write_ext(out, TIMESTAMP_EXT, &timestamp_payload(*ts))?,
        Value::Ext(kind, data) => write_ext(out, *kind, data)?,
    }
    Ok(())
}

fn write_uint(out: &mut Vec<u8>, v: u64) {
    if v <= 0x7f {
        out.push(v as u8);
    } else if v <= u64::from(u8::MAX) {
        out.push(0xcc);
        out.push(v as u8);
    } else if v <= u64::from(u16::MAX) {
        out.push(0xcd);
        out.extend_from_slice(&(v as u16).to_be_bytes());
    } else if v <= u64::from(u32::MAX) {
        out.push(0xce);
        out.extend_from_slice(&(v as u32).to_be_bytes());
    } else {
        out.push(0xcf);
        out.extend_from_slice(&v.to_be_bytes());
    }
}

fn write_int(out: &mut Vec<u8>, v: i64) {
    // A misplaced non-negative value still gets the unsigned forms
    if v >= 0 {
        return write_uint(out, v as u64);
    }

    if v >= -32 {
        out.push(v as i8 as u8);
    } else if v >= i64::from(i8::MIN) {
        out.push(0xd0);
        out.push(v as i8 as u8);
    } else if v >= i64::from(i16::MIN) {
        out.push(0xd1);
        out.extend_from_slice(&(v as i16).to_be_bytes());
    } else if v >= i64::from(i32::MIN) {
        out.push(0xd2);
        out.extend_from_slice(&(v as i32).to_be_bytes());
    } else {
        out.push(0xd3);
        out.extend_from_slice(&v.to_be_bytes());
    }
}

// Strings and binaries: optional fix form, then 8/16/32 bit lengths
fn write_len(
    out: &mut Vec<u8>,
    len: usize,
    fix: Option<u8>,
    fix_max: usize,
    tags: [u8; 3],
) -> Result<(), CodecError> {
    match fix {
        Some(base) if len <= fix_max => out.push(base | len as u8),
        _ if len <= usize::from(u8::MAX) => {
            out.push(tags[0]);
            out.push(len as u8);
        }
        _ if len <= usize::from(u16::MAX) => {
            out.push(tags[1]);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
        _ => {
            let len32 = u32::try_from(len).map_err(|_| CodecError::LengthOverflow(len))?;
            out.push(tags[2]);
            out.extend_from_slice(&len32.to_be_bytes());
        }
    }
    Ok(())
}

// Arrays and maps have no 8 bit form
fn write_collection_len(out: &mut Vec<u8>, len: usize, fix: u8, tag16: u8) -> Result<(), CodecError> {
    if len <= 15 {
        out.push(fix | len as u8);
    } else if len <= usize::from(u16::MAX) {
        out.push(tag16);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        let len32 = u32::try_from(len).map_err(|_| CodecError::LengthOverflow(len))?;
        out.push(tag16 + 1);
        out.extend_from_slice(&len32.to_be_bytes());
    }
    Ok(())
}

fn write_ext(out: &mut Vec<u8>, kind: i8, data: &[u8]) -> Result<(), CodecError> {
    let fixext = match data.len() {
        1 => Some(0xd4),
        2 => Some(0xd5),
        4 => Some(0xd6),
        8 => Some(0xd7),
        16 => Some(0xd8),
        _ => None,
    };

    match fixext {
        Some(tag) => out.push(tag),
        None => write_len(out, data.len(), None, 0, [0xc7, 0xc8, 0xc9])?,
    }
    out.push(kind as u8);
    out.extend_from_slice(data);
    Ok(())
}

// 32 bit seconds, 30 bit nanos + 34 bit seconds, or 32 bit nanos + 64 bit signed seconds
fn timestamp_payload(ts: Timestamp) -> Vec<u8> {
    if ts.secs >= 0 && (ts.secs >> 34) == 0 {
        let packed = (u64::from(ts.nanos) << 34) | ts.secs as u64;
        if packed >> 32 == 0 {
            (packed as u32).to_be_bytes().to_vec()
        } else {
            packed.to_be_bytes().to_vec()
        }
    } else {
        let mut payload = Vec::with_capacity(12);
        payload.extend_from_slice(&ts.nanos.to_be_bytes());
        payload.extend_from_slice(&ts.secs.to_be_bytes());
        payload
    }
}

#[cfg(test)]
mod test_encode {
    use super::*;

    fn enc(v: Value) -> Vec<u8> {
        to_vec(&v).unwrap()
    }

    #[test]
    fn scalars() {
        assert_eq!(enc(Value::Nil), vec![0xc0]);
        assert_eq!(enc(Value::Bool(false)), vec![0xc2]);
        assert_eq!(enc(Value::Bool(true)), vec![0xc3]);
        assert_eq!(enc(Value::Float(1.5)), vec![0xcb, 0x3f, 0xf8, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn narrowest_unsigned() {
        assert_eq!(enc(Value::Uint(0)), vec![0x00]);
        assert_eq!(enc(Value::Uint(127)), vec![0x7f]);
        assert_eq!(enc(Value::Uint(128)), vec![0xcc, 0x80]);
        assert_eq!(enc(Value::Uint(256)), vec![0xcd, 0x01, 0x00]);
        assert_eq!(enc(Value::Uint(65536)), vec![0xce, 0, 1, 0, 0]);
        assert_eq!(enc(Value::Uint(1 << 32)), vec![0xcf, 0, 0, 0, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn narrowest_signed() {
        assert_eq!(enc(Value::Int(-1)), vec![0xff]);
        assert_eq!(enc(Value::Int(-32)), vec![0xe0]);
        assert_eq!(enc(Value::Int(-33)), vec![0xd0, 0xdf]);
        assert_eq!(enc(Value::Int(-129)), vec![0xd1, 0xff, 0x7f]);
        assert_eq!(enc(Value::Int(-32769)), vec![0xd2, 0xff, 0xff, 0x7f, 0xff]);
        assert_eq!(enc(Value::Int(i64::MIN))[0], 0xd3);
        assert_eq!(enc(Value::Int(5)), vec![0x05]);
    }

    #[test]
    fn strings() {
        assert_eq!(enc("abc".into()), vec![0xa3, b'a', b'b', b'c']);
        assert_eq!(&enc(Value::Str("x".repeat(32)))[..2], &[0xd9, 32]);
        assert_eq!(&enc(Value::Str("x".repeat(256)))[..3], &[0xda, 0x01, 0x00]);
        assert_eq!(&enc(Value::Str("x".repeat(65536)))[..5], &[0xdb, 0, 1, 0, 0]);
    }

    #[test]
    fn binaries() {
        assert_eq!(enc(Value::Bin(vec![])), vec![0xc4, 0]);
        assert_eq!(&enc(Value::Bin(vec![0; 300]))[..3], &[0xc5, 0x01, 0x2c]);
    }

    #[test]
    fn collections() {
        assert_eq!(enc(Value::Array(vec![])), vec![0x90]);
        assert_eq!(enc(Value::Array(vec![Value::Nil; 16]))[..3], [0xdc, 0, 16]);
        assert_eq!(
            enc(Value::Map(vec![("a".into(), Value::Uint(1))])),
            vec![0x81, 0xa1, b'a', 0x01]
        );
    }

    #[test]
    fn extensions() {
        assert_eq!(enc(Value::Ext(5, vec![9])), vec![0xd4, 5, 9]);
        assert_eq!(enc(Value::Ext(5, vec![1, 2, 3])), vec![0xc7, 3, 5, 1, 2, 3]);
    }

    #[test]
    fn timestamps() {
        let ts32 = enc(Value::Timestamp(Timestamp { secs: 1, nanos: 0 }));
        assert_eq!(ts32, vec![0xd6, 0xff, 0, 0, 0, 1]);

        let ts64 = enc(Value::Timestamp(Timestamp { secs: 1, nanos: 1 }));
        assert_eq!(ts64[..2], [0xd7, 0xff]);
        assert_eq!(ts64.len(), 10);

        let ts96 = enc(Value::Timestamp(Timestamp { secs: -1, nanos: 0 }));
        assert_eq!(ts96[..3], [0xc7, 12, 0xff]);
        assert_eq!(ts96.len(), 15);
    }
}
