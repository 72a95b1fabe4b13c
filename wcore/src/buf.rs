use std::io::Read;

use byteorder::{BigEndian, ByteOrder};

// Fixed width big endian access into a byte view. There is no implicit
// growth, the caller must guarantee `offset + width <= buf.len()`.
pub fn read_u8(buf: &[u8], offset: usize) -> u8 {
    buf[offset]
}

pub fn read_u16(buf: &[u8], offset: usize) -> u16 {
    BigEndian::read_u16(&buf[offset..])
}

pub fn read_u32(buf: &[u8], offset: usize) -> u32 {
    BigEndian::read_u32(&buf[offset..])
}

pub fn read_u64(buf: &[u8], offset: usize) -> u64 {
    BigEndian::read_u64(&buf[offset..])
}

pub fn write_u8(buf: &mut [u8], offset: usize, value: u8) {
    buf[offset] = value;
}

pub fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    BigEndian::write_u16(&mut buf[offset..], value);
}

pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    BigEndian::write_u32(&mut buf[offset..], value);
}

pub fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    BigEndian::write_u64(&mut buf[offset..], value);
}

/// Read from `reader` until `dest` is full, retrying interrupted reads.
/// A count below `dest.len()` means the reader ran dry.
pub fn read_into<R: Read>(reader: &mut R, dest: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < dest.len() {
        match reader.read(&mut dest[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => (),
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
