use std::ops::Range;

pub const MAX_CHUNK_SIZE: usize = 256 * 1024;
pub const MIN_CHUNK_SIZE: usize = 32 * 1024;

/// Split `len` bytes into chunk ranges of at most `MAX_CHUNK_SIZE`.
///
/// When a full chunk would leave a tail under `MIN_CHUNK_SIZE`, the
/// second to last chunk takes half of what is left (rounded up) instead.
/// No empty chunk is produced, an empty blob has no chunks.
pub fn layout(len: usize) -> Vec<Range<usize>> {
    let mut out = vec![];
    let mut cursor = 0;
    let mut rest = len;

    while rest >= MAX_CHUNK_SIZE {
        let mut size = MAX_CHUNK_SIZE;

        let next = rest - MAX_CHUNK_SIZE;
        if next > 0 && next < MIN_CHUNK_SIZE {
            size = rest.div_ceil(2);
        }

        out.push(cursor..cursor + size);
        cursor += size;
        rest -= size;
    }

    if rest > 0 {
        out.push(cursor..cursor + rest);
    }
    out
}
