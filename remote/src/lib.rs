//! Narrow interfaces to the blob network.
//!
//! The archive only ever publishes whole blobs, fetches runs of bytes at
//! absolute offsets and consumes descriptors produced by discovery. Errors
//! cross these seams as plain strings.
pub mod chunks;

#[cfg(feature = "sql")]
pub mod mem;

/// Tag name carrying the application marker on published blobs
pub const APP_TAG: &str = "App-Name";

/// Tag name carrying the recipient address on published blobs
pub const OWNER_TAG: &str = "Owner";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: &str, value: &str) -> Self {
        Tag {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Pointer to a published artifact plus the bytes fetched with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestDescriptor {
    pub id: String,
    pub total_size: u64,
    /// Absolute offset of the first byte not yet fetched
    pub next_fetch_offset: u64,
    pub leading_chunk: Vec<u8>,
    /// Unix seconds of publication, 0 when unknown
    pub timestamp: i64,
}

impl ManifestDescriptor {
    /// Descriptor for an artifact that is already entirely in hand.
    pub fn whole(id: &str, data: Vec<u8>) -> Self {
        ManifestDescriptor {
            id: id.to_string(),
            total_size: data.len() as u64,
            next_fetch_offset: data.len() as u64,
            leading_chunk: data,
            timestamp: 0,
        }
    }

    pub fn missing(&self) -> u64 {
        self.total_size.saturating_sub(self.leading_chunk.len() as u64)
    }
}

pub trait Publisher {
    /// Store `data` as one blob, returning its id.
    fn publish(&mut self, data: &[u8], tags: &[Tag]) -> Result<String, String>;
}

pub trait ChunkSource {
    /// A contiguous run starting at `offset`, of whatever length the source
    /// chooses. Callers derive the next offset from what they received.
    fn get_chunk(&self, offset: u64) -> Result<Vec<u8>, String>;
}

pub trait Discovery {
    /// Descriptors of every blob tagged for `owner` by `app`, newest first.
    /// Each carries at least `leading` bytes, or the whole blob if smaller.
    fn descriptors(&self, owner: &str, app: &str, leading: usize) -> Result<Vec<ManifestDescriptor>, String>;
}
