use sha2::{Digest, Sha256};

use crate::base64;

// Ids handed out by the blob store, the digest of the stored bytes
#[derive(PartialEq, Eq, Clone, Debug, std::hash::Hash)]
pub struct Hash(blake3::Hash);

pub fn hash_bytes(data: &[u8]) -> Hash {
    Hash(blake3::hash(data))
}

impl Hash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub fn to_id(&self) -> String {
        base64::encode_url(self.as_bytes())
    }
}

/// SHA-256 digest, used for owner addresses.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

#[cfg(test)]
mod test_hash {
    use super::*;

    #[test]
    fn id_shape() {
        let h = hash_bytes(b"some blob");
        let id = h.to_id();
        assert_eq!(id.len(), 43);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(base64::decode(&id).unwrap(), h.as_bytes());
        assert_ne!(hash_bytes(b"other blob").to_id(), id);
    }

    #[test]
    fn sha256_vector() {
        let digest = sha256(b"abc");
        assert_eq!(
            base64::encode(&digest, base64::Alphabet::Standard),
            "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0="
        );
    }
}
