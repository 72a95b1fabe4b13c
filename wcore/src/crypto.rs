use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use sodiumoxide::randombytes::randombytes_into;
use sodiumoxide::utils::memzero;
use thiserror::Error;

pub const KEY_SIZE: usize = 32;
pub const SALT_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    #[error("crypto library could not be initialized")]
    Init,
    #[error("invalid {what} length: expected {expected}, got {got}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("encryption failed")]
    Seal,
    #[error("authentication failed")]
    Open,
}

pub fn init() -> Result<(), CryptoError> {
    sodiumoxide::init().map_err(|_| CryptoError::Init)
}

/// Per artifact symmetric key material, the salt doubles as the GCM nonce.
/// Both are wiped when dropped.
pub struct SymKey {
    key: [u8; KEY_SIZE],
    salt: [u8; SALT_SIZE],
}

impl SymKey {
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        let mut salt = [0u8; SALT_SIZE];
        randombytes_into(&mut key);
        randombytes_into(&mut salt);
        SymKey { key, salt }
    }

    pub fn from_slices(key: &[u8], salt: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_SIZE] = key.try_into().map_err(|_| CryptoError::InvalidLength {
            what: "key",
            expected: KEY_SIZE,
            got: key.len(),
        })?;
        let salt: [u8; SALT_SIZE] = salt.try_into().map_err(|_| CryptoError::InvalidLength {
            what: "salt",
            expected: SALT_SIZE,
            got: salt.len(),
        })?;
        Ok(SymKey { key, salt })
    }

    pub fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    pub fn salt(&self) -> &[u8; SALT_SIZE] {
        &self.salt
    }

    fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::InvalidLength {
            what: "key",
            expected: KEY_SIZE,
            got: self.key.len(),
        })
    }

    /// AES-256-GCM, output is the ciphertext followed by the 16 byte tag.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let payload = Payload { msg: plaintext, aad };
        self.cipher()?
            .encrypt(Nonce::from_slice(&self.salt), payload)
            .map_err(|_| CryptoError::Seal)
    }

    pub fn open(&self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let payload = Payload { msg: ciphertext, aad };
        self.cipher()?
            .decrypt(Nonce::from_slice(&self.salt), payload)
            .map_err(|_| CryptoError::Open)
    }
}

impl Drop for SymKey {
    fn drop(&mut self) {
        memzero(&mut self.key);
        memzero(&mut self.salt);
    }
}

impl std::fmt::Debug for SymKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("SymKey(..)")
    }
}
