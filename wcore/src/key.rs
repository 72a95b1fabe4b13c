use std::fmt;

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;

use crate::base64;
use crate::hash::sha256;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("unable to parse key: {0}")]
    Parse(String),
    #[error("asymmetric encryption failed: {0}")]
    Wrap(rsa::Error),
    #[error("asymmetric decryption failed")]
    Unwrap,
}

// Asymmetric scheme:
//  1. Fresh symmetric key + salt per artifact
//  2. RSA-OAEP(SHA-256) wraps the boot record holding that key for the recipient
//  3. Recipient unwraps the boot record with their private key
//
// The recipient identity (address) is the SHA-256 of the public modulus.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

impl PublicKey {
    /// SPKI (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`) PEM
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map(PublicKey)
            .map_err(|e| KeyError::Parse(e.to_string()))
    }

    /// Modulus size in bytes, which is also the wrapped block size
    pub fn size(&self) -> usize {
        self.0.size()
    }

    pub fn address(&self) -> String {
        base64::encode_url(&sha256(&self.0.n().to_bytes_be()))
    }

    pub fn encrypt_block(&self, data: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.0
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), data)
            .map_err(KeyError::Wrap)
    }
}

impl PrivateKey {
    /// PKCS#8 (`PRIVATE KEY`) or PKCS#1 (`RSA PRIVATE KEY`) PEM
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map(PrivateKey)
            .map_err(|e| KeyError::Parse(e.to_string()))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.to_public_key())
    }

    pub fn size(&self) -> usize {
        self.0.size()
    }

    // Any failure means the block was not wrapped for this key; the cause
    // is not exposed
    pub fn decrypt_block(&self, block: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.0
            .decrypt(Oaep::new::<Sha256>(), block)
            .map_err(|_| KeyError::Unwrap)
    }
}

impl From<RsaPrivateKey> for PrivateKey {
    fn from(key: RsaPrivateKey) -> Self {
        PrivateKey(key)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PublicKey({})", self.address())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}
