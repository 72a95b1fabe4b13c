use thiserror::Error;

use wcore::crypto::CryptoError;
use wcore::key::KeyError;
use wcore::msgpack::CodecError;

/// Coarse failure class, what a caller can do about an error depends
/// only on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unknown data, never worth retrying
    Format,
    /// Not addressed to this recipient, or unusable key material
    Key,
    /// Authentication failure or a size that disagrees with what was declared
    Integrity,
    /// Cooperative cancellation, the operation may be retried
    Cancelled,
    /// Operation invoked on the wrong kind of entry or state
    Contract,
    Io,
    Remote,
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("format error: {0}")]
    Format(String),
    #[error("format error: {0}")]
    Codec(#[from] CodecError),
    #[error("artifact is not addressed to this recipient")]
    NotRecipient,
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("integrity error: {0}")]
    Integrity(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("contract violation: {0}")]
    Contract(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("remote error: {0}")]
    Remote(String),
}

impl ArchiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::Format(_) | ArchiveError::Codec(_) => ErrorKind::Format,
            ArchiveError::NotRecipient | ArchiveError::Key(_) => ErrorKind::Key,
            ArchiveError::Integrity(_) => ErrorKind::Integrity,
            ArchiveError::Cancelled => ErrorKind::Cancelled,
            ArchiveError::Contract(_) => ErrorKind::Contract,
            ArchiveError::Io(_) => ErrorKind::Io,
            ArchiveError::Remote(_) => ErrorKind::Remote,
        }
    }

    /// AEAD failures on decode are integrity failures, anything else on the
    /// symmetric path is a misuse of the key material.
    pub(crate) fn from_crypto(err: CryptoError, zone: &str) -> ArchiveError {
        match err {
            CryptoError::Open => ArchiveError::Integrity(format!("{} failed authentication", zone)),
            e => ArchiveError::Contract(format!("{}: {}", zone, e)),
        }
    }
}
