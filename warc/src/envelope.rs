//! Artifact byte layout
//!
//! ```text
//! +--------------------+----------------------+------------------------+
//! | asym block (512 B) | encrypted index      | encrypted content      |
//! | RSA-OAEP(boot)     | AES-GCM(manifest)    | AES-GCM(file bytes)    |
//! +--------------------+----------------------+------------------------+
//!                      |<- boot.index_len  ->|<- rest of the blob  ->|
//! ```
//!
//! The boot record is `[format_version, bin(key), bin(salt), index_len]`
//! and must fit in a single asymmetric block. Index and content are both
//! sealed with the boot record's key and salt under the fixed associated
//! data.
use log::{debug, info};
use serde::{Deserialize, Serialize};

use wcore::crypto::{self, SymKey, KEY_SIZE, SALT_SIZE, TAG_SIZE};
use wcore::key::{PrivateKey, PublicKey};
use wcore::msgpack::{self, Value};

use crate::cancel::{CancelToken, Progress};
use crate::error::ArchiveError;
use crate::manifest::Manifest;

/// Upper bound for the content of a single artifact
pub const MAX_DATA_SIZE: u64 = 188 * 1024 * 1024;

/// Wire constants, passed explicitly to [`Envelope::new`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    pub format_version: u8,
    /// Output size of one asymmetric encryption, RSA-4096
    pub asym_block_size: usize,
    /// Largest payload one asymmetric block takes, OAEP with SHA-256
    pub asym_in_block_limit: usize,
    pub sym_key_size: usize,
    pub salt_size: usize,
    pub associated_data: String,
    pub max_data_size: u64,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        EnvelopeConfig {
            format_version: 1,
            asym_block_size: 512,
            asym_in_block_limit: 446,
            sym_key_size: KEY_SIZE,
            salt_size: SALT_SIZE,
            associated_data: "weavebox.app".to_string(),
            max_data_size: MAX_DATA_SIZE,
        }
    }
}

/// Decrypted boot record, enough to open the rest of the artifact.
pub struct Session {
    key: SymKey,
    index_len: usize,
    total_size: u64,
}

impl Session {
    /// Byte offset of the encrypted content zone
    pub fn content_offset(&self, config: &EnvelopeConfig) -> usize {
        config.asym_block_size + self.index_len
    }

    pub fn index_len(&self) -> usize {
        self.index_len
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("index_len", &self.index_len)
            .field("total_size", &self.total_size)
            .finish_non_exhaustive()
    }
}

/// Result of parsing a leading chunk. `content` is only present when the
/// chunk already held the whole artifact.
#[derive(Debug)]
pub struct Opened {
    pub session: Session,
    pub manifest: Manifest,
    pub content: Option<Vec<u8>>,
}

#[derive(Debug)]
pub struct Envelope {
    config: EnvelopeConfig,
}

impl Envelope {
    /// Validate `config` and ready the random source used for session keys.
    pub fn new(config: EnvelopeConfig) -> Result<Envelope, ArchiveError> {
        crypto::init().map_err(|e| ArchiveError::from_crypto(e, "random source"))?;

        if config.format_version != 1 {
            return Err(ArchiveError::Contract(format!(
                "unsupported format version {}",
                config.format_version
            )));
        }
        if config.sym_key_size != KEY_SIZE || config.salt_size != SALT_SIZE {
            return Err(ArchiveError::Contract(format!(
                "AES-256-GCM needs a {} byte key and {} byte salt",
                KEY_SIZE, SALT_SIZE
            )));
        }
        if config.asym_in_block_limit >= config.asym_block_size {
            return Err(ArchiveError::Contract(
                "asymmetric payload limit must be below the block size".to_string(),
            ));
        }
        Ok(Envelope { config })
    }

    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    fn aad(&self) -> &[u8] {
        self.config.associated_data.as_bytes()
    }

    /// Seal `manifest` and its file bytes for `recipient`.
    pub fn build_artifact<P: Progress>(
        &self,
        manifest: &mut Manifest,
        recipient: &PublicKey,
        cancel: &CancelToken,
        progress: &mut P,
    ) -> Result<Vec<u8>, ArchiveError> {
        if recipient.size() != self.config.asym_block_size {
            return Err(ArchiveError::Contract(format!(
                "recipient key yields {} byte blocks, expected {}",
                recipient.size(),
                self.config.asym_block_size
            )));
        }

        let index = manifest.encode()?;
        if !manifest.tree.has_files() {
            return Err(ArchiveError::Contract("an artifact needs at least one file".to_string()));
        }
        let content_size = manifest.tree.total_size();
        if content_size > self.config.max_data_size {
            return Err(ArchiveError::Contract(format!(
                "{} bytes of content exceed the {} byte limit",
                content_size, self.config.max_data_size
            )));
        }

        let key = SymKey::generate();
        let sealed_index = key
            .seal(&index, self.aad())
            .map_err(|e| ArchiveError::from_crypto(e, "index"))?;
        let index_len = u16::try_from(sealed_index.len()).map_err(|_| {
            ArchiveError::Contract(format!("encrypted index is {} bytes", sealed_index.len()))
        })?;

        let boot = msgpack::to_vec(&Value::Array(vec![
            Value::from(self.config.format_version),
            Value::Bin(key.key().to_vec()),
            Value::Bin(key.salt().to_vec()),
            Value::from(index_len),
        ]))?;
        if boot.len() > self.config.asym_in_block_limit {
            return Err(ArchiveError::Contract(format!(
                "boot record is {} bytes, limit is {}",
                boot.len(),
                self.config.asym_in_block_limit
            )));
        }

        let block = recipient.encrypt_block(&boot)?;
        if block.len() != self.config.asym_block_size {
            return Err(ArchiveError::Contract(format!(
                "asymmetric block is {} bytes, expected {}",
                block.len(),
                self.config.asym_block_size
            )));
        }

        let content = manifest.tree.load_data(cancel, progress)?;
        let sealed_content = key
            .seal(&content, self.aad())
            .map_err(|e| ArchiveError::from_crypto(e, "content"))?;

        info!(
            "artifact for {}: {} byte block, {} byte index, {} byte content",
            recipient.address(),
            block.len(),
            sealed_index.len(),
            sealed_content.len()
        );

        let mut out = Vec::with_capacity(block.len() + sealed_index.len() + sealed_content.len());
        out.extend_from_slice(&block);
        out.extend_from_slice(&sealed_index);
        out.extend_from_slice(&sealed_content);
        Ok(out)
    }

    /// Recover the key and manifest from the front of an artifact of
    /// `total_size` bytes. Content is decrypted too when `chunk` is the
    /// whole artifact.
    pub fn parse_leading_chunk(
        &self,
        chunk: &[u8],
        total_size: u64,
        recipient: &PrivateKey,
    ) -> Result<Opened, ArchiveError> {
        let block_size = self.config.asym_block_size;
        if chunk.len() < block_size {
            return Err(ArchiveError::Integrity(format!(
                "leading chunk is {} bytes, smaller than one {} byte block",
                chunk.len(),
                block_size
            )));
        }
        if chunk.len() as u64 > total_size {
            return Err(ArchiveError::Integrity(format!(
                "leading chunk is {} bytes, artifact declares {}",
                chunk.len(),
                total_size
            )));
        }

        let boot = recipient
            .decrypt_block(&chunk[..block_size])
            .map_err(|_| ArchiveError::NotRecipient)?;
        let session = self.decode_boot(&boot, total_size)?;
        debug!("boot record: {} byte index", session.index_len);

        let index_end = block_size + session.index_len;
        if chunk.len() < index_end {
            return Err(ArchiveError::Integrity(format!(
                "leading chunk is {} bytes, index ends at {}",
                chunk.len(),
                index_end
            )));
        }

        let index = session
            .key
            .open(&chunk[block_size..index_end], self.aad())
            .map_err(|e| ArchiveError::from_crypto(e, "index"))?;
        let manifest = Manifest::decode(&index)?;

        let content = if chunk.len() as u64 == total_size {
            Some(self.open_content(&session, &manifest, chunk)?)
        } else {
            None
        };

        Ok(Opened {
            session,
            manifest,
            content,
        })
    }

    fn decode_boot(&self, boot: &[u8], total_size: u64) -> Result<Session, ArchiveError> {
        let value = msgpack::from_slice(boot)?;
        let fields = match value.as_array() {
            Some([version, key, salt, index_len]) => (version, key, salt, index_len),
            _ => return Err(ArchiveError::Format("boot record is not a 4 field array".to_string())),
        };

        let version = fields.0.as_u64();
        if version != Some(u64::from(self.config.format_version)) {
            return Err(ArchiveError::Format(format!("unknown format version {:?}", fields.0)));
        }

        let (key, salt) = match (fields.1.as_bin(), fields.2.as_bin()) {
            (Some(k), Some(s)) if k.len() == self.config.sym_key_size && s.len() == self.config.salt_size => (k, s),
            _ => return Err(ArchiveError::Format("boot record key material is malformed".to_string())),
        };
        let key = SymKey::from_slices(key, salt).map_err(|e| ArchiveError::Format(e.to_string()))?;

        let index_len = match fields.3.as_u64() {
            Some(0) => return Err(ArchiveError::Format("boot record has an empty index".to_string())),
            Some(n) if n <= u64::from(u16::MAX) => n as usize,
            _ => return Err(ArchiveError::Format("boot record index length is malformed".to_string())),
        };

        Ok(Session {
            key,
            index_len,
            total_size,
        })
    }

    /// Decrypt the content zone of a fully assembled artifact.
    pub fn finalize_content(&self, session: &Session, manifest: &Manifest, full: &[u8]) -> Result<Vec<u8>, ArchiveError> {
        if full.len() as u64 != session.total_size {
            return Err(ArchiveError::Integrity(format!(
                "assembled {} bytes, artifact declares {}",
                full.len(),
                session.total_size
            )));
        }
        self.open_content(session, manifest, full)
    }

    fn open_content(&self, session: &Session, manifest: &Manifest, full: &[u8]) -> Result<Vec<u8>, ArchiveError> {
        let start = session.content_offset(&self.config);
        if full.len() < start + TAG_SIZE {
            return Err(ArchiveError::Integrity(format!(
                "artifact of {} bytes has no room for content",
                full.len()
            )));
        }

        let content = session
            .key
            .open(&full[start..], self.aad())
            .map_err(|e| ArchiveError::from_crypto(e, "content"))?;
        if content.len() as u64 != manifest.tree.total_size() {
            return Err(ArchiveError::Integrity(format!(
                "content is {} bytes, index declares {}",
                content.len(),
                manifest.tree.total_size()
            )));
        }
        debug!("content ready, {} bytes", content.len());
        Ok(content)
    }
}
