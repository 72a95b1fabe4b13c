use log::{debug, info, warn};

use remote::{ChunkSource, ManifestDescriptor};
use wcore::key::PrivateKey;

use crate::cancel::{CancelToken, Progress};
use crate::envelope::{Envelope, Session};
use crate::error::ArchiveError;
use crate::manifest::Manifest;
use crate::tree::FlatEntry;

/// Title shown for artifacts that could not be opened
pub const UNDECRYPTABLE_TITLE: &str = "~unable to decrypt this tx~";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Nothing parsed yet
    Empty,
    /// Index known, `missing` content bytes still on the network
    AwaitingMoreChunks { missing: u64 },
    ContentReady,
    /// Leading chunk could not be opened, see the error `open` returned
    Undecryptable,
}

/// One published artifact as seen by its recipient.
///
/// `open` parses the leading chunk of the descriptor, `fetch_remaining`
/// pulls the rest from a chunk source and decrypts the content.
pub struct Artifact {
    descriptor: ManifestDescriptor,
    state: State,
    opened: Option<(Session, Manifest)>,
    content: Option<Vec<u8>>,

    // Bytes past the leading chunk, survives a cancelled fetch
    fetched: Vec<u8>,
    fetch_start: u64,
    downloading: bool,
    percent: f64,
}

impl Artifact {
    pub fn new(descriptor: ManifestDescriptor) -> Self {
        let fetch_start = descriptor.next_fetch_offset;
        Artifact {
            descriptor,
            state: State::Empty,
            opened: None,
            content: None,
            fetched: vec![],
            fetch_start,
            downloading: false,
            percent: 0.0,
        }
    }

    pub fn descriptor(&self) -> &ManifestDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_downloading(&self) -> bool {
        self.downloading
    }

    /// 0 to 100 over the bytes that were missing after `open`
    pub fn percent_complete(&self) -> f64 {
        self.percent
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.opened.as_ref().map(|(_, m)| m)
    }

    pub fn title(&self) -> &str {
        match (&self.state, self.manifest()) {
            (State::Undecryptable, _) => UNDECRYPTABLE_TITLE,
            (_, Some(m)) => &m.title,
            (_, None) => "",
        }
    }

    /// Parse the leading chunk. Any failure leaves the artifact
    /// undecryptable; opening again (say with another key) is allowed.
    pub fn open(&mut self, envelope: &Envelope, key: &PrivateKey) -> Result<(), ArchiveError> {
        match self.state {
            State::Empty | State::Undecryptable => (),
            _ => return Err(ArchiveError::Contract(format!("{} is already open", self.descriptor.id))),
        }

        let opened = match envelope.parse_leading_chunk(&self.descriptor.leading_chunk, self.descriptor.total_size, key) {
            Ok(opened) => opened,
            Err(e) => {
                warn!("{}: {}", self.descriptor.id, e);
                self.state = State::Undecryptable;
                return Err(e);
            }
        };

        self.state = match opened.content {
            Some(content) => {
                self.content = Some(content);
                self.percent = 100.0;
                State::ContentReady
            }
            None => State::AwaitingMoreChunks {
                missing: self.descriptor.missing(),
            },
        };
        info!("{}: opened {:?}", self.descriptor.id, self.state);
        self.opened = Some((opened.session, opened.manifest));
        Ok(())
    }

    /// Pull the missing bytes from `source` and decrypt the content.
    ///
    /// Does nothing while a fetch is running or once content is ready.
    /// A cancelled fetch keeps what it got, the next call resumes there.
    pub fn fetch_remaining<S: ChunkSource + ?Sized, P: Progress>(
        &mut self,
        envelope: &Envelope,
        source: &S,
        cancel: &CancelToken,
        progress: &mut P,
    ) -> Result<(), ArchiveError> {
        if self.downloading || self.state == State::ContentReady {
            return Ok(());
        }
        let missing = match self.state {
            State::AwaitingMoreChunks { missing } => missing,
            _ => {
                return Err(ArchiveError::Contract(format!(
                    "{} has no readable index",
                    self.descriptor.id
                )))
            }
        };

        self.downloading = true;
        let result = self.fetch_loop(envelope, source, missing, cancel, progress);
        self.downloading = false;

        if let Err(e) = &result {
            if e.kind() != crate::error::ErrorKind::Cancelled {
                self.reset_fetch();
            }
        }
        result
    }

    fn fetch_loop<S: ChunkSource + ?Sized, P: Progress>(
        &mut self,
        envelope: &Envelope,
        source: &S,
        missing: u64,
        cancel: &CancelToken,
        progress: &mut P,
    ) -> Result<(), ArchiveError> {
        if self.fetched.capacity() == 0 {
            let cap = missing.min(envelope.config().max_data_size);
            self.fetched.reserve(cap as usize);
        }

        while (self.fetched.len() as u64) < missing {
            cancel.check()?;

            let offset = self.descriptor.next_fetch_offset;
            let chunk = source.get_chunk(offset).map_err(ArchiveError::Remote)?;
            if chunk.is_empty() {
                return Err(ArchiveError::Remote(format!("empty chunk at offset {}", offset)));
            }

            let have = self.fetched.len() as u64 + chunk.len() as u64;
            if have > missing {
                return Err(ArchiveError::Integrity(format!(
                    "fetched {} bytes, only {} were missing",
                    have, missing
                )));
            }

            debug!("{}: chunk at {}, {} bytes", self.descriptor.id, offset, chunk.len());
            self.fetched.extend_from_slice(&chunk);
            self.descriptor.next_fetch_offset += chunk.len() as u64;
            self.percent = have as f64 / missing as f64 * 100.0;
            progress.report(&self.descriptor.id, have as f64 / missing as f64);
        }

        let (session, manifest) = self
            .opened
            .as_ref()
            .ok_or_else(|| ArchiveError::Contract("artifact lost its session".to_string()))?;

        let mut full = Vec::with_capacity(self.descriptor.leading_chunk.len() + self.fetched.len());
        full.extend_from_slice(&self.descriptor.leading_chunk);
        full.extend_from_slice(&self.fetched);

        let content = envelope.finalize_content(session, manifest, &full)?;
        info!("{}: content ready, {} bytes", self.descriptor.id, content.len());

        self.content = Some(content);
        self.fetched = vec![];
        self.state = State::ContentReady;
        Ok(())
    }

    // Drop partial progress after a failure that is not a cancellation
    fn reset_fetch(&mut self) {
        self.fetched = vec![];
        self.descriptor.next_fetch_offset = self.fetch_start;
        self.percent = 0.0;
    }

    /// Files listed by the index, available once opened.
    pub fn files(&self) -> Result<Vec<FlatEntry>, ArchiveError> {
        let manifest = self
            .manifest()
            .ok_or_else(|| ArchiveError::Contract(format!("{} is not open", self.descriptor.id)))?;
        Ok(manifest.tree.flatten_entries(true))
    }

    /// Decrypted bytes of one file, a view into the artifact's content.
    pub fn file_bytes(&self, path: &str) -> Result<&[u8], ArchiveError> {
        let content = self
            .content
            .as_ref()
            .ok_or_else(|| ArchiveError::Contract(format!("{} content is not ready", self.descriptor.id)))?;
        let manifest = self
            .manifest()
            .ok_or_else(|| ArchiveError::Contract(format!("{} is not open", self.descriptor.id)))?;

        let entry = manifest
            .tree
            .find(path)
            .and_then(|id| manifest.tree.get(id))
            .filter(|e| !e.is_dir())
            .ok_or_else(|| ArchiveError::Contract(format!("no file {}", path)))?;

        let outside = || ArchiveError::Integrity(format!("{} lies outside of the content", path));
        let end = entry.offset.checked_add(entry.size).ok_or_else(outside)?;
        let start = usize::try_from(entry.offset).map_err(|_| outside())?;
        let end = usize::try_from(end).map_err(|_| outside())?;
        content.get(start..end).ok_or_else(outside)
    }
}
