pub mod artifact;
pub mod cancel;
pub mod envelope;
pub mod error;
pub mod manifest;
pub mod media;
pub mod tree;

pub use artifact::{Artifact, State, UNDECRYPTABLE_TITLE};
pub use cancel::{CancelToken, NoProgress, Progress};
pub use envelope::{Envelope, EnvelopeConfig, MAX_DATA_SIZE};
pub use error::{ArchiveError, ErrorKind};
pub use manifest::Manifest;
