use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ArchiveError;

/// Cooperative cancellation signal, checked at every loop boundary of the
/// long running operations. Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), ArchiveError> {
        if self.is_cancelled() {
            Err(ArchiveError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Progress sink: a label (file path or artifact id) and a 0.0..=1.0 fraction.
pub trait Progress {
    fn report(&mut self, label: &str, fraction: f64);
}

impl<F: FnMut(&str, f64)> Progress for F {
    fn report(&mut self, label: &str, fraction: f64) {
        self(label, fraction)
    }
}

pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&mut self, _label: &str, _fraction: f64) {}
}

#[cfg(test)]
mod test_cancel {
    use super::*;

    #[test]
    fn shared_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());

        other.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(ArchiveError::Cancelled)));
    }

    #[test]
    fn closure_progress() {
        let mut seen = vec![];
        {
            let mut sink = |label: &str, f: f64| seen.push((label.to_string(), f));
            sink.report("a", 0.5);
            sink.report("b", 1.0);
        }
        assert_eq!(seen, vec![("a".to_string(), 0.5), ("b".to_string(), 1.0)]);
    }
}
