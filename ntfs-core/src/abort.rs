use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Error;

/// Sticky, clonable abort flag shared by a volume and everything opened
/// from it. Checked before each block-source read, each MFT-entry parse,
/// and each index node decode; once set, every subsequent check fails
/// until the volume (and this flag) is dropped.
#[derive(Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn signal(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_signalled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Err(Error::AbortRequested)` if the flag is set, else `Ok(())`.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_signalled() {
            Err(Error::AbortRequested)
        } else {
            Ok(())
        }
    }
}
