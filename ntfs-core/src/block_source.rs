use std::cell::RefCell;
use std::sync::Mutex;

use crate::error::Error;

/// L0, consumed: random-access read of the underlying image at absolute
/// offsets. The volume offset (the outer tool's `-o` flag) has already
/// been folded into every offset handed here by the caller - this trait
/// never sees it.
pub trait BlockSource: Send + Sync {
    /// Reads up to `buf.len()` bytes starting at `offset`, returning the
    /// number of bytes actually read. Short reads past end-of-image are
    /// allowed; they are not an error.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Error>;

    /// Total size of the image in bytes.
    fn size(&self) -> u64;
}

/// An in-memory [`BlockSource`] for tests and small images. Every read is
/// recorded so tests can assert that a sparse read never touched the
/// source, per the engine's testable properties.
pub struct MemorySource {
    data: Vec<u8>,
    reads: Mutex<RefCell<Vec<(u64, usize)>>>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            reads: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    /// `(offset, len)` pairs for every `read_at` call made so far.
    pub fn read_log(&self) -> Vec<(u64, usize)> {
        self.reads.lock().unwrap().borrow().clone()
    }

    pub fn read_count(&self) -> usize {
        self.reads.lock().unwrap().borrow().len()
    }

    pub fn clear_read_log(&self) {
        self.reads.lock().unwrap().borrow_mut().clear();
    }
}

impl BlockSource for MemorySource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        self.reads
            .lock()
            .unwrap()
            .borrow_mut()
            .push((offset, buf.len()));

        let offset = offset as usize;
        if offset >= self.data.len() {
            return Ok(0);
        }
        let available = self.data.len() - offset;
        let n = buf.len().min(available);
        buf[..n].copy_from_slice(&self.data[offset..offset + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
