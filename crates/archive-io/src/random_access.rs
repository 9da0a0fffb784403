#[cfg(feature = "file")]
use std::fs::File;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(feature = "file")]
use positioned_io::{ReadAt, Size};

use crate::error::Error;

/// A cooperative cancellation flag shared between a caller and whatever
/// `RandomAccess` read it is waiting on. Observable within one in-flight
/// I/O quantum, per spec §4.1.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True if [`Self::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A uniform byte-range reader: the common interface over in-memory,
/// file-backed, and HTTP-range-backed archive sources (C1).
pub trait RandomAccess: Send + Sync {
    /// Total byte length of the source, or a typed error when it cannot be
    /// determined (e.g. a chunked HTTP response with no `Content-Length`).
    fn size(&self) -> Result<u64, Error>;

    /// Read exactly `length` bytes starting at `offset`, or fewer only when
    /// the read reaches the end of the source. Fails with
    /// [`Error::InvalidRange`] if the range starts beyond the source's size.
    fn read(&self, offset: u64, length: u64, cancel: &CancelToken) -> Result<Vec<u8>, Error>;

    /// Release any resources held open by this source (file descriptors,
    /// connections). Safe to call more than once.
    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// An in-memory `RandomAccess` backed by an owned byte buffer.
pub struct MemoryAccess {
    data: Vec<u8>,
}

impl MemoryAccess {
    /// Wrap an owned buffer as a random-access source.
    pub fn new(data: Vec<u8>) -> Self {
        MemoryAccess { data }
    }
}

impl RandomAccess for MemoryAccess {
    fn size(&self) -> Result<u64, Error> {
        Ok(self.data.len() as u64)
    }

    fn read(&self, offset: u64, length: u64, cancel: &CancelToken) -> Result<Vec<u8>, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let size = self.data.len() as u64;
        if offset > size {
            return Err(Error::InvalidRange { offset, length, size: Some(size) });
        }
        let end = (offset + length).min(size);
        Ok(self.data[offset as usize..end as usize].to_vec())
    }
}

/// A file-backed `RandomAccess`, reading via `positioned_io::ReadAt` so
/// concurrent reads never need to share a cursor or take a lock.
#[cfg(feature = "file")]
pub struct FileAccess {
    file: File,
    size: u64,
}

#[cfg(feature = "file")]
impl FileAccess {
    /// Open a file and eagerly determine its size.
    pub fn open(file: File) -> Result<Self, Error> {
        let size = file.size()?.ok_or(Error::SizeUnavailable)?;
        Ok(FileAccess { file, size })
    }
}

#[cfg(feature = "file")]
impl RandomAccess for FileAccess {
    fn size(&self) -> Result<u64, Error> {
        Ok(self.size)
    }

    fn read(&self, offset: u64, length: u64, cancel: &CancelToken) -> Result<Vec<u8>, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if offset > self.size {
            return Err(Error::InvalidRange { offset, length, size: Some(self.size) });
        }
        let end = (offset + length).min(self.size);
        let want = (end - offset) as usize;
        let mut buf = vec![0u8; want];
        let mut total = 0;
        while total < want {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let n = self.file.read_at(offset + total as u64, &mut buf[total..])?;
            if n == 0 {
                buf.truncate(total);
                break;
            }
            total += n;
        }
        Ok(buf)
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_access_reads_subrange() {
        let source = MemoryAccess::new(b"hello world".to_vec());
        let cancel = CancelToken::new();
        let data = source.read(6, 5, &cancel).unwrap();
        assert_eq!(data, b"world");
    }

    #[test]
    fn memory_access_clamps_to_end() {
        let source = MemoryAccess::new(b"hello".to_vec());
        let cancel = CancelToken::new();
        let data = source.read(3, 100, &cancel).unwrap();
        assert_eq!(data, b"lo");
    }

    #[test]
    fn cancelled_token_rejects_read() {
        let source = MemoryAccess::new(b"hello".to_vec());
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = source.read(0, 1, &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn offset_beyond_size_is_invalid_range() {
        let source = MemoryAccess::new(b"hello".to_vec());
        let cancel = CancelToken::new();
        let err = source.read(100, 1, &cancel).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));
    }
}
