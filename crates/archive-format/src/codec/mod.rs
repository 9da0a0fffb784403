//! The codec pipeline (C5): a small state machine standing in for the
//! "pair of lazily-constructed promises" design note in spec §9 — readable
//! and writable ends that park until construction resolves, modeled here as
//! a `Pending -> Ready -> Failed` enum instead of async machinery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Error;
use crate::fsm::entry::{AnyDecompressor, DecompressOutcome, Decompressor, HasMoreInput};
use crate::parse::Method;

/// A cooperative cancellation flag. Cloning shares the same underlying flag;
/// decoder inner loops check it at least once per 16 KiB of processed input,
/// per spec §5.
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

/// Tracks bytes observed flowing through a pipeline stage, for progress
/// reporting (`bytesIn`/`bytesOut`, monotone per spec §5).
#[derive(Debug, Clone, Copy, Default)]
pub struct Progress {
    /// Total compressed bytes consumed so far.
    pub bytes_in: u64,
    /// Total uncompressed bytes produced so far.
    pub bytes_out: u64,
}

/// A lazily-constructed decode transform: wraps [`AnyDecompressor`]
/// construction (which can itself fail, e.g. an unsupported method) behind
/// a `Pending -> Ready -> Failed` state so a caller can build the pipeline
/// before it is known whether the method is actually supported, and so that
/// the first real `push()` is what surfaces the construction error.
enum Inner {
    Pending(Method),
    Ready(Box<AnyDecompressor>),
    Failed(String),
}

/// One stage of the codec pipeline: a lazy decompressor plus an output-byte
/// limiter and progress tap, wired to a shared [`CancelToken`].
pub struct Transform {
    inner: Inner,
    progress: Progress,
    max_output_bytes: Option<u64>,
    cancel: CancelToken,
}

impl Transform {
    /// Build a transform for `method`, deferring actual construction until
    /// the first `push()` (mirroring the "lazy transform" design note).
    pub fn new(method: Method, max_output_bytes: Option<u64>, cancel: CancelToken) -> Self {
        Transform {
            inner: Inner::Pending(method),
            progress: Progress::default(),
            max_output_bytes,
            cancel,
        }
    }

    /// Current progress counters.
    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Push `in_buf` through the transform, writing decoded bytes to `out`.
    /// Resolves pending construction on first call; once `Failed`, every
    /// call returns the same construction error.
    pub fn push(
        &mut self,
        in_buf: &[u8],
        out: &mut [u8],
        has_more_input: HasMoreInput,
    ) -> Result<DecompressOutcome, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if let Inner::Pending(method) = self.inner {
            self.inner = match AnyDecompressor::for_method(method) {
                Ok(d) => Inner::Ready(Box::new(d)),
                Err(e) => {
                    let msg = e.to_string();
                    self.inner = Inner::Failed(msg.clone());
                    return Err(e);
                }
            };
        }

        let decompressor = match &mut self.inner {
            Inner::Ready(d) => d,
            Inner::Failed(msg) => {
                return Err(Error::Internal(format!("transform construction previously failed: {msg}")))
            }
            Inner::Pending(_) => unreachable!("resolved above"),
        };

        // Enforce the cancellation and output-limit checks at a roughly
        // 16 KiB granularity even when the caller hands us larger buffers,
        // by processing in chunks.
        const CHUNK: usize = 16 * 1024;
        let mut total_read = 0;
        let mut total_written = 0;
        let mut in_off = 0;
        while in_off < in_buf.len() || total_written < out.len() {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let in_chunk_end = (in_off + CHUNK).min(in_buf.len());
            let out_chunk_end = (total_written + CHUNK).min(out.len());
            let outcome = decompressor.decompress(
                &in_buf[in_off..in_chunk_end],
                &mut out[total_written..out_chunk_end],
                has_more_input,
            )?;
            in_off += outcome.bytes_read;
            total_read += outcome.bytes_read;
            total_written += outcome.bytes_written;

            self.progress.bytes_in += outcome.bytes_read as u64;
            self.progress.bytes_out += outcome.bytes_written as u64;
            if let Some(limit) = self.max_output_bytes {
                if self.progress.bytes_out > limit {
                    return Err(Error::ResourceLimit(crate::error::ResourceLimitError {
                        limit_name: "maxOutputBytes",
                        limit: Some(limit),
                        required: Some(self.progress.bytes_out),
                    }));
                }
            }
            if outcome.bytes_read == 0 && outcome.bytes_written == 0 {
                break;
            }
        }

        Ok(DecompressOutcome { bytes_read: total_read, bytes_written: total_written })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_transform_passes_through() {
        let mut t = Transform::new(Method::Store, None, CancelToken::new());
        let input = b"hello world";
        let mut out = [0u8; 32];
        let outcome = t.push(input, &mut out, HasMoreInput::No).unwrap();
        assert_eq!(&out[..outcome.bytes_written], input);
    }

    #[test]
    fn cancelled_token_rejects_push() {
        let cancel = CancelToken::new();
        let mut t = Transform::new(Method::Store, None, cancel.clone());
        cancel.cancel();
        let mut out = [0u8; 8];
        let err = t.push(b"abc", &mut out, HasMoreInput::Yes).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn output_limit_is_enforced() {
        let mut t = Transform::new(Method::Store, Some(4), CancelToken::new());
        let mut out = [0u8; 32];
        let err = t.push(b"0123456789", &mut out, HasMoreInput::No).unwrap_err();
        assert!(matches!(err, Error::ResourceLimit(_)));
    }
}
