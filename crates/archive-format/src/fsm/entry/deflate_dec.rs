use miniz_oxide::inflate::core::{decompress, DecompressorOxide};
use miniz_oxide::inflate::TINFLStatus;
use miniz_oxide::MZFlush;

use super::{DecompressOutcome, Decompressor, HasMoreInput};
use crate::error::Error;

/// Raw DEFLATE decoder, grounded on `miniz_oxide`'s low-level streaming API
/// (no zlib/gzip wrapper, since ZIP frames DEFLATE directly).
///
/// `miniz_oxide`'s `decompress` writes into a single output buffer and uses
/// a sliding window internal to that buffer (back-references may point up to
/// 32 KiB behind the current write position), so we keep a private
/// circular buffer rather than decompressing straight into the caller's
/// (possibly small, possibly non-circular) `out` slice.
#[derive(Debug)]
pub struct DeflateDec {
    inner: Box<DecompressorOxide>,
    ring: Vec<u8>,
    ring_pos: usize,
}

const RING_SIZE: usize = 32 * 1024;

impl DeflateDec {
    /// Construct a fresh DEFLATE decoder.
    pub fn new() -> Self {
        DeflateDec {
            inner: Box::default(),
            ring: vec![0u8; RING_SIZE],
            ring_pos: 0,
        }
    }
}

impl Default for DeflateDec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for DeflateDec {
    fn decompress(
        &mut self,
        in_buf: &[u8],
        out: &mut [u8],
        has_more_input: HasMoreInput,
    ) -> Result<DecompressOutcome, Error> {
        let flush = match has_more_input {
            HasMoreInput::Yes => MZFlush::None,
            HasMoreInput::No => MZFlush::Finish,
        };
        let mut total_written = 0usize;
        let mut total_read = 0usize;
        let mut in_cursor = 0usize;

        while total_written < out.len() {
            let (status, bytes_read, bytes_written) = decompress(
                &mut self.inner,
                &in_buf[in_cursor..],
                &mut self.ring,
                self.ring_pos,
                flush,
            );
            out[total_written..total_written + bytes_written]
                .copy_from_slice(&self.ring[self.ring_pos..self.ring_pos + bytes_written]);
            self.ring_pos = (self.ring_pos + bytes_written) % RING_SIZE;
            total_written += bytes_written;
            total_read += bytes_read;
            in_cursor += bytes_read;

            match status {
                TINFLStatus::Done => break,
                TINFLStatus::NeedsMoreInput => break,
                TINFLStatus::HasMoreOutput => {
                    if bytes_written == 0 {
                        break;
                    }
                    continue;
                }
                TINFLStatus::Failed
                | TINFLStatus::FailedCannotMakeProgress
                | TINFLStatus::BadParam => {
                    return Err(Error::Decompression {
                        method: "deflate".into(),
                        msg: format!("{status:?}"),
                    });
                }
            }
        }

        Ok(DecompressOutcome { bytes_read: total_read, bytes_written: total_written })
    }
}
