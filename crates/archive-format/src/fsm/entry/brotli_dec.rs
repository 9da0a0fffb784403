use std::io::Write;

use super::{DecompressOutcome, Decompressor, HasMoreInput};
use crate::error::Error;

/// Brotli decoder via the `brotli` crate's streaming `Decompressor`. ZIP has
/// no registered brotli method id; this exists for the archive facade's
/// single-file `.br`/`.tar.br` wrapper detection (§4.11), not for ZIP entries.
#[derive(Debug)]
pub struct BrotliDec {
    state: brotli::BrotliState<std::io::Empty, Vec<u8>, std::alloc::Global>,
}

impl BrotliDec {
    /// Construct a fresh Brotli decoder.
    pub fn new() -> Self {
        BrotliDec {
            state: brotli::BrotliState::new(std::alloc::Global, std::alloc::Global, std::alloc::Global),
        }
    }
}

impl Default for BrotliDec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for BrotliDec {
    fn decompress(
        &mut self,
        in_buf: &[u8],
        out: &mut [u8],
        _has_more_input: HasMoreInput,
    ) -> Result<DecompressOutcome, Error> {
        let mut available_in = in_buf.len();
        let mut input_offset = 0usize;
        let mut available_out = out.len();
        let mut output_offset = 0usize;
        let mut written = 0usize;
        let result = brotli::BrotliDecompressStream(
            &mut available_in,
            &mut input_offset,
            in_buf,
            &mut available_out,
            &mut output_offset,
            out,
            &mut written,
            &mut self.state,
        );
        match result {
            brotli::BrotliResult::ResultSuccess | brotli::BrotliResult::NeedsMoreInput => {
                Ok(DecompressOutcome { bytes_read: input_offset, bytes_written: output_offset })
            }
            brotli::BrotliResult::NeedsMoreOutput => {
                Ok(DecompressOutcome { bytes_read: input_offset, bytes_written: output_offset })
            }
            brotli::BrotliResult::ResultFailure => Err(Error::Decompression {
                method: "brotli".into(),
                msg: "brotli stream corrupt".into(),
            }),
        }
    }
}
