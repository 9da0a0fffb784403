use super::{DecompressOutcome, Decompressor, HasMoreInput};
use crate::error::Error;

/// The identity "decompressor" for method 0 (store): bytes pass through.
#[derive(Debug, Default)]
pub struct StoreDec {
    _private: (),
}

impl Decompressor for StoreDec {
    fn decompress(
        &mut self,
        in_buf: &[u8],
        out: &mut [u8],
        _has_more_input: HasMoreInput,
    ) -> Result<DecompressOutcome, Error> {
        let n = in_buf.len().min(out.len());
        out[..n].copy_from_slice(&in_buf[..n]);
        Ok(DecompressOutcome { bytes_read: n, bytes_written: n })
    }
}
