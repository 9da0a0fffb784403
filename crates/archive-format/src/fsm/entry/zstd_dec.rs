use std::io::Write;

use super::{DecompressOutcome, Decompressor, HasMoreInput};
use crate::error::Error;

/// Zstandard decoder via the `zstd` crate's low-level streaming `Decoder`.
#[derive(Debug)]
pub struct ZstdDec {
    inner: zstd::stream::raw::Decoder<'static>,
}

impl ZstdDec {
    /// Construct a fresh Zstandard decoder.
    pub fn new() -> Result<Self, Error> {
        let inner = zstd::stream::raw::Decoder::new()
            .map_err(|e| Error::Decompression { method: "zstd".into(), msg: e.to_string() })?;
        Ok(ZstdDec { inner })
    }
}

impl Decompressor for ZstdDec {
    fn decompress(
        &mut self,
        in_buf: &[u8],
        out: &mut [u8],
        _has_more_input: HasMoreInput,
    ) -> Result<DecompressOutcome, Error> {
        use zstd::stream::raw::Operation;
        let mut in_buffer = zstd::stream::raw::InBuffer::around(in_buf);
        let mut out_buffer = zstd::stream::raw::OutBuffer::around(out);
        self.inner
            .run(&mut in_buffer, &mut out_buffer)
            .map_err(|e| Error::Decompression { method: "zstd".into(), msg: e.to_string() })?;
        let bytes_read = in_buffer.pos();
        let bytes_written = out_buffer.pos();
        out_buffer.flush().ok();
        Ok(DecompressOutcome { bytes_read, bytes_written })
    }
}
