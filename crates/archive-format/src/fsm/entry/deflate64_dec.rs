use deflate64::Deflate64Decoder;
use std::io::Read;

use super::{DecompressOutcome, Decompressor, HasMoreInput};
use crate::error::Error;

/// Deflate64 (ZIP method 9): a larger-window, longer-match variant of
/// DEFLATE. The `deflate64` crate exposes a `Read`-based decoder rather than
/// miniz_oxide's push API, so this wraps an internal growable input queue
/// the way a `Read` adapter needs to see a contiguous slice.
#[derive(Debug)]
pub struct Deflate64Dec {
    pending_input: Vec<u8>,
    decoder: Option<Deflate64Decoder<std::io::Cursor<Vec<u8>>>>,
}

impl Deflate64Dec {
    /// Construct a fresh Deflate64 decoder.
    pub fn new() -> Self {
        Deflate64Dec { pending_input: Vec::new(), decoder: None }
    }
}

impl Default for Deflate64Dec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for Deflate64Dec {
    fn decompress(
        &mut self,
        in_buf: &[u8],
        out: &mut [u8],
        _has_more_input: HasMoreInput,
    ) -> Result<DecompressOutcome, Error> {
        self.pending_input.extend_from_slice(in_buf);
        let bytes_read = in_buf.len();

        if self.decoder.is_none() {
            let cursor = std::io::Cursor::new(std::mem::take(&mut self.pending_input));
            self.decoder = Some(Deflate64Decoder::new(cursor));
        }

        let decoder = self.decoder.as_mut().unwrap();
        let bytes_written = decoder.read(out).map_err(|e| Error::Decompression {
            method: "deflate64".into(),
            msg: e.to_string(),
        })?;

        Ok(DecompressOutcome { bytes_read, bytes_written })
    }
}
