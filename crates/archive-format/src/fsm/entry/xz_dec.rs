use super::{DecompressOutcome, Decompressor, HasMoreInput};
use crate::error::Error;

/// XZ/LZMA2 decoder wired to the pure-Rust `archive-xz` crate (C6).
///
/// Unlike the other codecs here, a ZIP entry using method 95 embeds a
/// *raw* LZMA2-in-XZ-container stream (the full stream/block framing from
/// §4.4), so this simply forwards to `archive_xz::StreamDecoder` without any
/// ZIP-specific framing of its own.
#[derive(Debug)]
pub struct XzDec {
    inner: archive_xz::StreamDecoder,
}

impl XzDec {
    /// Construct a fresh XZ decoder with default resource limits; ZIP entries
    /// already had their sizes preflighted via the central directory, so the
    /// dictionary cap here is a generous backstop rather than the primary
    /// control (that's `archive-xz`'s own preflight, used when the ZIP
    /// itself is opened from a random-access source).
    pub fn new() -> Self {
        XzDec { inner: archive_xz::StreamDecoder::new(archive_xz::DecoderLimits::default()) }
    }
}

impl Default for XzDec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for XzDec {
    fn decompress(
        &mut self,
        in_buf: &[u8],
        out: &mut [u8],
        has_more_input: HasMoreInput,
    ) -> Result<DecompressOutcome, Error> {
        let eof = matches!(has_more_input, HasMoreInput::No);
        let outcome = self
            .inner
            .decompress(in_buf, out, eof)
            .map_err(|e| Error::Decompression { method: "xz".into(), msg: e.to_string() })?;
        Ok(DecompressOutcome {
            bytes_read: outcome.bytes_read,
            bytes_written: outcome.bytes_written,
        })
    }
}
