use super::{DecompressOutcome, Decompressor, HasMoreInput};
use crate::error::Error;

/// Bzip2 decoder wired to the pure-Rust `archive-bzip2` crate by default.
/// When the `bzip2-host` feature is enabled instead, an alternate build of
/// this module (behind a `cfg`) could dispatch to the external `bzip2`
/// crate the way `rc-zip-sync`'s `entry_reader::bzip2_dec` wraps
/// `bzip2::read::BzDecoder` — but per this crate's Non-goals, the pure
/// decoder is always what ships by default.
#[derive(Debug)]
pub struct Bzip2Dec {
    inner: archive_bzip2::StreamDecoder,
}

impl Bzip2Dec {
    /// Construct a fresh bzip2 decoder.
    pub fn new() -> Self {
        Bzip2Dec { inner: archive_bzip2::StreamDecoder::new() }
    }
}

impl Default for Bzip2Dec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for Bzip2Dec {
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
            .map_err(|e| Error::Decompression { method: "bzip2".into(), msg: e.to_string() })?;
        Ok(DecompressOutcome {
            bytes_read: outcome.bytes_read,
            bytes_written: outcome.bytes_written,
        })
    }
}
