//! Top-level container-wrapper decoders (spec §4.11's compression wrappers).
//!
//! These are distinct from `archive_format`'s per-ZIP-entry codecs: a ZIP
//! method id never means "gzip", so gzip has no home in that crate at all,
//! and bzip2/xz there are wired for the ZIP local/central record shape, not
//! for a bare `.gz`/`.bz2`/`.xz`/`.zst`/`.br` file or a `tar.<x>` stream.
//! Everything here follows the same push contract as `archive_format`'s
//! internal decoders: feed `in_buf`, get `out` filled, `eof` marks the last
//! push.

use std::io::Write;

use crate::detect::CompressionWrapper;
use crate::error::Error;

/// The result of one [`WrapperDecoder::decompress`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct WrapperOutcome {
    /// Bytes consumed from `in_buf`.
    pub bytes_read: usize,
    /// Bytes written to `out`.
    pub bytes_written: usize,
    /// True once the wrapper has emitted its final trailer and validated it.
    pub finished: bool,
}

/// A push-based decoder for one compression wrapper layer.
pub trait WrapperDecoder {
    /// Feed `in_buf`, fill as much of `out` as the wrapper can produce
    /// this call. `eof` means `in_buf` is the last chunk of compressed
    /// input; the decoder should validate any trailer once it has
    /// consumed through it.
    fn decompress(&mut self, in_buf: &[u8], out: &mut [u8], eof: bool) -> Result<WrapperOutcome, Error>;
}

/// Build the decoder for a given wrapper kind.
pub fn for_wrapper(wrapper: CompressionWrapper) -> Result<Box<dyn WrapperDecoder>, Error> {
    Ok(match wrapper {
        CompressionWrapper::Gzip => Box::new(GzipDecoder::new()),
        CompressionWrapper::Bzip2 => Box::new(Bzip2Wrapper::new()),
        CompressionWrapper::Xz => Box::new(XzWrapper::new()),
        CompressionWrapper::Zstd => Box::new(ZstdWrapper::new()?),
        CompressionWrapper::Brotli => Box::new(BrotliWrapper::new()),
    })
}

// ---------------------------------------------------------------------
// gzip (RFC 1952)
// ---------------------------------------------------------------------

const GZIP_FTEXT: u8 = 1 << 0;
const GZIP_FHCRC: u8 = 1 << 1;
const GZIP_FEXTRA: u8 = 1 << 2;
const GZIP_FNAME: u8 = 1 << 3;
const GZIP_FCOMMENT: u8 = 1 << 4;

enum GzipState {
    Header { buf: Vec<u8> },
    Body,
    Trailer { buf: Vec<u8> },
    Done,
}

/// RFC 1952 gzip single-member decoder: header parse, raw DEFLATE body,
/// trailing CRC32 + ISIZE verification.
pub struct GzipDecoder {
    state: GzipState,
    inflate: Box<miniz_oxide::inflate::core::DecompressorOxide>,
    ring: Vec<u8>,
    ring_pos: usize,
    crc: crc32fast::Hasher,
    total_out: u64,
}

const RING_SIZE: usize = 32 * 1024;

impl GzipDecoder {
    /// Construct a fresh gzip decoder, ready to parse a member header.
    pub fn new() -> Self {
        GzipDecoder {
            state: GzipState::Header { buf: Vec::new() },
            inflate: Box::default(),
            ring: vec![0u8; RING_SIZE],
            ring_pos: 0,
            crc: crc32fast::Hasher::new(),
            total_out: 0,
        }
    }
}

impl Default for GzipDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Try to parse a complete gzip header out of `buf`. Returns the header
/// length on success, or `None` if more bytes are needed.
fn try_parse_gzip_header(buf: &[u8]) -> Result<Option<usize>, Error> {
    if buf.len() < 10 {
        return Ok(None);
    }
    if buf[0] != 0x1F || buf[1] != 0x8B {
        return Err(Error::new("GZIP_BAD_HEADER", "bad gzip magic"));
    }
    if buf[2] != 8 {
        return Err(Error::new("GZIP_UNSUPPORTED_METHOD", "gzip compression method is not DEFLATE"));
    }
    let flags = buf[3];
    let mut pos = 10usize;

    if flags & GZIP_FEXTRA != 0 {
        if buf.len() < pos + 2 {
            return Ok(None);
        }
        let xlen = u16::from_le_bytes([buf[pos], buf[pos + 1]]) as usize;
        pos += 2;
        if buf.len() < pos + xlen {
            return Ok(None);
        }
        pos += xlen;
    }
    if flags & GZIP_FNAME != 0 {
        let Some(end) = buf[pos..].iter().position(|&b| b == 0) else { return Ok(None) };
        pos += end + 1;
    }
    if flags & GZIP_FCOMMENT != 0 {
        let Some(end) = buf[pos..].iter().position(|&b| b == 0) else { return Ok(None) };
        pos += end + 1;
    }
    if flags & GZIP_FHCRC != 0 {
        if buf.len() < pos + 2 {
            return Ok(None);
        }
        pos += 2;
    }
    Ok(Some(pos))
}

impl WrapperDecoder for GzipDecoder {
    fn decompress(&mut self, in_buf: &[u8], out: &mut [u8], eof: bool) -> Result<WrapperOutcome, Error> {
        match &mut self.state {
            GzipState::Header { buf } => {
                buf.extend_from_slice(in_buf);
                match try_parse_gzip_header(buf)? {
                    None => {
                        if eof {
                            return Err(Error::new("GZIP_TRUNCATED", "gzip stream truncated in header"));
                        }
                        Ok(WrapperOutcome { bytes_read: in_buf.len(), bytes_written: 0, finished: false })
                    }
                    Some(header_len) => {
                        let remainder = buf.split_off(header_len);
                        self.state = GzipState::Body;
                        // Re-drive with the bytes that followed the header in this
                        // same push.
                        let sub = self.decompress(&remainder, out, eof)?;
                        Ok(WrapperOutcome {
                            bytes_read: in_buf.len(),
                            bytes_written: sub.bytes_written,
                            finished: sub.finished,
                        })
                    }
                }
            }
            GzipState::Body => {
                use miniz_oxide::inflate::core::decompress;
                use miniz_oxide::inflate::TINFLStatus;
                use miniz_oxide::MZFlush;

                let flush = if eof { MZFlush::Finish } else { MZFlush::None };
                let mut total_written = 0usize;
                let mut total_read = 0usize;
                let mut in_cursor = 0usize;
                let mut done = false;

                while total_written < out.len() {
                    let (status, bytes_read, bytes_written) = decompress(
                        &mut self.inflate,
                        &in_buf[in_cursor..],
                        &mut self.ring,
                        self.ring_pos,
                        flush,
                    );
                    let chunk = &self.ring[self.ring_pos..self.ring_pos + bytes_written];
                    out[total_written..total_written + bytes_written].copy_from_slice(chunk);
                    self.crc.update(chunk);
                    self.total_out += bytes_written as u64;
                    self.ring_pos = (self.ring_pos + bytes_written) % RING_SIZE;
                    total_written += bytes_written;
                    total_read += bytes_read;
                    in_cursor += bytes_read;

                    match status {
                        TINFLStatus::Done => {
                            done = true;
                            break;
                        }
                        TINFLStatus::NeedsMoreInput => break,
                        TINFLStatus::HasMoreOutput => {
                            if bytes_written == 0 {
                                break;
                            }
                            continue;
                        }
                        TINFLStatus::Failed | TINFLStatus::FailedCannotMakeProgress | TINFLStatus::BadParam => {
                            return Err(Error::new("GZIP_BAD_STREAM", format!("deflate error: {status:?}")));
                        }
                    }
                }

                if done {
                    let trailer_start = in_cursor;
                    self.state = GzipState::Trailer { buf: Vec::new() };
                    let sub = self.decompress(&in_buf[trailer_start..], &mut out[total_written..], eof)?;
                    return Ok(WrapperOutcome {
                        bytes_read: total_read + sub.bytes_read,
                        bytes_written: total_written + sub.bytes_written,
                        finished: sub.finished,
                    });
                }
                Ok(WrapperOutcome { bytes_read: total_read, bytes_written: total_written, finished: false })
            }
            GzipState::Trailer { buf } => {
                let need = 8 - buf.len();
                let take = need.min(in_buf.len());
                buf.extend_from_slice(&in_buf[..take]);
                if buf.len() < 8 {
                    if eof {
                        return Err(Error::new("GZIP_TRUNCATED", "gzip stream truncated in trailer"));
                    }
                    return Ok(WrapperOutcome { bytes_read: take, bytes_written: 0, finished: false });
                }
                let expected_crc = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
                let expected_isize = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
                let actual_crc = self.crc.clone().finalize();
                let actual_isize = (self.total_out % (1u64 << 32)) as u32;
                if actual_crc != expected_crc {
                    return Err(Error::new("GZIP_BAD_CRC", "gzip trailer CRC32 mismatch"));
                }
                if actual_isize != expected_isize {
                    return Err(Error::new("GZIP_BAD_SIZE", "gzip trailer ISIZE mismatch"));
                }
                self.state = GzipState::Done;
                Ok(WrapperOutcome { bytes_read: take, bytes_written: 0, finished: true })
            }
            GzipState::Done => Ok(WrapperOutcome { bytes_read: 0, bytes_written: 0, finished: true }),
        }
    }
}

// ---------------------------------------------------------------------
// bzip2 / xz: thin adapters over the pure-Rust engines' own push contract
// ---------------------------------------------------------------------

/// Adapts [`archive_bzip2::StreamDecoder`] to [`WrapperDecoder`].
pub struct Bzip2Wrapper {
    inner: archive_bzip2::StreamDecoder,
}

impl Bzip2Wrapper {
    /// Construct a fresh bzip2 wrapper decoder with default resource limits.
    pub fn new() -> Self {
        Bzip2Wrapper { inner: archive_bzip2::StreamDecoder::new() }
    }
}

impl Default for Bzip2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl WrapperDecoder for Bzip2Wrapper {
    fn decompress(&mut self, in_buf: &[u8], out: &mut [u8], eof: bool) -> Result<WrapperOutcome, Error> {
        let outcome = self.inner.decompress(in_buf, out, eof)?;
        Ok(WrapperOutcome {
            bytes_read: outcome.bytes_read,
            bytes_written: outcome.bytes_written,
            finished: eof && outcome.bytes_read == in_buf.len() && outcome.bytes_written == 0,
        })
    }
}

/// Adapts [`archive_xz::StreamDecoder`] to [`WrapperDecoder`].
pub struct XzWrapper {
    inner: archive_xz::StreamDecoder,
}

impl XzWrapper {
    /// Construct a fresh XZ wrapper decoder with default resource limits.
    pub fn new() -> Self {
        XzWrapper { inner: archive_xz::StreamDecoder::new(archive_xz::DecoderLimits::default()) }
    }
}

impl Default for XzWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl WrapperDecoder for XzWrapper {
    fn decompress(&mut self, in_buf: &[u8], out: &mut [u8], eof: bool) -> Result<WrapperOutcome, Error> {
        let outcome = self.inner.decompress(in_buf, out, eof)?;
        Ok(WrapperOutcome {
            bytes_read: outcome.bytes_read,
            bytes_written: outcome.bytes_written,
            finished: eof && outcome.bytes_read == in_buf.len() && outcome.bytes_written == 0,
        })
    }
}

// ---------------------------------------------------------------------
// zstd / brotli: same crates the ZIP-entry decoders use, driven directly
// ---------------------------------------------------------------------

/// Zstandard wrapper decoder via the `zstd` crate's low-level streaming API.
pub struct ZstdWrapper {
    inner: zstd::stream::raw::Decoder<'static>,
    finished: bool,
}

impl ZstdWrapper {
    /// Construct a fresh Zstandard wrapper decoder.
    pub fn new() -> Result<Self, Error> {
        let inner = zstd::stream::raw::Decoder::new()
            .map_err(|e| Error::new("ZSTD_ERROR", e.to_string()))?;
        Ok(ZstdWrapper { inner, finished: false })
    }
}

impl WrapperDecoder for ZstdWrapper {
    fn decompress(&mut self, in_buf: &[u8], out: &mut [u8], _eof: bool) -> Result<WrapperOutcome, Error> {
        use zstd::stream::raw::Operation;
        let mut in_buffer = zstd::stream::raw::InBuffer::around(in_buf);
        let mut out_buffer = zstd::stream::raw::OutBuffer::around(out);
        let remaining = self
            .inner
            .run(&mut in_buffer, &mut out_buffer)
            .map_err(|e| Error::new("ZSTD_ERROR", e.to_string()))?;
        let bytes_read = in_buffer.pos();
        let bytes_written = out_buffer.pos();
        out_buffer.flush().ok();
        if remaining == 0 && bytes_read == in_buf.len() {
            self.finished = true;
        }
        Ok(WrapperOutcome { bytes_read, bytes_written, finished: self.finished })
    }
}

/// Brotli wrapper decoder via the `brotli` crate's streaming state machine.
pub struct BrotliWrapper {
    state: brotli::BrotliState<std::io::Empty, Vec<u8>, std::alloc::Global>,
    finished: bool,
}

impl BrotliWrapper {
    /// Construct a fresh Brotli wrapper decoder.
    pub fn new() -> Self {
        BrotliWrapper {
            state: brotli::BrotliState::new(std::alloc::Global, std::alloc::Global, std::alloc::Global),
            finished: false,
        }
    }
}

impl Default for BrotliWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl WrapperDecoder for BrotliWrapper {
    fn decompress(&mut self, in_buf: &[u8], out: &mut [u8], _eof: bool) -> Result<WrapperOutcome, Error> {
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
            brotli::BrotliResult::ResultSuccess => {
                self.finished = true;
                Ok(WrapperOutcome { bytes_read: input_offset, bytes_written: output_offset, finished: true })
            }
            brotli::BrotliResult::NeedsMoreInput | brotli::BrotliResult::NeedsMoreOutput => {
                Ok(WrapperOutcome { bytes_read: input_offset, bytes_written: output_offset, finished: false })
            }
            brotli::BrotliResult::ResultFailure => {
                Err(Error::new("BROTLI_BAD_STREAM", "brotli stream corrupt"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_header_parses_minimal_member() {
        let mut header = vec![0x1F, 0x8B, 8, 0, 0, 0, 0, 0, 0, 0xFF];
        header.extend_from_slice(b"hello");
        let len = try_parse_gzip_header(&header).unwrap();
        assert_eq!(len, Some(10));
    }

    #[test]
    fn gzip_header_needs_more_for_fname() {
        let mut header = vec![0x1F, 0x8B, 8, GZIP_FNAME, 0, 0, 0, 0, 0, 0xFF];
        header.extend_from_slice(b"no-nul-yet");
        let result = try_parse_gzip_header(&header).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn gzip_rejects_bad_magic() {
        let header = [0u8; 10];
        assert!(try_parse_gzip_header(&header).is_err());
    }
}
