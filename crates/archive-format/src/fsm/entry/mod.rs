//! The per-entry decompression and verification state machine (C10).

mod bzip2_dec;
mod deflate_dec;
#[cfg(feature = "deflate64")]
mod deflate64_dec;
mod store_dec;
mod xz_dec;
#[cfg(feature = "zstd")]
mod zstd_dec;
#[cfg(feature = "brotli")]
mod brotli_dec;

use oval::Buffer;
use winnow::Partial;

use super::{transition, FsmResult};
use crate::error::{Error, FormatError, UnsupportedError};
use crate::parse::{DataDescriptorRecord, Entry, LocalFileHeader, Method};

/// Whether more compressed input is expected after the bytes just handed to
/// a [`Decompressor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HasMoreInput {
    /// More input may follow.
    Yes,
    /// This was the last chunk of compressed input for this entry.
    No,
}

/// The result of one [`Decompressor::decompress`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecompressOutcome {
    /// Bytes consumed from the input buffer.
    pub bytes_read: usize,
    /// Bytes written to the output buffer.
    pub bytes_written: usize,
}

/// A push-based decompressor: callers feed compressed bytes and an output
/// buffer; implementations never own their own I/O.
pub trait Decompressor: std::fmt::Debug {
    /// Decompress as much of `in_buf` into `out` as fits, returning how much
    /// of each was consumed/produced. Implementations must never block and
    /// must tolerate being called again with a larger `out` after returning
    /// a full buffer.
    fn decompress(
        &mut self,
        in_buf: &[u8],
        out: &mut [u8],
        has_more_input: HasMoreInput,
    ) -> Result<DecompressOutcome, Error>;
}

/// Dispatches to the feature-gated decompressor for a given [`Method`].
#[derive(Debug)]
pub enum AnyDecompressor {
    /// No compression: bytes pass through unchanged.
    Store(store_dec::StoreDec),
    /// DEFLATE via `miniz_oxide`.
    #[cfg(feature = "deflate")]
    Deflate(deflate_dec::DeflateDec),
    /// Deflate64 via the `deflate64` crate.
    #[cfg(feature = "deflate64")]
    Deflate64(deflate64_dec::Deflate64Dec),
    /// Bzip2 via the pure-Rust `archive-bzip2` crate (default) or the host
    /// `bzip2` crate behind the `bzip2-host` feature.
    #[cfg(feature = "bzip2")]
    Bzip2(bzip2_dec::Bzip2Dec),
    /// XZ/LZMA2 via the pure-Rust `archive-xz` crate.
    #[cfg(feature = "xz")]
    Xz(xz_dec::XzDec),
    /// Zstandard via the `zstd` crate.
    #[cfg(feature = "zstd")]
    Zstd(zstd_dec::ZstdDec),
    /// Brotli via the `brotli` crate.
    #[cfg(feature = "brotli")]
    Brotli(brotli_dec::BrotliDec),
}

impl AnyDecompressor {
    /// Construct the decompressor for `method`, or an `Unsupported` error if
    /// the method is recognized but the relevant Cargo feature is disabled.
    pub fn for_method(method: Method) -> Result<AnyDecompressor, Error> {
        Ok(match method {
            Method::Store => AnyDecompressor::Store(store_dec::StoreDec::default()),
            #[cfg(feature = "deflate")]
            Method::Deflate => AnyDecompressor::Deflate(deflate_dec::DeflateDec::new()),
            #[cfg(not(feature = "deflate"))]
            Method::Deflate => return Err(UnsupportedError::MethodNotEnabled(method).into()),
            #[cfg(feature = "deflate64")]
            Method::Deflate64 => AnyDecompressor::Deflate64(deflate64_dec::Deflate64Dec::new()),
            #[cfg(not(feature = "deflate64"))]
            Method::Deflate64 => return Err(UnsupportedError::MethodNotEnabled(method).into()),
            #[cfg(feature = "bzip2")]
            Method::Bzip2 => AnyDecompressor::Bzip2(bzip2_dec::Bzip2Dec::new()),
            #[cfg(not(feature = "bzip2"))]
            Method::Bzip2 => return Err(UnsupportedError::MethodNotEnabled(method).into()),
            #[cfg(feature = "xz")]
            Method::Xz => AnyDecompressor::Xz(xz_dec::XzDec::new()),
            #[cfg(not(feature = "xz"))]
            Method::Xz => return Err(UnsupportedError::MethodNotEnabled(method).into()),
            #[cfg(feature = "zstd")]
            Method::Zstd => AnyDecompressor::Zstd(zstd_dec::ZstdDec::new()?),
            #[cfg(not(feature = "zstd"))]
            Method::Zstd => return Err(UnsupportedError::MethodNotEnabled(method).into()),
            Method::Lzma => return Err(UnsupportedError::MethodNotSupported(method).into()),
            other => return Err(UnsupportedError::MethodNotSupported(other).into()),
        })
    }
}

impl Decompressor for AnyDecompressor {
    fn decompress(
        &mut self,
        in_buf: &[u8],
        out: &mut [u8],
        has_more_input: HasMoreInput,
    ) -> Result<DecompressOutcome, Error> {
        match self {
            AnyDecompressor::Store(d) => d.decompress(in_buf, out, has_more_input),
            #[cfg(feature = "deflate")]
            AnyDecompressor::Deflate(d) => d.decompress(in_buf, out, has_more_input),
            #[cfg(feature = "deflate64")]
            AnyDecompressor::Deflate64(d) => d.decompress(in_buf, out, has_more_input),
            #[cfg(feature = "bzip2")]
            AnyDecompressor::Bzip2(d) => d.decompress(in_buf, out, has_more_input),
            #[cfg(feature = "xz")]
            AnyDecompressor::Xz(d) => d.decompress(in_buf, out, has_more_input),
            #[cfg(feature = "zstd")]
            AnyDecompressor::Zstd(d) => d.decompress(in_buf, out, has_more_input),
            #[cfg(feature = "brotli")]
            AnyDecompressor::Brotli(d) => d.decompress(in_buf, out, has_more_input),
        }
    }
}

/// Running tally of what has been produced so far, used to validate against
/// the declared (or descriptor-supplied) CRC32/size at end-of-stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryReadMetrics {
    /// Total uncompressed bytes produced so far.
    pub uncompressed_size: u64,
    /// Running CRC32 of the uncompressed bytes.
    pub crc32: u32,
}

#[derive(Default)]
enum State {
    ReadLocalHeader,
    ReadData {
        header: LocalFileHeader,
        compressed_bytes: u64,
        uncompressed_bytes: u64,
        hasher: crc32fast::Hasher,
        decompressor: AnyDecompressor,
    },
    ReadDataDescriptor {
        header: LocalFileHeader,
        metrics: EntryReadMetrics,
    },
    Validate {
        header: LocalFileHeader,
        metrics: EntryReadMetrics,
        descriptor: Option<DataDescriptorRecord>,
    },
    #[default]
    Transition,
}

/// Drives LFH reconciliation, codec dispatch, and CRC/size verification for
/// one archive entry.
pub struct EntryFsm {
    state: State,
    buffer: Buffer,
    entry: Entry,
    max_uncompressed_entry_bytes: u64,
    eof: bool,
}

impl EntryFsm {
    /// Start a fresh entry FSM. `entry` must be the already-reconciled
    /// central-directory entry (its `method`/sizes/CRC are used to validate
    /// the stream once fully read).
    pub fn new(entry: Entry, max_uncompressed_entry_bytes: u64) -> Self {
        EntryFsm {
            state: State::ReadLocalHeader,
            buffer: Buffer::with_capacity(64 * 1024),
            entry,
            max_uncompressed_entry_bytes,
            eof: false,
        }
    }

    /// True if the machine still needs compressed input bytes.
    pub fn wants_read(&self) -> bool {
        !matches!(self.state, State::Transition) && !self.eof
    }

    /// Expose the writable tail of the internal buffer.
    pub fn space(&mut self) -> &mut [u8] {
        self.buffer.space()
    }

    /// Commit `count` freshly written bytes, or `0` to signal end-of-input.
    pub fn fill(&mut self, count: usize) {
        if count == 0 {
            self.eof = true;
        }
        self.buffer.fill(count);
    }

    /// Advance the machine, writing decompressed bytes into `out`.
    pub fn process(mut self, out: &mut [u8]) -> Result<FsmResult<(Self, DecompressOutcome), ()>, Error> {
        loop {
            let has_more = if self.eof { HasMoreInput::No } else { HasMoreInput::Yes };
            let next = transition!(&mut self.state => {
                State::ReadLocalHeader => self.process_read_local_header()?,
                State::ReadData { header, compressed_bytes, uncompressed_bytes, hasher, decompressor } => {
                    return self.process_read_data(header, compressed_bytes, uncompressed_bytes, hasher, decompressor, out, has_more);
                }
                State::ReadDataDescriptor { header, metrics } => {
                    self.process_read_data_descriptor(header, metrics)?
                }
                State::Validate { header, metrics, descriptor } => {
                    self.process_validate(header, metrics, descriptor)?;
                    return Ok(FsmResult::Done(()));
                }
                State::Transition => unreachable!(),
            });
            match next {
                FsmResult::Continue(state) => self.state = state,
                FsmResult::Done(()) => return Ok(FsmResult::Done(())),
            }
        }
    }

    fn process_read_local_header(&mut self) -> Result<FsmResult<State, ()>, Error> {
        if self.buffer.available_data() < LocalFileHeader::FIXED_SIZE {
            return Ok(FsmResult::Continue(State::ReadLocalHeader));
        }
        let mut input = Partial::new(self.buffer.data());
        match LocalFileHeader::parser(&mut input) {
            Ok(header) => {
                let consumed = self.buffer.data().len() - input.len();
                self.buffer.consume(consumed);
                if header.method() != self.entry.method {
                    tracing::warn!(
                        entry = %self.entry.name,
                        lfh_method = ?header.method(),
                        cd_method = ?self.entry.method,
                        "local header method disagrees with central directory"
                    );
                }
                let decompressor = AnyDecompressor::for_method(self.entry.method)?;
                Ok(FsmResult::Continue(State::ReadData {
                    header,
                    compressed_bytes: 0,
                    uncompressed_bytes: 0,
                    hasher: crc32fast::Hasher::new(),
                    decompressor,
                }))
            }
            Err(winnow::error::ErrMode::Incomplete(_)) => Ok(FsmResult::Continue(State::ReadLocalHeader)),
            Err(_) => Err(FormatError::InvalidLocalHeader.into()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_read_data(
        mut self,
        header: LocalFileHeader,
        mut compressed_bytes: u64,
        mut uncompressed_bytes: u64,
        mut hasher: crc32fast::Hasher,
        mut decompressor: AnyDecompressor,
        out: &mut [u8],
        has_more: HasMoreInput,
    ) -> Result<FsmResult<(Self, DecompressOutcome), ()>, Error> {
        let remaining_compressed = self.entry.compressed_size.saturating_sub(compressed_bytes);
        let avail = self.buffer.available_data().min(remaining_compressed as usize);
        let in_buf = &self.buffer.data()[..avail];
        let input_exhausted = avail == 0 && (self.eof || remaining_compressed == 0);
        let has_more = if input_exhausted { HasMoreInput::No } else { has_more };

        let outcome = decompressor.decompress(in_buf, out, has_more)?;
        self.buffer.consume(outcome.bytes_read);
        compressed_bytes += outcome.bytes_read as u64;
        uncompressed_bytes += outcome.bytes_written as u64;
        hasher.update(&out[..outcome.bytes_written]);

        if uncompressed_bytes > self.max_uncompressed_entry_bytes {
            return Err(Error::ResourceLimit(crate::error::ResourceLimitError {
                limit_name: "maxUncompressedEntryBytes",
                limit: Some(self.max_uncompressed_entry_bytes),
                required: Some(uncompressed_bytes),
            }));
        }

        let done = compressed_bytes >= self.entry.compressed_size && outcome.bytes_written == 0
            || (input_exhausted && outcome.bytes_written == 0);

        if done {
            let metrics = EntryReadMetrics {
                uncompressed_size: uncompressed_bytes,
                crc32: hasher.finalize(),
            };
            self.state = if self.entry.flags & 0x08 != 0 {
                State::ReadDataDescriptor { header, metrics }
            } else {
                State::Validate { header, metrics, descriptor: None }
            };
        } else {
            self.state = State::ReadData {
                header,
                compressed_bytes,
                uncompressed_bytes,
                hasher,
                decompressor,
            };
        }
        Ok(FsmResult::Continue((self, outcome)))
    }

    fn process_read_data_descriptor(
        &mut self,
        header: LocalFileHeader,
        metrics: EntryReadMetrics,
    ) -> Result<FsmResult<State, ()>, Error> {
        let is_zip64 = self.entry.is_zip64;
        let needed = if is_zip64 { 24 } else { 16 };
        if self.buffer.available_data() < needed {
            return Ok(FsmResult::Continue(State::ReadDataDescriptor { header, metrics }));
        }
        let mut input = Partial::new(self.buffer.data());
        let descriptor = DataDescriptorRecord::mk_parser(is_zip64)(&mut input)
            .map_err(|_| FormatError::InvalidDataDescriptor)?;
        let consumed = self.buffer.data().len() - input.len();
        self.buffer.consume(consumed);
        Ok(FsmResult::Continue(State::Validate {
            header,
            metrics,
            descriptor: Some(descriptor),
        }))
    }

    fn process_validate(
        &mut self,
        _header: LocalFileHeader,
        metrics: EntryReadMetrics,
        descriptor: Option<DataDescriptorRecord>,
    ) -> Result<(), Error> {
        let (expected_crc, expected_size) = if let Some(d) = descriptor {
            (d.crc32, d.uncompressed_size)
        } else {
            (self.entry.crc32, self.entry.uncompressed_size)
        };

        // AE-2 WinZip AES stores CRC as zero by design; skip CRC validation
        // in that case, matching §4.9 step 5.
        let is_ae2 = self.entry.encrypted
            && matches!(self.entry.method, Method::Aex)
            && expected_crc == 0;

        if expected_size != metrics.uncompressed_size {
            return Err(FormatError::WrongSize {
                expected: expected_size,
                actual: metrics.uncompressed_size,
            }
            .into());
        }
        if !is_ae2 && expected_crc != metrics.crc32 {
            return Err(FormatError::WrongChecksum {
                expected: expected_crc,
                actual: metrics.crc32,
            }
            .into());
        }
        Ok(())
    }
}
