//! Top-level sequential XZ stream decoder (spec §4.4): composes stream/block
//! framing, the LZMA2 chunk decoder, and the post-LZMA2 filter chain into
//! the push-based `decompress(in_buf, out, eof)` contract the rest of the
//! workspace's codecs use.

use std::collections::VecDeque;

use sha2::Digest;
use tracing::{trace, warn};

use crate::block::{parse_block_header, BlockHeader, BlockHeaderParse};
use crate::crc64;
use crate::error::{Error, FormatError, ResourceLimitError};
use crate::filters::FilterChain;
use crate::index::{self, IndexParseOutcome};
use crate::lzma2::{dict_size_from_prop, Lzma2Decoder};
use crate::stream::{CheckType, StreamFooter, StreamHeader, STREAM_FOOTER_LEN, STREAM_HEADER_LEN, STREAM_HEADER_MAGIC};

/// Resource limits this decoder enforces directly (the facade's richer
/// `ResourceLimits`/`ArchiveProfile` resolve down to these plain values).
#[derive(Debug, Clone, Copy)]
pub struct DecoderLimits {
    /// Maximum LZMA2 dictionary size this decoder will allocate.
    pub max_dictionary_bytes: u64,
    /// Maximum bytes the index may occupy while being accumulated.
    pub max_index_bytes: u64,
    /// Maximum number of index records accumulated.
    pub max_index_records: u64,
}

impl Default for DecoderLimits {
    fn default() -> Self {
        DecoderLimits {
            max_dictionary_bytes: 1536 * 1024 * 1024,
            max_index_bytes: 256 * 1024 * 1024,
            max_index_records: 1_000_000,
        }
    }
}

/// Result of one `decompress` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Outcome {
    /// Bytes consumed from `in_buf`.
    pub bytes_read: usize,
    /// Bytes written into `out`.
    pub bytes_written: usize,
}

enum CheckAccumulator {
    None,
    Crc32(crc32fast::Hasher),
    Crc64(crc64::Hasher),
    Sha256(sha2::Sha256),
}

impl CheckAccumulator {
    fn new(check_type: CheckType) -> Self {
        match check_type {
            CheckType::None => CheckAccumulator::None,
            CheckType::Crc32 => CheckAccumulator::Crc32(crc32fast::Hasher::new()),
            CheckType::Crc64 => CheckAccumulator::Crc64(crc64::Hasher::new()),
            CheckType::Sha256 => CheckAccumulator::Sha256(sha2::Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            CheckAccumulator::None => {}
            CheckAccumulator::Crc32(h) => h.update(data),
            CheckAccumulator::Crc64(h) => h.update(data),
            CheckAccumulator::Sha256(h) => h.update(data),
        }
    }

    fn finish(self) -> Vec<u8> {
        match self {
            CheckAccumulator::None => Vec::new(),
            CheckAccumulator::Crc32(h) => h.finalize().to_le_bytes().to_vec(),
            CheckAccumulator::Crc64(h) => h.finalize().to_le_bytes().to_vec(),
            CheckAccumulator::Sha256(h) => h.finalize().to_vec(),
        }
    }
}

/// Per-block decode state, boxed so the `Phase` enum stays a reasonable size.
struct BlockState {
    header: BlockHeader,
    filter_chain: FilterChain,
    lzma2: Lzma2Decoder,
    check: CheckAccumulator,
    uncompressed_produced: u64,
    /// Header bytes plus compressed bytes consumed so far for this block.
    header_and_compressed_consumed: u64,
}

enum Phase {
    StreamHeader,
    BlockHeaderByte,
    BlockHeaderRest { header_size: usize },
    BlockBody(Box<BlockState>),
    BlockPadding { remaining: usize, check: CheckAccumulator },
    BlockCheck { remaining: usize, expected: Vec<u8> },
    IndexAccumulate,
    StreamFooter,
    StreamPaddingOrNextHeader,
    Done,
}

/// Sequential decoder for a (possibly multi-stream) XZ byte stream.
pub struct StreamDecoder {
    limits: DecoderLimits,
    input: Vec<u8>,
    pending_out: VecDeque<u8>,
    phase: Phase,
    check_type: Option<CheckType>,
}

impl StreamDecoder {
    /// Build a fresh decoder with the given resource limits.
    pub fn new(limits: DecoderLimits) -> Self {
        StreamDecoder {
            limits,
            input: Vec::new(),
            pending_out: VecDeque::new(),
            phase: Phase::StreamHeader,
            check_type: None,
        }
    }

    /// Feed more compressed bytes and/or drain decoded output, matching the
    /// workspace-wide push decompressor contract: call repeatedly with more
    /// input until `eof`, draining `out` each time.
    pub fn decompress(&mut self, in_buf: &[u8], out: &mut [u8], eof: bool) -> Result<Outcome, Error> {
        self.input.extend_from_slice(in_buf);
        while self.advance(eof)? {}
        let bytes_written = self.drain_output(out);
        Ok(Outcome { bytes_read: in_buf.len(), bytes_written })
    }

    fn drain_output(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.pending_out.len());
        for slot in out.iter_mut().take(n) {
            *slot = self.pending_out.pop_front().unwrap();
        }
        n
    }

    /// Advance the state machine by one step, using as much of the
    /// currently buffered input as is available. Returns `true` if progress
    /// was made (caller should call again), `false` if more input is
    /// needed or decoding has finished.
    fn advance(&mut self, eof: bool) -> Result<bool, Error> {
        let phase = std::mem::replace(&mut self.phase, Phase::Done);
        let (next, progressed) = self.step(phase, eof)?;
        self.phase = next;
        Ok(progressed)
    }

    fn step(&mut self, phase: Phase, eof: bool) -> Result<(Phase, bool), Error> {
        match phase {
            Phase::StreamHeader => {
                if self.input.len() < STREAM_HEADER_LEN {
                    if eof {
                        return Err(FormatError::Truncated.into());
                    }
                    return Ok((Phase::StreamHeader, false));
                }
                let mut buf = [0u8; STREAM_HEADER_LEN];
                buf.copy_from_slice(&self.input[..STREAM_HEADER_LEN]);
                let header = StreamHeader::parse(&buf)?;
                trace!(check = ?header.flags.check_type, "parsed xz stream header");
                self.check_type = Some(header.flags.check_type);
                self.input.drain(..STREAM_HEADER_LEN);
                Ok((Phase::BlockHeaderByte, true))
            }

            Phase::BlockHeaderByte => {
                if self.input.is_empty() {
                    if eof {
                        return Err(FormatError::Truncated.into());
                    }
                    return Ok((Phase::BlockHeaderByte, false));
                }
                let first_byte = self.input[0];
                if first_byte == 0 {
                    return Ok((Phase::IndexAccumulate, true));
                }
                let header_size = (first_byte as usize + 1) * 4;
                if header_size > 1024 {
                    return Err(FormatError::InvalidBlockHeaderSize.into());
                }
                Ok((Phase::BlockHeaderRest { header_size }, true))
            }

            Phase::BlockHeaderRest { header_size } => {
                if self.input.len() < header_size {
                    if eof {
                        return Err(FormatError::Truncated.into());
                    }
                    return Ok((Phase::BlockHeaderRest { header_size }, false));
                }
                let header = match parse_block_header(&self.input[..header_size])? {
                    BlockHeaderParse::Done(h) => h,
                    BlockHeaderParse::NeedMore => return Ok((Phase::BlockHeaderRest { header_size }, false)),
                    BlockHeaderParse::IsIndex => unreachable!("leading byte already checked nonzero"),
                };
                self.input.drain(..header_size);

                let lzma2_spec = header.filters.last().expect("validated filter chain always has lzma2 last");
                let dict_prop = lzma2_spec.lzma2_dict_prop()?;
                let dict_size = dict_size_from_prop(dict_prop)?;
                if dict_size as u64 > self.limits.max_dictionary_bytes {
                    return Err(ResourceLimitError {
                        limit_name: "maxXzDictionaryBytes",
                        limit: Some(self.limits.max_dictionary_bytes),
                        required: Some(dict_size as u64),
                    }
                    .into());
                }

                trace!(dict_size, filters = header.filters.len(), "parsed xz block header");
                let filter_chain = FilterChain::new(&header.filters)?;
                let lzma2 = Lzma2Decoder::new(dict_size);
                let check = CheckAccumulator::new(self.check_type.expect("stream header parsed before any block"));
                let header_and_compressed_consumed = header.header_size as u64;
                let state = BlockState {
                    header,
                    filter_chain,
                    lzma2,
                    check,
                    uncompressed_produced: 0,
                    header_and_compressed_consumed,
                };
                Ok((Phase::BlockBody(Box::new(state)), true))
            }

            Phase::BlockBody(mut state) => {
                let consumed_so_far = state.header_and_compressed_consumed - state.header.header_size as u64;
                let take = match state.header.compressed_size {
                    Some(size) => (size.saturating_sub(consumed_so_far) as usize).min(self.input.len()),
                    None => self.input.len(),
                };
                if take == 0 && self.input.is_empty() && !eof {
                    return Ok((Phase::BlockBody(state), false));
                }

                let chunk: Vec<u8> = self.input.drain(..take).collect();
                state.header_and_compressed_consumed += chunk.len() as u64;
                let mut raw = Vec::new();
                state.lzma2.push(&chunk, &mut raw)?;

                let finished_by_size = state
                    .header
                    .compressed_size
                    .map(|size| state.header_and_compressed_consumed - state.header.header_size as u64 >= size)
                    .unwrap_or(false);
                let body_done = state.lzma2.is_finished() || finished_by_size;

                let decoded = state.filter_chain.push(raw, body_done)?;
                state.check.update(&decoded);
                state.uncompressed_produced += decoded.len() as u64;
                self.pending_out.extend(decoded);

                if !body_done {
                    let progressed = take > 0;
                    return Ok((Phase::BlockBody(state), progressed));
                }

                if let Some(expected) = state.header.uncompressed_size {
                    if expected != state.uncompressed_produced {
                        return Err(FormatError::BlockSizeMismatch { expected, actual: state.uncompressed_produced }.into());
                    }
                }

                let unpadded = state.header_and_compressed_consumed;
                let padding = ((4 - (unpadded % 4)) % 4) as usize;
                Ok((Phase::BlockPadding { remaining: padding, check: state.check }, true))
            }

            Phase::BlockPadding { remaining, check } => {
                if self.input.len() < remaining {
                    return Ok((Phase::BlockPadding { remaining, check }, false));
                }
                if self.input[..remaining].iter().any(|&b| b != 0) {
                    return Err(FormatError::NonZeroPadding.into());
                }
                self.input.drain(..remaining);
                let check_len = self.check_type.expect("set once stream header parsed").len();
                let expected = check.finish();
                Ok((Phase::BlockCheck { remaining: check_len, expected }, true))
            }

            Phase::BlockCheck { remaining, expected } => {
                if self.input.len() < remaining {
                    return Ok((Phase::BlockCheck { remaining, expected }, false));
                }
                let observed = self.input[..remaining].to_vec();
                self.input.drain(..remaining);
                if observed != expected {
                    warn!(expected = %hex(&expected), computed = %hex(&observed), "xz block integrity check mismatch");
                    return Err(Error::BadCheck { expected: hex(&expected), computed: hex(&observed) });
                }
                Ok((Phase::BlockHeaderByte, true))
            }

            Phase::IndexAccumulate => {
                match index::try_parse(&self.input, self.limits.max_index_bytes, self.limits.max_index_records)? {
                    IndexParseOutcome::NeedMore => {
                        if eof {
                            return Err(FormatError::Truncated.into());
                        }
                        Ok((Phase::IndexAccumulate, false))
                    }
                    IndexParseOutcome::Done { consumed, .. } => {
                        self.input.drain(..consumed);
                        Ok((Phase::StreamFooter, true))
                    }
                }
            }

            Phase::StreamFooter => {
                if self.input.len() < STREAM_FOOTER_LEN {
                    if eof {
                        return Err(FormatError::Truncated.into());
                    }
                    return Ok((Phase::StreamFooter, false));
                }
                let mut buf = [0u8; STREAM_FOOTER_LEN];
                buf.copy_from_slice(&self.input[..STREAM_FOOTER_LEN]);
                let _footer: StreamFooter = StreamFooter::parse(&buf)?;
                self.input.drain(..STREAM_FOOTER_LEN);
                Ok((Phase::StreamPaddingOrNextHeader, true))
            }

            Phase::StreamPaddingOrNextHeader => {
                while self.input.len() >= 4 {
                    if self.input[..4] == [0, 0, 0, 0] {
                        self.input.drain(..4);
                        continue;
                    }
                    if self.input.len() < STREAM_HEADER_MAGIC.len() {
                        if STREAM_HEADER_MAGIC.starts_with(&self.input[..]) {
                            if eof {
                                return Err(FormatError::Truncated.into());
                            }
                            return Ok((Phase::StreamPaddingOrNextHeader, false));
                        }
                        return Err(FormatError::BadStreamPadding.into());
                    }
                    if self.input[..STREAM_HEADER_MAGIC.len()] == STREAM_HEADER_MAGIC {
                        return Ok((Phase::StreamHeader, true));
                    }
                    return Err(FormatError::BadStreamPadding.into());
                }
                if eof && self.input.is_empty() {
                    return Ok((Phase::Done, true));
                }
                Ok((Phase::StreamPaddingOrNextHeader, false))
            }

            Phase::Done => Ok((Phase::Done, false)),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
