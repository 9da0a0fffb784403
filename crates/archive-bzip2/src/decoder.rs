//! Top-level bzip2 stream decoder (spec §4.7): stream header, then a
//! sequence of Huffman/MTF/BWT/RLE-decoded blocks terminated by an
//! end-of-stream marker and combined CRC, possibly repeated for
//! concatenated members.
//!
//! Block boundaries fall at arbitrary bit offsets (the per-block magic is
//! itself part of the unaligned bitstream), so — unlike `archive_xz`'s
//! byte-aligned block framing — this decoder can't simply buffer input and
//! scan for a byte-aligned marker. Instead each attempt to decode "the next
//! unit" (one block, or the end-of-stream marker) runs against a fresh
//! [`BitReader`] positioned at the last committed bit offset; running out
//! of buffered bits aborts that attempt with no side effects, and the next
//! `decompress` call retries the same unit from scratch once more input has
//! arrived. This generalizes `archive_xz::lzma2`'s whole-chunk buffering to
//! bit granularity.

use std::collections::VecDeque;

use tracing::{trace, warn};

use crate::bitreader::BitReader;
use crate::bwt::inverse_bwt;
use crate::crc;
use crate::error::{BlockError, Error, FormatError, ResourceLimitError, UnsupportedError};
use crate::huffman::{decode_code_lengths, HuffmanTable};
use crate::mtf::MoveToFront;
use crate::rle::rle1_decode;

const BLOCK_MAGIC: u64 = 0x3141_5926_5359;
const END_MAGIC: u64 = 0x1772_4538_5090;

/// Result of one `decompress` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Outcome {
    /// Bytes consumed from `in_buf`.
    pub bytes_read: usize,
    /// Bytes written into `out`.
    pub bytes_written: usize,
}

/// Resource limits this decoder enforces directly.
#[derive(Debug, Clone, Copy)]
pub struct DecoderLimits {
    /// Upper bound on a single block's decoded (pre-RLE1) symbol count,
    /// beyond the stream's own declared `blockSize`. `u64::MAX` disables.
    pub max_block_symbols: u64,
}

impl Default for DecoderLimits {
    fn default() -> Self {
        DecoderLimits { max_block_symbols: u64::MAX }
    }
}

enum Phase {
    StreamMagic,
    Member { block_size_limit: usize, combined_crc: u32 },
    AfterMember,
    Done,
}

/// Outcome of attempting to decode the next bitstream unit.
enum UnitOutcome {
    Block { bit_len: usize, crc: u32, bytes: Vec<u8> },
    EndOfMember { bit_len: usize, expected_crc: u32 },
}

/// Sequential decoder for a (possibly multi-member) bzip2 byte stream.
pub struct StreamDecoder {
    limits: DecoderLimits,
    input: Vec<u8>,
    bit_offset: usize,
    phase: Phase,
    pending_out: VecDeque<u8>,
}

impl StreamDecoder {
    /// Build a fresh decoder with default resource limits.
    pub fn new() -> Self {
        StreamDecoder::with_limits(DecoderLimits::default())
    }

    /// Build a fresh decoder with explicit resource limits.
    pub fn with_limits(limits: DecoderLimits) -> Self {
        StreamDecoder { limits, input: Vec::new(), bit_offset: 0, phase: Phase::StreamMagic, pending_out: VecDeque::new() }
    }

    /// Feed more compressed bytes and/or drain decoded output, matching the
    /// workspace-wide push decompressor contract.
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

    fn advance(&mut self, eof: bool) -> Result<bool, Error> {
        let phase = std::mem::replace(&mut self.phase, Phase::Done);
        let (next, progressed) = self.step(phase, eof)?;
        self.phase = next;
        Ok(progressed)
    }

    /// Drop fully-consumed leading bytes from `self.input`, keeping
    /// `self.bit_offset` pointed at the same logical bit regardless of
    /// byte alignment.
    fn commit_bits(&mut self) {
        let whole_bytes = self.bit_offset / 8;
        if whole_bytes > 0 {
            self.input.drain(..whole_bytes);
            self.bit_offset %= 8;
        }
    }

    fn step(&mut self, phase: Phase, eof: bool) -> Result<(Phase, bool), Error> {
        match phase {
            Phase::StreamMagic => {
                if self.input.len() < 4 {
                    if eof {
                        return Err(FormatError::Truncated.into());
                    }
                    return Ok((Phase::StreamMagic, false));
                }
                if &self.input[0..3] != b"BZh" {
                    return Err(FormatError::BadStreamMagic.into());
                }
                let digit = self.input[3];
                if !(b'1'..=b'9').contains(&digit) {
                    return Err(FormatError::BadBlockSizeDigit(digit).into());
                }
                let block_size_limit = (digit - b'0') as usize * 100_000;
                trace!(block_size_limit, "parsed bzip2 stream header");
                self.input.drain(..4);
                self.bit_offset = 0;
                Ok((Phase::Member { block_size_limit, combined_crc: 0 }, true))
            }

            Phase::Member { block_size_limit, combined_crc } => {
                let mut reader = BitReader::new(&self.input, self.bit_offset);
                match decode_unit(&mut reader, block_size_limit, self.limits.max_block_symbols) {
                    Ok(UnitOutcome::Block { bit_len, crc, bytes }) => {
                        let combined_crc = combined_crc.rotate_left(1) ^ crc;
                        self.bit_offset += bit_len;
                        self.pending_out.extend(bytes);
                        self.commit_bits();
                        Ok((Phase::Member { block_size_limit, combined_crc }, true))
                    }
                    Ok(UnitOutcome::EndOfMember { bit_len, expected_crc }) => {
                        if expected_crc != combined_crc {
                            warn!(expected = expected_crc, computed = combined_crc, "bzip2 combined crc mismatch");
                            return Err(FormatError::StreamCrcMismatch { expected: expected_crc, computed: combined_crc }.into());
                        }
                        self.bit_offset += bit_len;
                        self.bit_offset = (self.bit_offset + 7) / 8 * 8;
                        self.commit_bits();
                        Ok((Phase::AfterMember, true))
                    }
                    Err(BlockError::NeedMore) => {
                        if eof {
                            return Err(FormatError::Truncated.into());
                        }
                        Ok((Phase::Member { block_size_limit, combined_crc }, false))
                    }
                    Err(BlockError::Bad(e)) => Err(e),
                }
            }

            Phase::AfterMember => {
                if self.input.is_empty() {
                    if eof {
                        return Ok((Phase::Done, true));
                    }
                    return Ok((Phase::AfterMember, false));
                }
                if self.input.len() < 4 {
                    if eof {
                        return Err(FormatError::TrailingGarbage.into());
                    }
                    return Ok((Phase::AfterMember, false));
                }
                if self.input[0..3] == *b"BZh" {
                    return Ok((Phase::StreamMagic, true));
                }
                Err(FormatError::TrailingGarbage.into())
            }

            Phase::Done => Ok((Phase::Done, false)),
        }
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Attempt to decode exactly one bitstream unit (a block, or the
/// end-of-stream marker) starting at `reader`'s current position.
fn decode_unit(reader: &mut BitReader<'_>, block_size_limit: usize, max_block_symbols: u64) -> Result<UnitOutcome, BlockError> {
    let start = reader.bit_pos();
    let magic = reader.read_bits64(48)?;
    if magic == END_MAGIC {
        let expected_crc = reader.read_bits(32)?;
        return Ok(UnitOutcome::EndOfMember { bit_len: reader.bit_pos() - start, expected_crc });
    }
    if magic != BLOCK_MAGIC {
        return Err(FormatError::BadBlockMagic.into());
    }

    let block_crc = reader.read_bits(32)?;
    if reader.read_bit()? != 0 {
        return Err(UnsupportedError::Randomized.into());
    }
    let orig_ptr = reader.read_bits(24)?;

    let symbol_map = decode_symbol_map(reader)?;
    if symbol_map.is_empty() {
        return Err(FormatError::BadSelector.into());
    }
    let alpha_size = symbol_map.len() + 2;

    let n_groups = reader.read_bits(3)?;
    if !(2..=6).contains(&n_groups) {
        return Err(FormatError::BadSelector.into());
    }
    let n_selectors = reader.read_bits(15)?;

    let mut selector_mtf = MoveToFront::new((0..n_groups as u8).collect());
    let mut selectors = Vec::with_capacity(n_selectors as usize);
    for _ in 0..n_selectors {
        let mut run = 0usize;
        while reader.read_bit()? == 1 {
            run += 1;
            if run >= n_groups as usize {
                return Err(FormatError::BadSelector.into());
            }
        }
        let group = selector_mtf.decode(run).ok_or(FormatError::BadSelector)?;
        selectors.push(group);
    }

    let mut tables = Vec::with_capacity(n_groups as usize);
    for _ in 0..n_groups {
        let lengths = decode_code_lengths(reader, alpha_size)?;
        tables.push(HuffmanTable::build(&lengths)?);
    }

    let bwt = decode_symbols(reader, &symbol_map, &tables, &selectors, block_size_limit as u64, max_block_symbols)?;

    let unbwt = inverse_bwt(&bwt, orig_ptr)?;
    let final_bytes = rle1_decode(&unbwt)?;

    let computed_crc = crc::hash(&final_bytes);
    if computed_crc != block_crc {
        return Err(FormatError::BlockCrcMismatch { expected: block_crc, computed: computed_crc }.into());
    }

    Ok(UnitOutcome::Block { bit_len: reader.bit_pos() - start, crc: block_crc, bytes: final_bytes })
}

/// Decode the two-level `inUse16`/`inUse` bitmap into the ascending list of
/// byte values actually used in this block.
fn decode_symbol_map(reader: &mut BitReader<'_>) -> Result<Vec<u8>, BlockError> {
    let in_use16 = reader.read_bits(16)?;
    let mut used = Vec::new();
    for group in 0..16u32 {
        if in_use16 & (0x8000 >> group) == 0 {
            continue;
        }
        let bits = reader.read_bits(16)?;
        for bit in 0..16u32 {
            if bits & (0x8000 >> bit) != 0 {
                used.push((group * 16 + bit) as u8);
            }
        }
    }
    Ok(used)
}

/// Decode the Huffman/selector-driven symbol stream into the MTF'd BWT
/// array: RUNA/RUNB runs expand the move-to-front front value, other
/// symbols resolve through the MTF table directly, and EOB ends the block.
fn decode_symbols(
    reader: &mut BitReader<'_>,
    symbol_map: &[u8],
    tables: &[HuffmanTable],
    selectors: &[u8],
    block_size_limit: u64,
    max_block_symbols: u64,
) -> Result<Vec<u8>, BlockError> {
    let mut mtf = MoveToFront::new(symbol_map.to_vec());
    let eob = symbol_map.len() as u16 + 1;
    let limit = block_size_limit.min(max_block_symbols);

    let mut out = Vec::new();
    let mut selector_idx = 0usize;
    let mut group_pos = 0u32;
    let mut run_length: u64 = 0;
    let mut run_bit = 0u32;

    loop {
        let table = &tables[*selectors.get(selector_idx).ok_or(FormatError::BadSelector)? as usize];
        let symbol = table.decode(reader)?;
        group_pos += 1;
        if group_pos == 50 {
            group_pos = 0;
            selector_idx += 1;
        }

        if symbol == 0 || symbol == 1 {
            run_length += (if symbol == 0 { 1u64 } else { 2u64 }) << run_bit;
            run_bit += 1;
            continue;
        }

        if run_length > 0 {
            check_block_limit(out.len() as u64 + run_length, limit)?;
            out.resize(out.len() + run_length as usize, mtf.front());
            run_length = 0;
            run_bit = 0;
        }

        if symbol == eob {
            break;
        }

        let rank = symbol as usize - 1;
        let byte = mtf.decode(rank).ok_or(FormatError::BadSelector)?;
        check_block_limit(out.len() as u64 + 1, limit)?;
        out.push(byte);
    }

    Ok(out)
}

fn check_block_limit(size: u64, limit: u64) -> Result<(), BlockError> {
    if size > limit {
        return Err(ResourceLimitError { limit_name: "maxBzip2BlockSize", limit: Some(limit), required: Some(size) }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_crc_is_left_rotate_xor_accumulation() {
        let mut combined = 0u32;
        for block_crc in [0x1234_5678u32, 0x9abc_def0] {
            combined = combined.rotate_left(1) ^ block_crc;
        }
        assert_ne!(combined, 0);
    }
}
