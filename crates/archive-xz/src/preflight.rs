//! Seekable XZ index preflight (spec §4.6): proves resource bounds on a
//! random-access XZ source by walking tail-to-head through its stream
//! footers and indices, without decompressing a single byte.
//!
//! This module stays decoupled from `archive-io`'s `RandomAccess` trait (to
//! avoid a dependency cycle, since `archive-format` already depends on this
//! crate) behind the small [`TailSource`] trait; the facade crate adapts its
//! own random-access sources to it.

use crate::block::{parse_block_header, BlockHeaderParse};
use crate::error::{Error, FormatError, ResourceLimitError};
use crate::index;
use crate::lzma2::dict_size_from_prop;
use crate::stream::{StreamFooter, STREAM_FOOTER_LEN};

const SCAN_WINDOW: u64 = 32 * 1024;

/// Minimal random-access byte source the preflight walker needs.
pub trait TailSource {
    /// Total size of the source in bytes.
    fn size(&self) -> Result<u64, Error>;
    /// Read exactly `len` bytes starting at `offset`.
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>, Error>;
}

/// Resource limits enforced during preflight.
#[derive(Debug, Clone, Copy)]
pub struct PreflightLimits {
    /// Cap on total bytes the index(es) may occupy, across all streams.
    pub max_index_bytes: u64,
    /// Cap on total index records, across all streams.
    pub max_index_records: u64,
    /// Cap on block headers actually read and parsed per stream.
    pub max_preflight_block_headers: u64,
    /// Cap on any single block's decoded LZMA2 dictionary size.
    pub max_dictionary_bytes: u64,
}

/// Outcome of a successful preflight walk.
#[derive(Debug, Clone, Default)]
pub struct PreflightReport {
    /// Number of concatenated XZ streams found.
    pub stream_count: u32,
    /// Total index records across all streams.
    pub total_index_records: u64,
    /// Total encoded index bytes across all streams.
    pub total_index_bytes: u64,
    /// Largest LZMA2 dictionary size required by any block header actually read.
    pub required_dictionary_bytes: u64,
    /// True if any stream had more records than `max_preflight_block_headers`
    /// allowed scanning, meaning this report's `required_dictionary_bytes`
    /// may not reflect every block.
    pub incomplete: bool,
}

/// Walk `source` tail-to-head, accumulating index and dictionary-size
/// bounds. Fails fast with `COMPRESSION_RESOURCE_LIMIT`-equivalent errors
/// (`Error::ResourceLimit`) the moment any configured limit is exceeded.
pub fn preflight<T: TailSource>(source: &T, limits: PreflightLimits) -> Result<PreflightReport, Error> {
    let mut report = PreflightReport::default();
    let mut cursor = source.size()?;

    while cursor > 0 {
        let stream_end = skip_padding(source, cursor)?;
        if stream_end < STREAM_FOOTER_LEN as u64 {
            return Err(FormatError::Truncated.into());
        }

        let footer_bytes = source.read_at(stream_end - STREAM_FOOTER_LEN as u64, STREAM_FOOTER_LEN)?;
        let mut buf = [0u8; STREAM_FOOTER_LEN];
        buf.copy_from_slice(&footer_bytes);
        let footer = StreamFooter::parse(&buf)?;

        report.total_index_bytes += footer.index_size;
        if report.total_index_bytes > limits.max_index_bytes {
            return Err(ResourceLimitError {
                limit_name: "maxXzIndexBytes",
                limit: Some(limits.max_index_bytes),
                required: Some(report.total_index_bytes),
            }
            .into());
        }

        let index_start = stream_end - STREAM_FOOTER_LEN as u64 - footer.index_size;
        let index_bytes = source.read_at(index_start, footer.index_size as usize)?;
        let parsed_index = index::parse(&index_bytes)?;

        report.total_index_records += parsed_index.records.len() as u64;
        if report.total_index_records > limits.max_index_records {
            return Err(ResourceLimitError {
                limit_name: "maxXzIndexRecords",
                limit: Some(limits.max_index_records),
                required: Some(report.total_index_records),
            }
            .into());
        }

        let stream_header_len = 12u64;
        let blocks_len: u64 = parsed_index.records.iter().map(|r| round_up4(r.unpadded_size)).sum();
        let stream_header_offset = index_start.checked_sub(blocks_len + stream_header_len).ok_or(FormatError::Truncated)?;

        let headers_to_scan = parsed_index.records.len().min(limits.max_preflight_block_headers as usize);
        if parsed_index.records.len() > headers_to_scan {
            report.incomplete = true;
        }

        let mut block_offset = stream_header_offset + stream_header_len;
        for record in parsed_index.records.iter().take(headers_to_scan) {
            let size_byte = source.read_at(block_offset, 1)?[0];
            if size_byte == 0 {
                return Err(FormatError::InvalidBlockHeaderSize.into());
            }
            let header_size = (size_byte as usize + 1) * 4;
            let header_bytes = source.read_at(block_offset, header_size)?;
            let header = match parse_block_header(&header_bytes)? {
                BlockHeaderParse::Done(h) => h,
                _ => return Err(FormatError::Truncated.into()),
            };
            let dict_prop = header.filters.last().expect("validated chain has lzma2 last").lzma2_dict_prop()?;
            let dict_size = dict_size_from_prop(dict_prop)? as u64;
            if dict_size > limits.max_dictionary_bytes {
                return Err(ResourceLimitError {
                    limit_name: "maxXzDictionaryBytes",
                    limit: Some(limits.max_dictionary_bytes),
                    required: Some(dict_size),
                }
                .into());
            }
            report.required_dictionary_bytes = report.required_dictionary_bytes.max(dict_size);
            block_offset += round_up4(record.unpadded_size);
        }

        report.stream_count += 1;
        cursor = stream_header_offset;
    }

    Ok(report)
}

fn round_up4(n: u64) -> u64 {
    n + ((4 - (n % 4)) % 4)
}

/// Scan backward from `pos` in fixed-size windows, skipping zero-padding
/// four bytes at a time, until a non-zero 4-byte-aligned group is found.
/// Returns the offset immediately after that group (the true end of the
/// preceding stream).
fn skip_padding<T: TailSource>(source: &T, mut pos: u64) -> Result<u64, Error> {
    loop {
        if pos == 0 {
            return Err(FormatError::Truncated.into());
        }
        let start = pos.saturating_sub(SCAN_WINDOW);
        let window_len = (pos - start) as usize;
        let bytes = source.read_at(start, window_len)?;

        let mut i = bytes.len();
        while i >= 4 {
            if bytes[i - 4..i].iter().any(|&b| b != 0) {
                return Ok(start + i as u64);
            }
            i -= 4;
        }
        if start == 0 {
            return Err(FormatError::Truncated.into());
        }
        pos = start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MemSource(Vec<u8>);

    impl TailSource for MemSource {
        fn size(&self) -> Result<u64, Error> {
            Ok(self.0.len() as u64)
        }

        fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>, Error> {
            let offset = offset as usize;
            self.0
                .get(offset..offset + len)
                .map(|s| s.to_vec())
                .ok_or_else(|| FormatError::Truncated.into())
        }
    }

    #[test]
    fn round_up4_matches_expected_boundaries() {
        assert_eq!(round_up4(0), 0);
        assert_eq!(round_up4(1), 4);
        assert_eq!(round_up4(4), 4);
        assert_eq!(round_up4(5), 8);
    }

    #[test]
    fn skip_padding_finds_nonzero_tail_across_window_boundary() {
        let mut data = vec![0u8; (SCAN_WINDOW as usize) + 100];
        let marker_end = (SCAN_WINDOW as usize) - 50;
        data[marker_end - 4..marker_end].copy_from_slice(&[1, 2, 3, 4]);
        let source = MemSource(data.clone());
        let end = skip_padding(&source, data.len() as u64).unwrap();
        assert_eq!(end, marker_end as u64);
    }
}
