//! XZ block header parsing: flags, optional sizes, filter chain (spec §4.4
//! steps 1-4, §4.5).

use crate::error::{Error, FormatError, UnsupportedError};
use crate::vli;

/// Filter id for LZMA2: must be present exactly once, and must be last.
pub const FILTER_LZMA2: u64 = 0x21;
/// Filter id for Delta: non-last, 1 byte of props.
pub const FILTER_DELTA: u64 = 0x03;
/// BCJ filter ids, each non-last with 0 or 4 bytes of props.
pub const FILTER_BCJ_X86: u64 = 0x04;
pub const FILTER_BCJ_POWERPC: u64 = 0x05;
pub const FILTER_BCJ_IA64: u64 = 0x06;
pub const FILTER_BCJ_ARM: u64 = 0x07;
pub const FILTER_BCJ_ARM_THUMB: u64 = 0x08;
pub const FILTER_BCJ_SPARC: u64 = 0x09;
pub const FILTER_BCJ_ARM64: u64 = 0x0A;
pub const FILTER_BCJ_RISCV: u64 = 0x0B;

/// The architectural alignment required of a BCJ filter's 4-byte start offset.
pub fn bcj_alignment(filter_id: u64) -> Option<u32> {
    match filter_id {
        FILTER_BCJ_X86 => Some(1),
        FILTER_BCJ_ARM_THUMB => Some(2),
        FILTER_BCJ_RISCV => Some(2),
        FILTER_BCJ_POWERPC | FILTER_BCJ_ARM | FILTER_BCJ_SPARC | FILTER_BCJ_ARM64 => Some(4),
        FILTER_BCJ_IA64 => Some(16),
        _ => None,
    }
}

/// True if `filter_id` is a recognized, non-last-only filter (Delta or any BCJ).
pub fn is_non_last_filter(filter_id: u64) -> bool {
    filter_id == FILTER_DELTA || bcj_alignment(filter_id).is_some()
}

/// One parsed filter entry: an id plus raw properties bytes.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    /// The filter's VLI id.
    pub id: u64,
    /// 0-255 raw properties bytes, meaning dependent on `id`.
    pub props: Vec<u8>,
}

impl FilterSpec {
    /// Delta filter's decoded distance (props\[0\] + 1), 1..=256.
    pub fn delta_distance(&self) -> Result<usize, Error> {
        if self.props.len() != 1 {
            return Err(UnsupportedError::BadFilterProps {
                filter: FILTER_DELTA,
                expected: &[1],
                actual: self.props.len(),
            }
            .into());
        }
        Ok(self.props[0] as usize + 1)
    }

    /// BCJ filter's decoded start offset (0 if no properties given).
    pub fn bcj_start_offset(&self) -> Result<u32, Error> {
        match self.props.len() {
            0 => Ok(0),
            4 => {
                let offset = u32::from_le_bytes([self.props[0], self.props[1], self.props[2], self.props[3]]);
                let alignment = bcj_alignment(self.id).expect("caller only calls this for bcj filters");
                if offset % alignment != 0 {
                    return Err(UnsupportedError::BadBcjAlignment { filter: self.id, offset, alignment }.into());
                }
                Ok(offset)
            }
            actual => Err(UnsupportedError::BadFilterProps { filter: self.id, expected: &[0, 4], actual }.into()),
        }
    }

    /// LZMA2's 1-byte dictionary-size property.
    pub fn lzma2_dict_prop(&self) -> Result<u8, Error> {
        if self.props.len() != 1 {
            return Err(UnsupportedError::BadFilterProps {
                filter: FILTER_LZMA2,
                expected: &[1],
                actual: self.props.len(),
            }
            .into());
        }
        Ok(self.props[0])
    }
}

/// Validate a parsed filter chain against the closed set and ordering rules
/// of spec §3/§4.5: exactly one LZMA2 filter, always last; Delta/BCJ filters
/// non-last with correctly sized properties.
pub fn validate_filter_chain(filters: &[FilterSpec]) -> Result<(), Error> {
    if filters.is_empty() || filters.len() > 4 {
        return Err(UnsupportedError::TooManyFilters(filters.len() as u8).into());
    }
    for (i, filter) in filters.iter().enumerate() {
        let is_last = i == filters.len() - 1;
        match filter.id {
            FILTER_LZMA2 => {
                if !is_last {
                    return Err(UnsupportedError::Lzma2NotLast.into());
                }
                filter.lzma2_dict_prop()?;
            }
            FILTER_DELTA => {
                if is_last {
                    return Err(UnsupportedError::FilterMustNotBeLast(FILTER_DELTA).into());
                }
                filter.delta_distance()?;
            }
            id if bcj_alignment(id).is_some() => {
                if is_last {
                    return Err(UnsupportedError::FilterMustNotBeLast(id).into());
                }
                filter.bcj_start_offset()?;
            }
            other => return Err(UnsupportedError::UnknownFilter(other).into()),
        }
    }
    if filters.last().map(|f| f.id) != Some(FILTER_LZMA2) {
        return Err(UnsupportedError::Lzma2NotLast.into());
    }
    Ok(())
}

/// A parsed, validated block header (spec §4.4 step 1-4).
#[derive(Debug, Clone)]
pub struct BlockHeader {
    /// Size of this header in bytes, including the size byte and CRC32 tail.
    pub header_size: usize,
    /// Declared compressed payload size, if present in the header.
    pub compressed_size: Option<u64>,
    /// Declared uncompressed payload size, if present in the header.
    pub uncompressed_size: Option<u64>,
    /// The validated filter chain, 1-4 entries, LZMA2 always last.
    pub filters: Vec<FilterSpec>,
}

/// Result of attempting to parse a block header from a buffer that may not
/// yet contain the whole header.
pub enum BlockHeaderParse {
    /// A complete, validated header.
    Done(BlockHeader),
    /// More bytes are needed; call again once more input has arrived.
    NeedMore,
    /// The leading size byte was zero: this is the start of the index, not a block.
    IsIndex,
}

/// Attempt to parse a block header starting at `data[0]`. The first byte
/// determines the total header size (`(byte+1)*4`, capped at 1024); `0`
/// means "this is the index, not a block" per spec §4.4 step 1.
pub fn parse_block_header(data: &[u8]) -> Result<BlockHeaderParse, Error> {
    if data.is_empty() {
        return Ok(BlockHeaderParse::NeedMore);
    }
    let size_byte = data[0];
    if size_byte == 0 {
        return Ok(BlockHeaderParse::IsIndex);
    }
    let header_size = (size_byte as usize + 1) * 4;
    if header_size > 1024 {
        return Err(FormatError::InvalidBlockHeaderSize.into());
    }
    if data.len() < header_size {
        return Ok(BlockHeaderParse::NeedMore);
    }

    let body = &data[..header_size];
    let expected_crc = u32::from_le_bytes([
        body[header_size - 4],
        body[header_size - 3],
        body[header_size - 2],
        body[header_size - 1],
    ]);
    let computed_crc = crc32fast::hash(&body[..header_size - 4]);
    if expected_crc != computed_crc {
        return Err(FormatError::BadHeaderCrc.into());
    }

    let flags = body[1];
    if flags & 0x3C != 0 {
        return Err(FormatError::ReservedBlockFlagsSet.into());
    }
    let filter_count = (flags & 0x03) + 1;
    let has_compressed_size = flags & 0x40 != 0;
    let has_uncompressed_size = flags & 0x80 != 0;

    let mut offset = 2usize;
    let rest = &body[..header_size - 4];

    let compressed_size = if has_compressed_size {
        let (v, used) = vli::decode(&rest[offset..])?;
        offset += used;
        Some(v)
    } else {
        None
    };
    let uncompressed_size = if has_uncompressed_size {
        let (v, used) = vli::decode(&rest[offset..])?;
        offset += used;
        Some(v)
    } else {
        None
    };

    let mut filters = Vec::with_capacity(filter_count as usize);
    for _ in 0..filter_count {
        let (id, used) = vli::decode(&rest[offset..])?;
        offset += used;
        let (props_len, used) = vli::decode(&rest[offset..])?;
        offset += used;
        let props_len = props_len as usize;
        if offset + props_len > rest.len() {
            return Err(FormatError::InvalidBlockHeaderSize.into());
        }
        let props = rest[offset..offset + props_len].to_vec();
        offset += props_len;
        filters.push(FilterSpec { id, props });
    }

    // Remaining bytes up to the padding boundary must be zero.
    if rest[offset..].iter().any(|&b| b != 0) {
        return Err(FormatError::NonZeroPadding.into());
    }

    validate_filter_chain(&filters)?;

    Ok(BlockHeaderParse::Done(BlockHeader { header_size, compressed_size, uncompressed_size, filters }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_block_header(filters: &[FilterSpec], compressed_size: Option<u64>, uncompressed_size: Option<u64>) -> Vec<u8> {
        let mut flags = (filters.len() as u8 - 1) & 0x03;
        if compressed_size.is_some() {
            flags |= 0x40;
        }
        if uncompressed_size.is_some() {
            flags |= 0x80;
        }
        let mut body = vec![0u8 /* placeholder size byte */, flags];
        if let Some(v) = compressed_size {
            vli::encode(v, &mut body);
        }
        if let Some(v) = uncompressed_size {
            vli::encode(v, &mut body);
        }
        for f in filters {
            vli::encode(f.id, &mut body);
            vli::encode(f.props.len() as u64, &mut body);
            body.extend_from_slice(&f.props);
        }
        while (body.len() + 4) % 4 != 0 {
            body.push(0);
        }
        let size_byte = ((body.len() + 4) / 4 - 1) as u8;
        body[0] = size_byte;
        let crc = crc32fast::hash(&body);
        body.extend_from_slice(&crc.to_le_bytes());
        body
    }

    #[test]
    fn parses_simple_lzma2_only_header() {
        let filters = vec![FilterSpec { id: FILTER_LZMA2, props: vec![0x00] }];
        let bytes = encode_block_header(&filters, Some(10), Some(20));
        match parse_block_header(&bytes).unwrap() {
            BlockHeaderParse::Done(h) => {
                assert_eq!(h.compressed_size, Some(10));
                assert_eq!(h.uncompressed_size, Some(20));
                assert_eq!(h.filters.len(), 1);
            }
            _ => panic!("expected Done"),
        }
    }

    #[test]
    fn lzma2_not_last_is_rejected() {
        let filters = vec![
            FilterSpec { id: FILTER_LZMA2, props: vec![0x00] },
            FilterSpec { id: FILTER_BCJ_X86, props: vec![] },
        ];
        assert!(validate_filter_chain(&filters).is_err());
    }

    #[test]
    fn zero_size_byte_means_index() {
        assert!(matches!(parse_block_header(&[0x00]).unwrap(), BlockHeaderParse::IsIndex));
    }
}
