//! XZ index parsing (spec §4.4 "Index:" paragraph): an ordered list of
//! per-block `{unpaddedSize, uncompressedSize}` pairs, four-byte aligned,
//! with a trailing CRC32.

use crate::error::{Error, FormatError};
use crate::vli;

/// One block's accounting record as recorded in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    /// Unpadded size: block header + compressed data + check, no padding.
    pub unpadded_size: u64,
    /// Uncompressed size of the block's logical payload.
    pub uncompressed_size: u64,
}

/// The fully parsed index of one stream.
#[derive(Debug, Clone)]
pub struct Index {
    /// One record per block, in stream order.
    pub records: Vec<IndexRecord>,
}

/// Parse a complete index, `data` being exactly `indexSize` bytes as
/// computed from the stream footer's backward size (starting with the
/// `0x00` indicator byte and ending with the trailing CRC32).
pub fn parse(data: &[u8]) -> Result<Index, Error> {
    if data.is_empty() || data[0] != 0x00 {
        return Err(FormatError::Truncated.into());
    }
    if data.len() < 8 || data.len() % 4 != 0 {
        return Err(FormatError::Truncated.into());
    }

    let body = &data[..data.len() - 4];
    let expected_crc = u32::from_le_bytes([data[data.len() - 4], data[data.len() - 3], data[data.len() - 2], data[data.len() - 1]]);
    let computed_crc = crc32fast::hash(body);
    if expected_crc != computed_crc {
        return Err(FormatError::BadIndexCrc.into());
    }

    let mut offset = 1usize;
    let (count, used) = vli::decode(&body[offset..])?;
    offset += used;

    let mut records = Vec::with_capacity(count as usize);
    for i in 0..count {
        let (unpadded_size, used) = vli::decode(body.get(offset..).ok_or(FormatError::Truncated)?)?;
        offset += used;
        let (uncompressed_size, used) = vli::decode(body.get(offset..).ok_or(FormatError::Truncated)?)?;
        offset += used;
        if unpadded_size == 0 {
            return Err(FormatError::IndexMismatch { index: i }.into());
        }
        records.push(IndexRecord { unpadded_size, uncompressed_size });
    }

    if body[offset..].iter().any(|&b| b != 0) {
        return Err(FormatError::NonZeroPadding.into());
    }

    Ok(Index { records })
}

/// Outcome of attempting to parse an index from a buffer that may not yet
/// hold the whole thing.
pub enum IndexParseOutcome {
    /// A complete, CRC-validated index.
    Done {
        /// The parsed records.
        index: Index,
        /// Bytes consumed from the front of the input.
        consumed: usize,
    },
    /// More bytes are needed; call again once more input has arrived.
    NeedMore,
}

/// Incrementally attempt to parse an index starting at `data[0]` (which
/// must be the `0x00` indicator byte), without knowing the total encoded
/// length up front. Used by the sequential stream decoder, which sees the
/// index as part of a single forward byte stream rather than a
/// random-access tail read.
pub fn try_parse(data: &[u8], max_bytes: u64, max_records: u64) -> Result<IndexParseOutcome, Error> {
    if data.is_empty() {
        return Ok(IndexParseOutcome::NeedMore);
    }
    if data[0] != 0x00 {
        return Err(FormatError::Truncated.into());
    }

    let mut offset = 1usize;
    let count = match vli::decode(&data[offset..]) {
        Ok((v, used)) => {
            offset += used;
            v
        }
        Err(Error::Format(FormatError::Truncated)) => return Ok(IndexParseOutcome::NeedMore),
        Err(e) => return Err(e),
    };
    if count > max_records {
        return Err(Error::ResourceLimit(crate::error::ResourceLimitError {
            limit_name: "maxXzIndexRecords",
            limit: Some(max_records),
            required: Some(count),
        }));
    }

    for _ in 0..count {
        for _ in 0..2 {
            match vli::decode(data.get(offset..).unwrap_or(&[])) {
                Ok((_, used)) => offset += used,
                Err(Error::Format(FormatError::Truncated)) => return Ok(IndexParseOutcome::NeedMore),
                Err(e) => return Err(e),
            }
        }
        if offset as u64 > max_bytes {
            return Err(Error::ResourceLimit(crate::error::ResourceLimitError {
                limit_name: "maxXzIndexBytes",
                limit: Some(max_bytes),
                required: Some(offset as u64),
            }));
        }
    }

    let padding = (4 - offset % 4) % 4;
    let total = offset + padding + 4;
    if total as u64 > max_bytes {
        return Err(Error::ResourceLimit(crate::error::ResourceLimitError {
            limit_name: "maxXzIndexBytes",
            limit: Some(max_bytes),
            required: Some(total as u64),
        }));
    }
    if data.len() < total {
        return Ok(IndexParseOutcome::NeedMore);
    }

    let index = parse(&data[..total])?;
    Ok(IndexParseOutcome::Done { index, consumed: total })
}

/// The exact encoded byte length of an index holding `records`, useful for
/// the preflight walker to validate a footer's declared `indexSize` without
/// fully re-encoding.
pub fn encoded_len(records: &[IndexRecord]) -> usize {
    let mut len = 1;
    let mut count_buf = Vec::new();
    vli::encode(records.len() as u64, &mut count_buf);
    len += count_buf.len();
    for r in records {
        let mut buf = Vec::new();
        vli::encode(r.unpadded_size, &mut buf);
        len += buf.len();
        buf.clear();
        vli::encode(r.uncompressed_size, &mut buf);
        len += buf.len();
    }
    len += (4 - len % 4) % 4;
    len + 4
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(records: &[IndexRecord]) -> Vec<u8> {
        let mut body = vec![0x00u8];
        vli::encode(records.len() as u64, &mut body);
        for r in records {
            vli::encode(r.unpadded_size, &mut body);
            vli::encode(r.uncompressed_size, &mut body);
        }
        while body.len() % 4 != 0 {
            body.push(0);
        }
        let crc = crc32fast::hash(&body);
        body.extend_from_slice(&crc.to_le_bytes());
        body
    }

    #[test]
    fn parses_multi_record_index() {
        let records = vec![
            IndexRecord { unpadded_size: 100, uncompressed_size: 200 },
            IndexRecord { unpadded_size: 50, uncompressed_size: 80 },
        ];
        let bytes = encode(&records);
        assert_eq!(bytes.len(), encoded_len(&records));
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.records, records);
    }

    #[test]
    fn bad_crc_is_rejected() {
        let mut bytes = encode(&[IndexRecord { unpadded_size: 4, uncompressed_size: 4 }]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(parse(&bytes).is_err());
    }
}
