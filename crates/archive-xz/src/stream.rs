//! XZ stream header and footer framing (spec §4.4/§6).

use crate::error::{Error, FormatError};

/// The 6-byte magic that opens every XZ stream.
pub const STREAM_HEADER_MAGIC: [u8; 6] = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
/// The 2-byte magic that closes the stream footer.
pub const STREAM_FOOTER_MAGIC: [u8; 2] = [0x59, 0x5A];

/// Fixed on-disk size of a stream header.
pub const STREAM_HEADER_LEN: usize = 12;
/// Fixed on-disk size of a stream footer.
pub const STREAM_FOOTER_LEN: usize = 12;

/// The block/stream integrity check algorithm, carried in the stream flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckType {
    /// No integrity check.
    None,
    /// CRC32 (4 bytes).
    Crc32,
    /// CRC64 (8 bytes).
    Crc64,
    /// SHA-256 (32 bytes).
    Sha256,
}

impl CheckType {
    /// Map a raw 4-bit check-type id, per the closed set in spec §4.4.
    pub fn from_id(id: u8) -> Result<Self, Error> {
        match id {
            0x00 => Ok(CheckType::None),
            0x01 => Ok(CheckType::Crc32),
            0x04 => Ok(CheckType::Crc64),
            0x0A => Ok(CheckType::Sha256),
            other => Err(FormatError::UnknownCheckType(other).into()),
        }
    }

    /// Raw 4-bit id for re-encoding/footer comparison.
    pub fn id(self) -> u8 {
        match self {
            CheckType::None => 0x00,
            CheckType::Crc32 => 0x01,
            CheckType::Crc64 => 0x04,
            CheckType::Sha256 => 0x0A,
        }
    }

    /// Byte length of the check value itself.
    pub fn len(self) -> usize {
        match self {
            CheckType::None => 0,
            CheckType::Crc32 => 4,
            CheckType::Crc64 => 8,
            CheckType::Sha256 => 32,
        }
    }
}

/// The two bytes of stream flags, shared verbatim between header and footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFlags {
    /// The declared integrity check type.
    pub check_type: CheckType,
}

impl StreamFlags {
    fn decode(bytes: [u8; 2]) -> Result<Self, Error> {
        if bytes[0] != 0 {
            return Err(FormatError::InvalidStreamFlags.into());
        }
        if bytes[1] & 0xF0 != 0 {
            return Err(FormatError::InvalidStreamFlags.into());
        }
        Ok(StreamFlags { check_type: CheckType::from_id(bytes[1] & 0x0F)? })
    }

    fn encode(self) -> [u8; 2] {
        [0x00, self.check_type.id()]
    }
}

/// A parsed, validated 12-byte stream header.
#[derive(Debug, Clone, Copy)]
pub struct StreamHeader {
    /// The integrity check used by every block in this stream.
    pub flags: StreamFlags,
}

impl StreamHeader {
    /// Parse and validate a 12-byte stream header.
    pub fn parse(buf: &[u8; STREAM_HEADER_LEN]) -> Result<Self, Error> {
        if buf[0..6] != STREAM_HEADER_MAGIC {
            return Err(FormatError::BadStreamMagic.into());
        }
        let flags = StreamFlags::decode([buf[6], buf[7]])?;
        let expected_crc = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let computed_crc = crc32fast::hash(&buf[6..8]);
        if expected_crc != computed_crc {
            return Err(FormatError::BadHeaderCrc.into());
        }
        Ok(StreamHeader { flags })
    }

    /// Serialize back to 12 bytes (used by the preflight's footer-driven
    /// cross-check and by tests).
    pub fn encode(self) -> [u8; STREAM_HEADER_LEN] {
        let mut buf = [0u8; STREAM_HEADER_LEN];
        buf[0..6].copy_from_slice(&STREAM_HEADER_MAGIC);
        let flags = self.flags.encode();
        buf[6..8].copy_from_slice(&flags);
        let crc = crc32fast::hash(&flags);
        buf[8..12].copy_from_slice(&crc.to_le_bytes());
        buf
    }
}

/// A parsed, validated 12-byte stream footer.
#[derive(Debug, Clone, Copy)]
pub struct StreamFooter {
    /// The integrity check, which must match the header's.
    pub flags: StreamFlags,
    /// Encoded index size in bytes: `(backward_size + 1) * 4`.
    pub index_size: u64,
}

impl StreamFooter {
    /// Parse and validate a 12-byte stream footer.
    pub fn parse(buf: &[u8; STREAM_FOOTER_LEN]) -> Result<Self, Error> {
        let expected_crc = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let computed_crc = crc32fast::hash(&buf[4..10]);
        if expected_crc != computed_crc {
            return Err(FormatError::BadHeaderCrc.into());
        }
        let backward_size = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let flags = StreamFlags::decode([buf[8], buf[9]])?;
        if buf[10..12] != STREAM_FOOTER_MAGIC {
            return Err(FormatError::BadFooterMagic.into());
        }
        let index_size = (backward_size as u64 + 1) * 4;
        Ok(StreamFooter { flags, index_size })
    }

    /// Serialize back to 12 bytes.
    pub fn encode(self) -> [u8; STREAM_FOOTER_LEN] {
        let backward_size = ((self.index_size / 4) - 1) as u32;
        let mut mid = [0u8; 6];
        mid[0..4].copy_from_slice(&backward_size.to_le_bytes());
        mid[4..6].copy_from_slice(&self.flags.encode());
        let crc = crc32fast::hash(&mid);
        let mut buf = [0u8; STREAM_FOOTER_LEN];
        buf[0..4].copy_from_slice(&crc.to_le_bytes());
        buf[4..10].copy_from_slice(&mid);
        buf[10..12].copy_from_slice(&STREAM_FOOTER_MAGIC);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrips() {
        let header = StreamHeader { flags: StreamFlags { check_type: CheckType::Crc32 } };
        let bytes = header.encode();
        let parsed = StreamHeader::parse(&bytes).unwrap();
        assert_eq!(parsed.flags.check_type, CheckType::Crc32);
    }

    #[test]
    fn footer_roundtrips() {
        let footer = StreamFooter { flags: StreamFlags { check_type: CheckType::Sha256 }, index_size: 64 };
        let bytes = footer.encode();
        let parsed = StreamFooter::parse(&bytes).unwrap();
        assert_eq!(parsed.flags.check_type, CheckType::Sha256);
        assert_eq!(parsed.index_size, 64);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = [0u8; STREAM_HEADER_LEN];
        buf[0..6].copy_from_slice(b"NOTMGC");
        assert!(StreamHeader::parse(&buf).is_err());
    }
}
