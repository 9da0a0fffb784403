//! Local File Header and data descriptor parsing.

use winnow::binary::{le_u16, le_u32, le_u64, le_u8};
use winnow::token::literal;
use winnow::{seq, PResult, Partial};

use super::raw::ZipString;
use super::{Method, Mode};
use crate::error::UnsupportedError;

/// Method-specific fields embedded directly in a local header (beyond the
/// generic method/flags/size fields). Only LZMA needs this today.
#[derive(Debug, Clone, Copy, Default)]
pub enum MethodSpecific {
    /// No method-specific header.
    #[default]
    None,
    /// LZMA (ZIP method 14) properties header.
    Lzma(LzmaProperties),
}

/// The LZMA properties sub-header ZIP prepends before LZMA-compressed data.
#[derive(Debug, Clone, Copy)]
pub struct LzmaProperties {
    /// LZMA SDK major version.
    pub major: u8,
    /// LZMA SDK minor version.
    pub minor: u8,
    /// Size of the properties blob that follows (must be 5 for LZMA 2.0).
    pub properties_size: u16,
}

impl LzmaProperties {
    /// Validate that this is an LZMA version/properties-size combination we
    /// support: only LZMA SDK 2.0 with a 5-byte properties blob.
    pub fn error_if_unsupported(&self) -> Result<(), UnsupportedError> {
        if self.major != 2 || self.minor != 0 {
            return Err(UnsupportedError::LzmaVersionUnsupported {
                major: self.major,
                minor: self.minor,
            });
        }
        if self.properties_size != 5 {
            return Err(UnsupportedError::LzmaPropertiesHeaderWrongSize {
                expected: 5,
                actual: self.properties_size,
            });
        }
        Ok(())
    }
}

/// A ZIP Local File Header, with name/extra borrowed from the input buffer.
#[derive(Debug, Clone)]
pub struct LocalFileHeader {
    /// Version needed to extract.
    pub reader_version: u16,
    /// General purpose bit flags.
    pub flags: u16,
    /// Raw compression method id.
    pub method: u16,
    /// MS-DOS packed modification time.
    pub modified_time: u16,
    /// MS-DOS packed modification date.
    pub modified_date: u16,
    /// CRC32 (zero and deferred to a data descriptor when flag bit 3 is set).
    pub crc32: u32,
    /// Compressed size (32-bit; may be the ZIP64 sentinel).
    pub compressed_size: u32,
    /// Uncompressed size (32-bit; may be the ZIP64 sentinel).
    pub uncompressed_size: u32,
    /// Entry name, raw bytes (encoding decided by caller).
    pub name: ZipString,
    /// Raw extra field blob.
    pub extra: Vec<u8>,
}

impl LocalFileHeader {
    /// Fixed signature.
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    /// Fixed-size portion, not counting name/extra.
    pub const FIXED_SIZE: usize = 30;

    /// Parse the signature and fixed fields, then the variable name/extra.
    pub fn parser(i: &mut Partial<&[u8]>) -> PResult<LocalFileHeader> {
        literal(Self::SIGNATURE).parse_next(i)?;
        seq! {LocalFileHeader {
            reader_version: le_u16,
            flags: le_u16,
            method: le_u16,
            modified_time: le_u16,
            modified_date: le_u16,
            crc32: le_u32,
            compressed_size: le_u32,
            uncompressed_size: le_u32,
            name: le_u16.flat_map(ZipString::parser),
            extra: le_u16.flat_map(|len: u16| {
                winnow::token::take(len).map(|b: &[u8]| b.to_vec())
            }),
        }}
        .parse_next(i)
    }

    /// True when bit 3 (data descriptor follows) is set.
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & 0x08 != 0
    }

    /// Derive the entry's on-disk [`Mode`] purely from this header: a
    /// trailing `/` in the name means a directory, matching what producers
    /// that never set external attributes still communicate in the name.
    pub fn inferred_mode(&self, name: &str) -> Mode {
        if name.ends_with('/') {
            Mode::DIR
        } else {
            Mode::REGULAR
        }
    }

    /// The raw `Method` this header declares (before any WinZip AES override).
    pub fn method(&self) -> Method {
        Method::from(self.method)
    }
}

/// The record following compressed data when the LFH's data-descriptor bit
/// is set: CRC32 and sizes that were unknown when the LFH was written
/// (streamed, non-seekable producers).
#[derive(Debug, Clone, Copy)]
pub struct DataDescriptorRecord {
    /// CRC32 of the uncompressed data.
    pub crc32: u32,
    /// Compressed size.
    pub compressed_size: u64,
    /// Uncompressed size.
    pub uncompressed_size: u64,
}

impl DataDescriptorRecord {
    /// Optional signature some (but not all) producers emit before the
    /// descriptor fields. Per spec §9 open question (c), both forms
    /// (present or absent) are accepted.
    pub const SIGNATURE: &'static [u8] = b"PK\x07\x08";

    /// Build a parser for a data descriptor, given whether 64-bit (ZIP64)
    /// size fields are in effect for this entry.
    pub fn mk_parser(
        is_zip64: bool,
    ) -> impl FnMut(&mut Partial<&[u8]>) -> PResult<DataDescriptorRecord> {
        move |i: &mut Partial<&[u8]>| {
            let _ = winnow::combinator::opt(literal(Self::SIGNATURE)).parse_next(i)?;
            let crc32 = le_u32.parse_next(i)?;
            let (compressed_size, uncompressed_size) = if is_zip64 {
                (le_u64.parse_next(i)?, le_u64.parse_next(i)?)
            } else {
                (le_u32.parse_next(i)? as u64, le_u32.parse_next(i)? as u64)
            };
            Ok(DataDescriptorRecord {
                crc32,
                compressed_size,
                uncompressed_size,
            })
        }
    }
}

#[allow(dead_code)]
fn le_u8_unused(i: &mut Partial<&[u8]>) -> PResult<u8> {
    le_u8.parse_next(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_local_header() {
        let mut v = Vec::new();
        v.extend_from_slice(LocalFileHeader::SIGNATURE);
        v.extend_from_slice(&20u16.to_le_bytes()); // reader_version
        v.extend_from_slice(&0u16.to_le_bytes()); // flags
        v.extend_from_slice(&0u16.to_le_bytes()); // method (store)
        v.extend_from_slice(&0u16.to_le_bytes()); // time
        v.extend_from_slice(&0u16.to_le_bytes()); // date
        v.extend_from_slice(&0u32.to_le_bytes()); // crc32
        v.extend_from_slice(&5u32.to_le_bytes()); // compressed size
        v.extend_from_slice(&5u32.to_le_bytes()); // uncompressed size
        v.extend_from_slice(&4u16.to_le_bytes()); // name len
        v.extend_from_slice(&0u16.to_le_bytes()); // extra len
        v.extend_from_slice(b"a.txt"[..4].as_ref());

        let mut p = Partial::new(&v[..]);
        let header = LocalFileHeader::parser(&mut p).unwrap();
        assert_eq!(header.name.0, b"a.tx");
        assert_eq!(header.method(), Method::Store);
    }

    #[test]
    fn data_descriptor_without_signature() {
        let mut v = Vec::new();
        v.extend_from_slice(&0xdead_beefu32.to_le_bytes());
        v.extend_from_slice(&10u32.to_le_bytes());
        v.extend_from_slice(&20u32.to_le_bytes());
        let mut p = Partial::new(&v[..]);
        let dd = DataDescriptorRecord::mk_parser(false)(&mut p).unwrap();
        assert_eq!(dd.crc32, 0xdead_beef);
        assert_eq!(dd.compressed_size, 10);
    }
}
