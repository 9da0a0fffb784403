//! ZIP "extra field" records: vendor/feature-specific key-value blocks
//! appended to local and central headers.

use winnow::binary::{le_u16, le_u32, le_u64, le_u8};
use winnow::combinator::{alt, cond};
use winnow::error::{ErrMode, ErrorKind, ParserError};
use winnow::token::take;
use winnow::{seq, PResult, Partial};

/// One raw `(tag, payload)` pair as it appears back-to-back in the extra
/// field blob.
#[derive(Debug, Clone)]
pub struct ExtraFieldRecord {
    /// The 2-byte extra field tag.
    pub tag: u16,
    /// The tag-specific payload bytes.
    pub payload: Vec<u8>,
}

impl ExtraFieldRecord {
    /// Parse a single `(tag, len, payload)` triple.
    pub fn parser(i: &mut Partial<&[u8]>) -> PResult<ExtraFieldRecord> {
        let tag = le_u16.parse_next(i)?;
        let len = le_u16.parse_next(i)?;
        let payload: &[u8] = take(len).parse_next(i)?;
        Ok(ExtraFieldRecord { tag, payload: payload.to_vec() })
    }
}

/// Which of a CDFH/LFH's own fixed-size fields carried the ZIP64 sentinel
/// value `0xFFFFFFFF`, determining which fields the ZIP64 extra must supply.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtraFieldSettings {
    /// The fixed uncompressed-size field was the ZIP64 sentinel.
    pub uncompressed_size_u32: bool,
    /// The fixed compressed-size field was the ZIP64 sentinel.
    pub compressed_size_u32: bool,
    /// The fixed local-header-offset field was the ZIP64 sentinel.
    pub header_offset_u32: bool,
}

/// A decoded extra field.
#[derive(Debug, Clone)]
pub enum ExtraField {
    /// ZIP64 (tag `0x0001`).
    Zip64(ExtraZip64Field),
    /// Extended timestamp (tag `0x5455`).
    Timestamp(ExtraTimestampField),
    /// Info-ZIP Unix extra (tag `0x000d`).
    Unix(ExtraUnixField),
    /// Info-ZIP new Unix extra (tag `0x7875`).
    NewUnix(ExtraNewUnixField),
    /// NTFS extra (tag `0x000a`).
    Ntfs(ExtraNtfsField),
    /// Info-ZIP Unicode Path/Comment (tags `0x7075`/`0x6375`).
    InfoZipUnicode(InfoZipUnicodeField),
    /// WinZip AES encryption extra (tag `0x9901`).
    WinZipAes(WinZipAesField),
    /// Any tag not recognized above.
    Unknown {
        /// The unrecognized tag.
        tag: u16,
    },
}

impl ExtraField {
    /// Build a parser for one extra field record given the surrounding
    /// settings (needed to disambiguate ZIP64's optional sub-fields).
    pub fn mk_parser(
        settings: ExtraFieldSettings,
    ) -> impl FnMut(&mut Partial<&[u8]>) -> PResult<ExtraField> {
        move |i: &mut Partial<&[u8]>| {
            let rec = ExtraFieldRecord::parser(i)?;
            let mut body = Partial::new(&rec.payload[..]);
            let body = &mut body;
            let field = match rec.tag {
                0x0001 => ExtraZip64Field::parser(settings)(body).map(ExtraField::Zip64),
                0x5455 => ExtraTimestampField::parser(body).map(ExtraField::Timestamp),
                0x000d => ExtraUnixField::parser(body).map(ExtraField::Unix),
                0x5855 => ExtraUnixField::parser(body).map(ExtraField::Unix),
                0x7875 => ExtraNewUnixField::parser(body).map(ExtraField::NewUnix),
                0x000a => ExtraNtfsField::parser(body).map(ExtraField::Ntfs),
                0x7075 => InfoZipUnicodeField::parser_path(body).map(ExtraField::InfoZipUnicode),
                0x6375 => InfoZipUnicodeField::parser_comment(body).map(ExtraField::InfoZipUnicode),
                0x9901 => WinZipAesField::parser(body).map(ExtraField::WinZipAes),
                tag => Ok(ExtraField::Unknown { tag }),
            };
            // A malformed *known* extra field is non-fatal: treat it as unknown
            // rather than aborting the whole central-directory parse.
            Ok(field.unwrap_or(ExtraField::Unknown { tag: rec.tag }))
        }
    }
}

/// ZIP64 extended information (tag `0x0001`). Fields are present only when
/// the corresponding fixed-size field held the `0xFFFFFFFF`/`0xFFFF` sentinel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtraZip64Field {
    /// True 64-bit uncompressed size.
    pub uncompressed_size: Option<u64>,
    /// True 64-bit compressed size.
    pub compressed_size: Option<u64>,
    /// True 64-bit local header offset.
    pub header_offset: Option<u64>,
    /// True disk-start number.
    pub disk_start: Option<u32>,
}

impl ExtraZip64Field {
    fn parser(
        settings: ExtraFieldSettings,
    ) -> impl FnMut(&mut Partial<&[u8]>) -> PResult<ExtraZip64Field> {
        move |i: &mut Partial<&[u8]>| {
            let uncompressed_size = cond(settings.uncompressed_size_u32, le_u64).parse_next(i)?;
            let compressed_size = cond(settings.compressed_size_u32, le_u64).parse_next(i)?;
            let header_offset = cond(settings.header_offset_u32, le_u64).parse_next(i)?;
            // disk_start is present only if the remaining bytes allow it; in
            // practice writers include it only when the fixed disk field was
            // also the 0xFFFF sentinel, which this parser's caller has
            // already filtered the bytes down to (empty slice => None).
            let disk_start = if i.eof_offset() >= 4 {
                Some(le_u32.parse_next(i)?)
            } else {
                None
            };
            Ok(ExtraZip64Field {
                uncompressed_size,
                compressed_size,
                header_offset,
                disk_start,
            })
        }
    }
}

/// Extended timestamp extra (tag `0x5455`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtraTimestampField {
    /// Modification time, Unix epoch seconds, when flag bit 0 is set.
    pub mtime: Option<i64>,
    /// Access time, present when flag bit 1 is set (local header only).
    pub atime: Option<i64>,
    /// Creation time, present when flag bit 2 is set (local header only).
    pub ctime: Option<i64>,
}

impl ExtraTimestampField {
    fn parser(i: &mut Partial<&[u8]>) -> PResult<ExtraTimestampField> {
        let flags = le_u8.parse_next(i)?;
        let mtime = cond(flags & 0x01 != 0, le_u32.map(|v| v as i64)).parse_next(i)?;
        let atime = cond(flags & 0x02 != 0, le_u32.map(|v| v as i64)).parse_next(i)?;
        let ctime = cond(flags & 0x04 != 0, le_u32.map(|v| v as i64)).parse_next(i)?;
        Ok(ExtraTimestampField { mtime, atime, ctime })
    }
}

/// Info-ZIP Unix extra (tag `0x000d`/`0x5855`): atime/mtime plus optional
/// uid/gid and variable trailing data.
#[derive(Debug, Clone, Default)]
pub struct ExtraUnixField {
    /// Access time, Unix epoch seconds.
    pub atime: Option<i64>,
    /// Modification time, Unix epoch seconds.
    pub mtime: Option<i64>,
    /// User id, 16-bit legacy form.
    pub uid: Option<u16>,
    /// Group id, 16-bit legacy form.
    pub gid: Option<u16>,
    /// Any trailing variable-length data (device major/minor, symlink target).
    pub data: Vec<u8>,
}

impl ExtraUnixField {
    fn parser(i: &mut Partial<&[u8]>) -> PResult<ExtraUnixField> {
        if i.eof_offset() == 0 {
            return Ok(ExtraUnixField::default());
        }
        let atime = le_u32.map(|v| v as i64).parse_next(i)?;
        let mtime = le_u32.map(|v| v as i64).parse_next(i)?;
        let uid = cond(i.eof_offset() >= 2, le_u16).parse_next(i)?;
        let gid = cond(i.eof_offset() >= 2, le_u16).parse_next(i)?;
        let data = i.to_vec();
        Ok(ExtraUnixField {
            atime: Some(atime),
            mtime: Some(mtime),
            uid,
            gid,
            data,
        })
    }
}

/// Info-ZIP "new" Unix extra (tag `0x7875`): VLI-encoded uid/gid, replacing
/// the legacy 16-bit field's range limitation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtraNewUnixField {
    /// User id (may exceed 16 bits).
    pub uid: u64,
    /// Group id (may exceed 16 bits).
    pub gid: u64,
}

impl ExtraNewUnixField {
    fn parser(i: &mut Partial<&[u8]>) -> PResult<ExtraNewUnixField> {
        let _version = le_u8.parse_next(i)?;
        let uid = parse_variable_length_integer(i)?;
        let gid = parse_variable_length_integer(i)?;
        Ok(ExtraNewUnixField { uid, gid })
    }
}

/// Parse a small-endian variable-length integer as used by the Info-ZIP
/// "new Unix" extra: a 1-byte length prefix followed by that many
/// little-endian bytes.
fn parse_variable_length_integer(i: &mut Partial<&[u8]>) -> PResult<u64> {
    let len = le_u8.parse_next(i)?;
    let bytes: &[u8] = take(len).parse_next(i)?;
    let mut value: u64 = 0;
    for (idx, &b) in bytes.iter().enumerate().take(8) {
        value |= (b as u64) << (8 * idx);
    }
    Ok(value)
}

/// NTFS extra (tag `0x000a`): a container for one or more sub-attributes.
#[derive(Debug, Clone, Default)]
pub struct ExtraNtfsField {
    /// The parsed sub-attributes.
    pub attrs: Vec<NtfsAttr>,
}

/// One NTFS extra sub-attribute.
#[derive(Debug, Clone)]
pub enum NtfsAttr {
    /// Attribute tag 1: mtime/atime/ctime as NTFS timestamps.
    Attr1(NtfsAttr1),
    /// Any other tag, unparsed.
    Unknown {
        /// The sub-attribute tag.
        tag: u16,
    },
}

/// NTFS timestamps sub-attribute (tag `1`).
#[derive(Debug, Clone, Copy)]
pub struct NtfsAttr1 {
    /// Modification time.
    pub mtime: super::date_time::NtfsTimestamp,
    /// Access time.
    pub atime: super::date_time::NtfsTimestamp,
    /// Creation time.
    pub ctime: super::date_time::NtfsTimestamp,
}

impl ExtraNtfsField {
    fn parser(i: &mut Partial<&[u8]>) -> PResult<ExtraNtfsField> {
        let _reserved = le_u32.parse_next(i)?;
        let mut attrs = Vec::new();
        while i.eof_offset() >= 4 {
            let tag = le_u16.parse_next(i)?;
            let size = le_u16.parse_next(i)?;
            let body: &[u8] = take(size).parse_next(i)?;
            let mut body = Partial::new(body);
            if tag == 1 && body.eof_offset() >= 24 {
                let mtime = le_u64.parse_next(&mut body)?;
                let atime = le_u64.parse_next(&mut body)?;
                let ctime = le_u64.parse_next(&mut body)?;
                attrs.push(NtfsAttr::Attr1(NtfsAttr1 {
                    mtime: super::date_time::NtfsTimestamp { timestamp: mtime },
                    atime: super::date_time::NtfsTimestamp { timestamp: atime },
                    ctime: super::date_time::NtfsTimestamp { timestamp: ctime },
                }));
            } else {
                attrs.push(NtfsAttr::Unknown { tag });
            }
        }
        Ok(ExtraNtfsField { attrs })
    }
}

/// Info-ZIP Unicode Path (`0x7075`) or Comment (`0x6375`) extra: a UTF-8
/// rendering of the name/comment, validated by a CRC32 over the original
/// (non-UTF-8) bytes so it can only be adopted when that CRC matches.
#[derive(Debug, Clone)]
pub struct InfoZipUnicodeField {
    /// Field format version; only `1` is defined.
    pub version: u8,
    /// CRC32 of the original (non-unicode) name/comment bytes.
    pub crc32: u32,
    /// The UTF-8 bytes of the decoded name/comment.
    pub unicode: Vec<u8>,
    /// True for the Comment variant (`0x6375`), false for Path (`0x7075`).
    pub is_comment: bool,
}

impl InfoZipUnicodeField {
    fn parser_path(i: &mut Partial<&[u8]>) -> PResult<InfoZipUnicodeField> {
        Self::parser(false)(i)
    }

    fn parser_comment(i: &mut Partial<&[u8]>) -> PResult<InfoZipUnicodeField> {
        Self::parser(true)(i)
    }

    fn parser(
        is_comment: bool,
    ) -> impl FnMut(&mut Partial<&[u8]>) -> PResult<InfoZipUnicodeField> {
        move |i: &mut Partial<&[u8]>| {
            seq! {InfoZipUnicodeField {
                version: le_u8,
                crc32: le_u32,
                unicode: winnow::combinator::rest.map(|b: &[u8]| b.to_vec()),
                is_comment: winnow::combinator::empty.value(is_comment),
            }}
            .parse_next(i)
        }
    }
}

/// WinZip AES encryption extra (`0x9901`). Encryption itself is out of
/// scope; this is recognized only so the real compression method (stored
/// separately in this extra) can be reported instead of `AEx`.
#[derive(Debug, Clone, Copy)]
pub struct WinZipAesField {
    /// Vendor version, `1` (AE-1) or `2` (AE-2).
    pub vendor_version: u16,
    /// Vendor id, always `b"AE"`.
    pub vendor_id: [u8; 2],
    /// AES key strength: `1`=128-bit, `2`=192-bit, `3`=256-bit.
    pub strength: u8,
    /// The real compression method, stored here since the CDFH's own method
    /// field is overridden to `99` (AEx) when this extra is present.
    pub real_method: u16,
}

impl WinZipAesField {
    fn parser(i: &mut Partial<&[u8]>) -> PResult<WinZipAesField> {
        let vendor_version = le_u16.parse_next(i)?;
        let vendor_id_bytes: &[u8] = take(2usize).parse_next(i)?;
        let mut vendor_id = [0u8; 2];
        vendor_id.copy_from_slice(vendor_id_bytes);
        let strength = le_u8.parse_next(i)?;
        let real_method = le_u16.parse_next(i)?;
        Ok(WinZipAesField {
            vendor_version,
            vendor_id,
            strength,
            real_method,
        })
    }
}

/// Parse every extra field record from a contiguous extra-field blob,
/// skipping (not failing on) any record whose length would run past the end
/// of the blob.
pub fn parse_all(bytes: &[u8], settings: ExtraFieldSettings) -> Vec<ExtraField> {
    let mut out = Vec::new();
    let mut i = Partial::new(bytes);
    let mut parser = ExtraField::mk_parser(settings);
    loop {
        if i.eof_offset() < 4 {
            break;
        }
        match parser(&mut i) {
            Ok(field) => out.push(field),
            Err(ErrMode::Incomplete(_)) => break,
            Err(_) => break,
        }
    }
    out
}

#[allow(dead_code)]
fn unexpected_eof<'i>(i: &mut Partial<&'i [u8]>) -> ErrMode<winnow::error::ContextError> {
    ErrMode::from_error_kind(i, ErrorKind::Eof)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_field_mtime_only() {
        let bytes = [0x01u8, 0x78, 0x56, 0x34, 0x12];
        let mut i = Partial::new(&bytes[..]);
        let field = ExtraTimestampField::parser(&mut i).unwrap();
        assert_eq!(field.mtime, Some(0x1234_5678));
        assert_eq!(field.atime, None);
    }

    #[test]
    fn new_unix_field_parses_uid_gid() {
        let bytes = [1u8, 2, 0xe8, 0x03, 2, 0xe9, 0x03];
        let mut i = Partial::new(&bytes[..]);
        let field = ExtraNewUnixField::parser(&mut i).unwrap();
        assert_eq!(field.uid, 1000);
        assert_eq!(field.gid, 1001);
    }
}
