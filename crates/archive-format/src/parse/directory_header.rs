//! Central Directory File Header parsing, producing a fully reconciled
//! [`super::Entry`] (extra fields applied, encoding detected).

use winnow::binary::{le_u16, le_u32};
use winnow::token::{literal, take};
use winnow::{seq, PResult, Partial};

use super::extra_field::{self, ExtraFieldSettings};
use super::mode::{Mode, MsdosMode, UnixMode};
use super::raw::ZipString;
use super::version::{HostSystem, Version};
use super::Method;
use crate::encoding::{self, NameSource};

/// The raw, not-yet-reconciled fields of one Central Directory File Header.
#[derive(Debug, Clone)]
pub struct DirectoryHeader {
    /// "Version made by" host/version.
    pub made_by: Version,
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
    /// CRC32 of the uncompressed data.
    pub crc32: u32,
    /// Compressed size (32-bit; may be the ZIP64 sentinel).
    pub compressed_size: u32,
    /// Uncompressed size (32-bit; may be the ZIP64 sentinel).
    pub uncompressed_size: u32,
    /// Disk number where this entry's local header starts.
    pub disk_nbr_start: u16,
    /// Internal attributes.
    pub internal_attrs: u16,
    /// External attributes (interpretation depends on `made_by.host_system`).
    pub external_attrs: u32,
    /// Local file header offset (32-bit; may be the ZIP64 sentinel).
    pub header_offset: u32,
    /// Raw name bytes.
    pub name: ZipString,
    /// Raw extra field blob.
    pub extra: Vec<u8>,
    /// Raw comment bytes.
    pub comment: ZipString,
}

impl DirectoryHeader {
    /// Fixed signature.
    pub const SIGNATURE: &'static [u8] = b"PK\x01\x02";
    /// Fixed-size portion, not counting name/extra/comment.
    pub const MIN_LENGTH: usize = 46;

    /// Parse the signature and fixed fields, then the three variable blobs.
    pub fn parser(i: &mut Partial<&[u8]>) -> PResult<DirectoryHeader> {
        literal(Self::SIGNATURE).parse_next(i)?;
        seq! {DirectoryHeader {
            made_by: Version::parser,
            reader_version: le_u16,
            flags: le_u16,
            method: le_u16,
            modified_time: le_u16,
            modified_date: le_u16,
            crc32: le_u32,
            compressed_size: le_u32,
            uncompressed_size: le_u32,
            name_len: le_u16,
            extra_len: le_u16,
            comment_len: le_u16,
            disk_nbr_start: le_u16,
            internal_attrs: le_u16,
            external_attrs: le_u32,
            header_offset: le_u32,
            name: take(name_len).map(|b: &[u8]| ZipString(b.to_vec())),
            extra: take(extra_len).map(|b: &[u8]| b.to_vec()),
            comment: take(comment_len).map(|b: &[u8]| ZipString(b.to_vec())),
        }}
        .parse_next(i)
    }

    /// Whether this header's on-disk fields require a ZIP64 extra to supply
    /// true values (any fixed field is the `0xFFFFFFFF`/`0xFFFF` sentinel).
    fn zip64_settings(&self) -> ExtraFieldSettings {
        ExtraFieldSettings {
            uncompressed_size_u32: self.uncompressed_size == 0xFFFF_FFFF,
            compressed_size_u32: self.compressed_size == 0xFFFF_FFFF,
            header_offset_u32: self.header_offset == 0xFFFF_FFFF,
        }
    }

    /// Derive the host-agnostic [`Mode`] from `external_attrs`, dispatching
    /// on the producing host system the way real unzip implementations do:
    /// Unix/OSX store a `struct stat` mode in the upper 16 bits; DOS-family
    /// hosts store FAT attribute bits in the lower byte.
    fn derive_mode(&self) -> Mode {
        match self.made_by.host_system {
            HostSystem::Unix | HostSystem::Osx => {
                UnixMode(self.external_attrs >> 16).into()
            }
            HostSystem::WindowsNtfs | HostSystem::Vfat | HostSystem::MsDos => {
                MsdosMode(self.external_attrs).into()
            }
            _ => {
                if self.name.0.ends_with(b"/") {
                    Mode::DIR
                } else {
                    Mode::REGULAR
                }
            }
        }
    }

    /// Reconcile this header into a fully-populated [`super::Entry`],
    /// applying extra fields and running name/comment encoding detection.
    pub fn into_entry(self) -> super::Entry {
        let is_utf8 = self.flags & 0x0800 != 0;
        let (name, name_source) = if is_utf8 {
            (
                String::from_utf8_lossy(&self.name.0).into_owned(),
                NameSource::Utf8Flag,
            )
        } else {
            let (s, enc) = encoding::detect_utf8(&self.name.0);
            let source = match enc {
                encoding::Encoding::Utf8 => NameSource::Cp437,
                _ => NameSource::Cp437,
            };
            (s, source)
        };
        let comment = if is_utf8 {
            String::from_utf8_lossy(&self.comment.0).into_owned()
        } else {
            encoding::detect_utf8(&self.comment.0).0
        };

        let method = Method::from(self.method);
        let modified = super::date_time::MsdosTimestamp {
            time: self.modified_time,
            date: self.modified_date,
        }
        .to_datetime()
        .unwrap_or_else(super::date_time::zero_datetime);

        let mut entry = super::Entry {
            name,
            name_source,
            raw_name: self.name.0.clone(),
            method,
            comment,
            modified,
            created: None,
            accessed: None,
            header_offset: self.header_offset as u64,
            reader_version: self.reader_version,
            flags: self.flags,
            uid: None,
            gid: None,
            crc32: self.crc32,
            compressed_size: self.compressed_size as u64,
            uncompressed_size: self.uncompressed_size as u64,
            mode: self.derive_mode(),
            made_by: self.made_by,
            external_attributes: self.external_attrs,
            is_zip64: false,
            encrypted: self.flags & 0x0001 != 0,
            extra_fields: Vec::new(),
        };

        let settings = self.zip64_settings();
        for field in extra_field::parse_all(&self.extra, settings) {
            entry.apply_extra_field(&field);
        }

        if entry.name.ends_with('/') {
            entry.mode = entry.mode | Mode::DIR;
        }

        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cdfh(name: &str) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(DirectoryHeader::SIGNATURE);
        v.extend_from_slice(&0x0314u16.to_le_bytes()); // made by: unix, v20
        v.extend_from_slice(&20u16.to_le_bytes());
        v.extend_from_slice(&0x0800u16.to_le_bytes()); // utf8 flag
        v.extend_from_slice(&0u16.to_le_bytes()); // method: store
        v.extend_from_slice(&0u16.to_le_bytes());
        v.extend_from_slice(&0u16.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes()); // crc32
        v.extend_from_slice(&5u32.to_le_bytes()); // compressed
        v.extend_from_slice(&5u32.to_le_bytes()); // uncompressed
        v.extend_from_slice(&(name.len() as u16).to_le_bytes());
        v.extend_from_slice(&0u16.to_le_bytes()); // extra len
        v.extend_from_slice(&0u16.to_le_bytes()); // comment len
        v.extend_from_slice(&0u16.to_le_bytes()); // disk start
        v.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        v.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        v.extend_from_slice(&0u32.to_le_bytes()); // header offset
        v.extend_from_slice(name.as_bytes());
        v
    }

    #[test]
    fn parses_and_reconciles_entry() {
        let bytes = sample_cdfh("hello.txt");
        let mut p = Partial::new(&bytes[..]);
        let header = DirectoryHeader::parser(&mut p).unwrap();
        let entry = header.into_entry();
        assert_eq!(entry.name, "hello.txt");
        assert_eq!(entry.method, Method::Store);
        assert_eq!(entry.name_source, NameSource::Utf8Flag);
    }
}
