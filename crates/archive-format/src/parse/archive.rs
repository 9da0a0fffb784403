//! The parsed archive: a flat list of [`Entry`] plus archive-level metadata.

use chrono::{DateTime, Utc};
use winnow::binary::le_u16;
use winnow::{PResult, Partial};

use super::mode::Mode;
use super::raw::ZipString;

/// A fully parsed ZIP archive: central-directory entries plus the overall
/// size and text encoding used to decode names.
#[derive(Debug, Clone)]
pub struct Archive {
    /// Total size of the archive in bytes.
    pub size: u64,
    /// Text encoding used for entry names/comments.
    pub encoding: crate::encoding::Encoding,
    /// All entries, in central-directory order.
    pub entries: Vec<Entry>,
    /// The archive-level comment.
    pub comment: String,
}

impl Archive {
    /// Find an entry by its decoded name, if present.
    pub fn by_name(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// One parsed ZIP central-directory entry.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Decoded entry name.
    pub name: String,
    /// Where the decoded name came from.
    pub name_source: crate::encoding::NameSource,
    /// Raw, undecoded name bytes (as stored on disk).
    pub raw_name: Vec<u8>,
    /// Compression method.
    pub method: Method,
    /// Entry comment, if any.
    pub comment: String,
    /// Last modification time.
    pub modified: DateTime<Utc>,
    /// Creation time, if known (NTFS extra only).
    pub created: Option<DateTime<Utc>>,
    /// Last access time, if known.
    pub accessed: Option<DateTime<Utc>>,
    /// Offset of the local file header.
    pub header_offset: u64,
    /// Version needed to extract.
    pub reader_version: u16,
    /// General purpose bit flags.
    pub flags: u16,
    /// Unix uid, if known.
    pub uid: Option<u32>,
    /// Unix gid, if known.
    pub gid: Option<u32>,
    /// CRC32 of the uncompressed data.
    pub crc32: u32,
    /// Compressed size in bytes.
    pub compressed_size: u64,
    /// Uncompressed size in bytes.
    pub uncompressed_size: u64,
    /// Host-agnostic file mode.
    pub mode: Mode,
    /// "Version made by" host/version pair.
    pub made_by: super::version::Version,
    /// Raw external attributes field from the CDFH.
    pub external_attributes: u32,
    /// True if this entry carried a ZIP64 extra field.
    pub is_zip64: bool,
    /// True if recognized as encrypted (traditional PKWARE or WinZip AES).
    pub encrypted: bool,
    /// Parsed extra field records, by numeric tag.
    pub extra_fields: Vec<super::extra_field::ExtraField>,
}

impl Entry {
    /// Classify this entry as a directory, symlink, or regular file.
    pub fn kind(&self) -> EntryKind {
        if self.mode.is_symlink() {
            EntryKind::Symlink
        } else if self.mode.is_dir() || self.name.ends_with('/') {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }

    /// A zip-slip-safe rendering of [`Entry::name`]: rejects traversal
    /// attempts and strips leading path roots rather than trusting the raw
    /// central-directory name for filesystem writes.
    ///
    /// This is a convenience distinct from the audit engine's
    /// `ZIP_PATH_TRAVERSAL` issue: the audit engine *reports* unsafe names,
    /// this method *produces* a safe one (or `None` if it cannot).
    pub fn sanitized_name(&self) -> Option<String> {
        let name = self.name.replace('\\', "/");
        if name.split('/').any(|segment| segment == "..") {
            return None;
        }
        let name = name.trim_start_matches('/');
        if name.is_empty() {
            return None;
        }
        // Reject drive letters and other Windows-root forms even on Unix,
        // since the archive may be extracted on either platform later.
        if name.len() >= 2 && name.as_bytes()[1] == b':' {
            return None;
        }
        Some(name.to_string())
    }

    /// Apply a decoded [`super::extra_field::ExtraField`] to this entry,
    /// reconciling ZIP64 sentinel fields and adopting timestamp/unix/ntfs
    /// overrides.
    pub fn apply_extra_field(&mut self, field: &super::extra_field::ExtraField) {
        use super::extra_field::ExtraField as F;
        match field {
            F::Zip64(z) => {
                if let Some(v) = z.uncompressed_size {
                    self.uncompressed_size = v;
                }
                if let Some(v) = z.compressed_size {
                    self.compressed_size = v;
                }
                if let Some(v) = z.header_offset {
                    self.header_offset = v;
                }
                self.is_zip64 = true;
            }
            F::Timestamp(t) => {
                if let Some(mtime) = t.mtime {
                    if let Some(dt) = DateTime::from_timestamp(mtime, 0) {
                        self.modified = dt;
                    }
                }
                if let Some(atime) = t.atime {
                    self.accessed = DateTime::from_timestamp(atime, 0);
                }
                if let Some(ctime) = t.ctime {
                    self.created = DateTime::from_timestamp(ctime, 0);
                }
            }
            F::Unix(u) => {
                if let Some(mtime) = u.mtime {
                    if let Some(dt) = DateTime::from_timestamp(mtime, 0) {
                        self.modified = dt;
                    }
                }
                if let Some(uid) = u.uid {
                    self.uid = Some(uid as u32);
                }
                if let Some(gid) = u.gid {
                    self.gid = Some(gid as u32);
                }
            }
            F::NewUnix(u) => {
                self.uid = Some(u.uid as u32);
                self.gid = Some(u.gid as u32);
            }
            F::Ntfs(n) => {
                for attr in &n.attrs {
                    if let super::extra_field::NtfsAttr::Attr1(a) = attr {
                        if let Some(dt) = a.mtime.to_datetime() {
                            self.modified = dt;
                        }
                        self.accessed = a.atime.to_datetime();
                        self.created = a.ctime.to_datetime();
                    }
                }
            }
            F::InfoZipUnicode(u) if !u.is_comment => {
                let crc = crc32fast::hash(&self.raw_name);
                if crc == u.crc32 {
                    if let Ok(s) = String::from_utf8(u.unicode.clone()) {
                        self.name = s;
                        self.name_source = crate::encoding::NameSource::UnicodeExtra;
                    }
                }
            }
            F::InfoZipUnicode(u) => {
                if let Ok(s) = String::from_utf8(u.unicode.clone()) {
                    self.comment = s;
                }
            }
            F::WinZipAes(a) => {
                self.method = Method::from(a.real_method);
                self.encrypted = true;
            }
            F::Unknown { .. } => {}
        }
        self.extra_fields.push(field.clone());
    }
}

/// Coarse entry classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// A symbolic link; the link target is the entry's (decompressed) body.
    Symlink,
}

/// The closed set of ZIP compression method ids this crate recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// No compression.
    Store,
    /// DEFLATE.
    Deflate,
    /// Enhanced deflate (larger window, more match lengths).
    Deflate64,
    /// Bzip2.
    Bzip2,
    /// LZMA (the ZIP-specific framing, not XZ's LZMA2).
    Lzma,
    /// Zstandard.
    Zstd,
    /// MP3 (recognized, never implemented — audio codec, not general data).
    Mp3,
    /// XZ.
    Xz,
    /// JPEG (recognized, never implemented).
    Jpeg,
    /// WavPack (recognized, never implemented).
    WavPack,
    /// PPMd (recognized, never implemented).
    Ppmd,
    /// AEx (WinZip AES); the real method is recorded in the `0x9901` extra.
    Aex,
    /// Any method id not in the above closed set.
    Unrecognized(u16),
}

impl Method {
    /// Parse a little-endian `u16` method id.
    pub fn parser(i: &mut Partial<&[u8]>) -> PResult<Method> {
        le_u16.map(Method::from).parse_next(i)
    }
}

impl From<u16> for Method {
    fn from(v: u16) -> Self {
        match v {
            0 => Method::Store,
            8 => Method::Deflate,
            9 => Method::Deflate64,
            12 => Method::Bzip2,
            14 => Method::Lzma,
            93 => Method::Zstd,
            94 => Method::Mp3,
            95 => Method::Xz,
            96 => Method::Jpeg,
            97 => Method::WavPack,
            98 => Method::Ppmd,
            99 => Method::Aex,
            other => Method::Unrecognized(other),
        }
    }
}

impl From<Method> for u16 {
    fn from(m: Method) -> u16 {
        match m {
            Method::Store => 0,
            Method::Deflate => 8,
            Method::Deflate64 => 9,
            Method::Bzip2 => 12,
            Method::Lzma => 14,
            Method::Zstd => 93,
            Method::Mp3 => 94,
            Method::Xz => 95,
            Method::Jpeg => 96,
            Method::WavPack => 97,
            Method::Ppmd => 98,
            Method::Aex => 99,
            Method::Unrecognized(v) => v,
        }
    }
}

/// Placeholder used while name-decoding bytes prior to having their final
/// source known; avoids `Entry` needing an `Option<NameSource>`.
pub(crate) fn _unused(_: ZipString) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_roundtrips() {
        for m in [Method::Store, Method::Deflate, Method::Bzip2, Method::Xz, Method::Zstd] {
            let raw: u16 = m.into();
            assert_eq!(Method::from(raw), m);
        }
    }

    #[test]
    fn sanitized_name_rejects_traversal() {
        let mut e = make_entry("../evil.txt");
        assert_eq!(e.sanitized_name(), None);
        e.name = "ok/dir/file.txt".to_string();
        assert_eq!(e.sanitized_name().as_deref(), Some("ok/dir/file.txt"));
    }

    fn make_entry(name: &str) -> Entry {
        Entry {
            name: name.to_string(),
            name_source: crate::encoding::NameSource::Utf8Flag,
            raw_name: name.as_bytes().to_vec(),
            method: Method::Store,
            comment: String::new(),
            modified: super::super::date_time::zero_datetime(),
            created: None,
            accessed: None,
            header_offset: 0,
            reader_version: 20,
            flags: 0,
            uid: None,
            gid: None,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            mode: Mode::REGULAR,
            made_by: super::super::version::Version { host_system: super::super::version::HostSystem::Unix, version: 20 },
            external_attributes: 0,
            is_zip64: false,
            encrypted: false,
            extra_fields: Vec::new(),
        }
    }
}
