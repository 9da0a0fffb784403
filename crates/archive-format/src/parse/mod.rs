//! Wire-format parsers for ZIP structures.
//!
//! Every parser here is a [`winnow`] parser over `Partial<&[u8]>`, so callers
//! driving an [`crate::fsm::ArchiveFsm`]/[`crate::fsm::entry::EntryFsm`] can
//! feed bytes incrementally without ever needing a fully-buffered archive.

mod archive;
mod date_time;
mod eocd;
mod extra_field;
mod local_header;
mod mode;
mod raw;
mod version;

pub use archive::{Archive, Entry, EntryKind, Method};
pub use date_time::{zero_datetime, MsdosTimestamp, NtfsTimestamp};
pub use eocd::{
    EndOfCentralDirectory, EndOfCentralDirectory64Locator, EndOfCentralDirectory64Record,
    EndOfCentralDirectoryRecord, Located,
};
pub use extra_field::{
    ExtraField, ExtraFieldRecord, ExtraFieldSettings, ExtraNewUnixField, ExtraNtfsField,
    ExtraTimestampField, ExtraUnixField, ExtraZip64Field, InfoZipUnicodeField, NtfsAttr,
    NtfsAttr1, WinZipAesField,
};
pub use local_header::{DataDescriptorRecord, LocalFileHeader, LzmaProperties, MethodSpecific};
pub use mode::{Mode, MsdosMode, UnixMode};
pub use raw::{ZipBytes, ZipString};
pub use version::{HostSystem, Version};

/// Central-directory-file-header parsing (C9), kept in its own module since
/// it threads extra-field application and encoding detection together.
pub(crate) mod directory_header;
pub use directory_header::DirectoryHeader;
