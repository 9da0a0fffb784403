//! The top-level archive facade (C12): format detection plus a uniform
//! entry-iteration API over ZIP (via [`archive_io::BlockCache`] + the
//! sans-I/O ZIP state machines) and TAR (bare or wrapped in a compression
//! codec), grounded on `rc-zip-sync`'s `ReadZip`/`SyncArchive`/`SyncEntry`
//! pattern (`examples/bearcove-rc-zip/rc-zip-sync/src/read_zip.rs`).
//!
//! ZIP central-directory access is genuinely random-access and benefits
//! from [`BlockCache`] and HTTP range reads. TAR has no directory to seek
//! to — reading it (bare or through a compression wrapper) is inherently
//! sequential, so this facade materializes TAR/single-file inputs fully
//! into memory (bounded by [`ResourceLimits::max_input_bytes`] /
//! `max_total_uncompressed_bytes`) rather than threading `BlockCache`
//! through a second, incompatible access pattern.

use std::io::Read;

use archive_format::fsm::archive::{ArchiveFsm, PreflightNote};
use archive_format::fsm::entry::EntryFsm;
use archive_format::fsm::FsmResult;
use archive_format::parse::{Entry as ZipEntry, EntryKind as ZipEntryKind};
use archive_format::tar::{TarEntry, TarEntryType, TarReader};
use archive_format::{ArchiveProfile, ResourceLimits};
use archive_io::random_access::CancelToken;
use archive_io::{BlockCache, RandomAccess};

use crate::codec::{self, WrapperDecoder};
use crate::detect::{self, ArchiveFormat, DetectHint};
use crate::error::Error;

/// What kind of filesystem object an [`ArchiveEntry`] represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEntryKind {
    /// A regular file with content.
    File,
    /// A directory (no content).
    Directory,
    /// A symbolic link, pointing at `target`.
    Symlink(String),
    /// A hard link, pointing at `target` (TAR only; ZIP has no hard links).
    HardLink(String),
    /// A device node, FIFO, or other non-regular TAR entry type.
    Other,
}

/// One entry's metadata, uniform across ZIP and TAR backings (spec §3).
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Entry name/path as stored (not yet sanitized for filesystem writes).
    pub name: String,
    /// Entry classification.
    pub kind: ArchiveEntryKind,
    /// Uncompressed content size in bytes.
    pub size: u64,
    /// Unix permission bits, when known.
    pub mode: Option<u32>,
}

/// A fully-read archive: entry metadata plus each entry's decoded content,
/// ready for the audit and normalize engines to walk.
pub struct OpenArchive {
    /// The format detected or forced when opening.
    pub format: ArchiveFormat,
    /// The archive-level comment (ZIP only; empty for TAR/single-file).
    pub comment: String,
    /// Entries in on-disk order (ZIP: central-directory order; TAR: stream order).
    pub entries: Vec<ArchiveEntry>,
    /// Decoded content for each entry in `entries`, by the same index.
    /// Empty for directories/symlinks/hard links.
    pub contents: Vec<Vec<u8>>,
    /// Informational notes surfaced while opening (e.g. `ZIP_EOCD_SEARCH_CLAMPED`).
    pub notes: Vec<PreflightNote>,
}

impl OpenArchive {
    /// Look up an entry's content by name.
    pub fn content_of(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .position(|e| e.name == name)
            .map(|i| self.contents[i].as_slice())
    }
}

/// Open a ZIP archive from any [`RandomAccess`] source (a file, an HTTP
/// range source, or an in-memory buffer), driving [`ArchiveFsm`] then
/// [`EntryFsm`] for every entry.
pub fn open_zip<S: RandomAccess>(
    source: S,
    limits: ResourceLimits,
    profile: ArchiveProfile,
) -> Result<OpenArchive, Error> {
    let cancel = CancelToken::new();
    let cache = BlockCache::new(source);
    let size = cache.size()?;

    let mut fsm = ArchiveFsm::new(size, limits, profile);
    let notes: Vec<PreflightNote> = fsm.notes().to_vec();
    let archive = loop {
        if let Some(offset) = fsm.wants_read() {
            let want = fsm.space().len() as u64;
            let data = cache.read(offset, want, &cancel)?;
            if data.is_empty() {
                return Err(Error::new("ZIP_TRUNCATED", "unexpected end of input while reading archive structure"));
            }
            let n = data.len().min(fsm.space().len());
            fsm.space()[..n].copy_from_slice(&data[..n]);
            fsm.fill(n);
        }
        match fsm.process()? {
            FsmResult::Continue(next) => fsm = next,
            FsmResult::Done(archive) => break archive,
        }
    };

    let max_entry_bytes = limits.uncompressed_entry_bytes(profile);
    let max_total_bytes = limits.total_uncompressed_bytes(profile);
    let mut total_bytes = 0u64;
    let mut entries = Vec::with_capacity(archive.entries.len());
    let mut contents = Vec::with_capacity(archive.entries.len());

    for entry in &archive.entries {
        let kind = match entry.kind() {
            ZipEntryKind::Directory => ArchiveEntryKind::Directory,
            ZipEntryKind::File => ArchiveEntryKind::File,
            ZipEntryKind::Symlink => ArchiveEntryKind::Symlink(String::new()),
        };
        let data = if matches!(entry.kind(), ZipEntryKind::Directory) {
            Vec::new()
        } else {
            read_zip_entry(&cache, entry, max_entry_bytes, &cancel)?
        };
        total_bytes += data.len() as u64;
        if total_bytes > max_total_bytes {
            return Err(Error::new(
                "COMPRESSION_RESOURCE_LIMIT",
                "maxTotalUncompressedBytes exceeded while reading entries",
            ));
        }
        let kind = match (kind, entry.kind()) {
            (ArchiveEntryKind::Symlink(_), ZipEntryKind::Symlink) => {
                ArchiveEntryKind::Symlink(String::from_utf8_lossy(&data).into_owned())
            }
            (k, _) => k,
        };
        entries.push(ArchiveEntry {
            name: entry.name.clone(),
            kind,
            size: entry.uncompressed_size,
            mode: Some(entry.mode.permissions()),
        });
        contents.push(data);
    }

    Ok(OpenArchive { format: ArchiveFormat::Zip, comment: archive.comment, entries, contents, notes })
}

fn read_zip_entry<S: RandomAccess>(
    cache: &BlockCache<S>,
    entry: &ZipEntry,
    max_uncompressed_entry_bytes: u64,
    cancel: &CancelToken,
) -> Result<Vec<u8>, Error> {
    let mut fsm = EntryFsm::new(entry.clone(), max_uncompressed_entry_bytes);
    let mut out_buf = vec![0u8; 64 * 1024];
    let mut result = Vec::new();
    let mut offset = entry.header_offset;

    loop {
        if fsm.wants_read() {
            let want = fsm.space().len() as u64;
            let data = cache.read(offset, want, cancel)?;
            let n = data.len();
            fsm.space()[..n].copy_from_slice(&data);
            fsm.fill(n);
            offset += n as u64;
        }
        match fsm.process(&mut out_buf)? {
            FsmResult::Continue((next, outcome)) => {
                result.extend_from_slice(&out_buf[..outcome.bytes_written]);
                fsm = next;
            }
            FsmResult::Done(()) => return Ok(result),
        }
    }
}

/// Open a TAR, single-file-compressed, or compressed-TAR input, reading
/// `read` fully. `hint` disambiguates brotli (which carries no magic) and
/// supplies the filename used to derive a single-file entry's logical name.
pub fn open_tar_or_wrapped(
    mut read: impl Read,
    limits: ResourceLimits,
    profile: ArchiveProfile,
    hint: DetectHint,
) -> Result<OpenArchive, Error> {
    let max_input_bytes = limits.max_input_bytes.unwrap_or(u64::MAX);
    let mut raw = Vec::new();
    let read_len = read
        .by_ref()
        .take(max_input_bytes + 1)
        .read_to_end(&mut raw)
        .map_err(Error::from)?;
    if read_len as u64 > max_input_bytes {
        return Err(Error::new("COMPRESSION_RESOURCE_LIMIT", "maxInputBytes exceeded while reading input"));
    }

    let peek_len = raw.len().min(512);
    let report = detect::detect(&raw[..peek_len], None, &hint)?;
    let format = report.format;

    let decoded = match format.wrapper() {
        None => raw,
        Some(wrapper) => decode_wrapper_fully(wrapper, &raw, limits.total_uncompressed_bytes(profile))?,
    };

    if format.is_tar_container() {
        open_tar_bytes(&decoded, format, limits, profile)
    } else {
        let name = detect::single_file_entry_name(format, hint.filename.as_deref());
        let size = decoded.len() as u64;
        Ok(OpenArchive {
            format,
            comment: String::new(),
            entries: vec![ArchiveEntry { name, kind: ArchiveEntryKind::File, size, mode: None }],
            contents: vec![decoded],
            notes: Vec::new(),
        })
    }
}

fn decode_wrapper_fully(
    wrapper: crate::detect::CompressionWrapper,
    raw: &[u8],
    max_output_bytes: u64,
) -> Result<Vec<u8>, Error> {
    let mut decoder = codec::for_wrapper(wrapper)?;
    let mut out = Vec::new();
    let mut chunk = vec![0u8; 256 * 1024];
    let mut cursor = 0usize;
    loop {
        let eof = cursor >= raw.len();
        let outcome = decoder.decompress(&raw[cursor..], &mut chunk, eof)?;
        cursor += outcome.bytes_read;
        out.extend_from_slice(&chunk[..outcome.bytes_written]);
        if out.len() as u64 > max_output_bytes {
            return Err(Error::new(
                "COMPRESSION_RESOURCE_LIMIT",
                "maxTotalUncompressedBytes exceeded while decompressing wrapper",
            ));
        }
        if outcome.finished {
            return Ok(out);
        }
        if eof && outcome.bytes_written == 0 && outcome.bytes_read == 0 {
            return Err(Error::new("COMPRESSION_DECODE_ERROR", "wrapper stream ended without a finished trailer"));
        }
    }
}

fn open_tar_bytes(
    data: &[u8],
    format: ArchiveFormat,
    limits: ResourceLimits,
    profile: ArchiveProfile,
) -> Result<OpenArchive, Error> {
    let max_entry_bytes = limits.uncompressed_entry_bytes(profile);
    let max_total_bytes = limits.total_uncompressed_bytes(profile);
    let entries_limit = limits.entries(profile);
    let mut total_bytes = 0u64;

    let mut tar = TarReader::new(data);
    let mut entries = Vec::new();
    let mut contents = Vec::new();

    while let Some((entry, mut body)) = tar.next_entry()? {
        if entries.len() as u64 >= entries_limit {
            return Err(Error::new("COMPRESSION_RESOURCE_LIMIT", "maxEntries exceeded while reading TAR entries"));
        }
        if entry.size > max_entry_bytes {
            return Err(Error::new(
                "COMPRESSION_RESOURCE_LIMIT",
                "maxUncompressedEntryBytes exceeded by a TAR entry",
            ));
        }
        let kind = tar_entry_kind(&entry);
        let mut data = Vec::new();
        if matches!(kind, ArchiveEntryKind::File) {
            body.read_to_end(&mut data).map_err(Error::from)?;
        }
        total_bytes += data.len() as u64;
        if total_bytes > max_total_bytes {
            return Err(Error::new(
                "COMPRESSION_RESOURCE_LIMIT",
                "maxTotalUncompressedBytes exceeded while reading TAR entries",
            ));
        }
        entries.push(ArchiveEntry { name: entry.name.clone(), kind, size: entry.size, mode: Some(entry.mode) });
        contents.push(data);
    }

    Ok(OpenArchive { format, comment: String::new(), entries, contents, notes: Vec::new() })
}

fn tar_entry_kind(entry: &TarEntry) -> ArchiveEntryKind {
    match entry.entry_type {
        TarEntryType::Regular => ArchiveEntryKind::File,
        TarEntryType::Directory => ArchiveEntryKind::Directory,
        TarEntryType::Symlink => ArchiveEntryKind::Symlink(entry.link_name.clone().unwrap_or_default()),
        TarEntryType::HardLink => ArchiveEntryKind::HardLink(entry.link_name.clone().unwrap_or_default()),
        TarEntryType::CharDevice | TarEntryType::BlockDevice | TarEntryType::Fifo | TarEntryType::Sparse
        | TarEntryType::Other(_) => ArchiveEntryKind::Other,
    }
}
