//! The central-directory discovery and streaming state machine (C9).

use oval::Buffer;
use tracing::trace;
use winnow::Partial;

use super::{transition, FsmResult};
use crate::error::{Error, FormatError};
use crate::limits::{ArchiveProfile, ResourceLimits};
use crate::parse::{
    Archive, DirectoryHeader, EndOfCentralDirectory, EndOfCentralDirectory64Locator,
    EndOfCentralDirectory64Record, EndOfCentralDirectoryRecord, Entry, Located,
};

/// Default buffer size for central-directory streaming reads.
pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;

/// One issue discovered while building the archive, surfaced so the facade
/// crate's audit engine can fold it into its report without re-parsing.
#[derive(Debug, Clone)]
pub struct PreflightNote {
    /// A stable, short machine-readable code (e.g. `ZIP_EOCD_SEARCH_CLAMPED`).
    pub code: &'static str,
    /// Human-readable detail.
    pub message: String,
}

#[derive(Default)]
enum State {
    ReadEocd {
        haystack_size: u64,
    },
    ReadEocd64Locator {
        eocdr: Located<EndOfCentralDirectoryRecord>,
    },
    ReadEocd64 {
        eocdr64_offset: u64,
        eocdr: Located<EndOfCentralDirectoryRecord>,
    },
    ReadCentralDirectory {
        eocd: EndOfCentralDirectory,
        entries: Vec<Entry>,
    },
    #[default]
    Transitioning,
}

/// Drives discovery of the EOCD/ZIP64 records and streaming parse of the
/// central directory. Callers repeatedly call [`ArchiveFsm::wants_read`] to
/// learn where to read from next, [`ArchiveFsm::fill`] to hand over freshly
/// read bytes, and [`ArchiveFsm::process`] to advance.
pub struct ArchiveFsm {
    state: State,
    buffer: Buffer,
    /// Absolute file offset the internal buffer currently starts at.
    read_offset: u64,
    size: u64,
    limits: ResourceLimits,
    profile: ArchiveProfile,
    notes: Vec<PreflightNote>,
}

impl ArchiveFsm {
    /// Start a fresh archive FSM for an input of `size` bytes.
    pub fn new(size: u64, limits: ResourceLimits, profile: ArchiveProfile) -> Self {
        let (search_bytes, clamped) = limits.zip_eocd_search_bytes(profile);
        let mut notes = Vec::new();
        if clamped {
            notes.push(PreflightNote {
                code: "ZIP_EOCD_SEARCH_CLAMPED",
                message: "maxZipEocdSearchBytes was below the EOCD's fixed minimum size (22) and was clamped".into(),
            });
        }
        let haystack_size = size.min(search_bytes);
        ArchiveFsm {
            state: State::ReadEocd { haystack_size },
            buffer: Buffer::with_capacity(DEFAULT_BUFFER_SIZE),
            read_offset: size.saturating_sub(haystack_size),
            size,
            limits,
            profile,
            notes,
        }
    }

    /// The absolute offset (and minimum length) the caller should read from
    /// next, or `None` if the machine needs no more input right now (it is
    /// waiting on `process()` to drain buffered bytes).
    pub fn wants_read(&self) -> Option<u64> {
        match &self.state {
            State::ReadEocd { .. } => Some(self.read_offset + self.buffer.available_data() as u64),
            State::ReadEocd64Locator { .. } => Some(self.read_offset),
            State::ReadEocd64 { eocdr64_offset, .. } => Some(*eocdr64_offset),
            State::ReadCentralDirectory { .. } => {
                Some(self.read_offset + self.buffer.available_data() as u64)
            }
            State::Transitioning => None,
        }
    }

    /// Expose the writable tail of the internal ring buffer for the caller
    /// to read into.
    pub fn space(&mut self) -> &mut [u8] {
        self.buffer.space()
    }

    /// Commit `count` freshly-written bytes (via [`Self::space`]) to the
    /// buffer.
    pub fn fill(&mut self, count: usize) {
        self.buffer.fill(count);
    }

    /// Reposition the internal buffer to start reading at `offset`,
    /// discarding any buffered bytes that no longer apply.
    fn seek(&mut self, offset: u64) {
        self.buffer = Buffer::with_capacity(DEFAULT_BUFFER_SIZE);
        self.read_offset = offset;
    }

    /// Advance the state machine as far as possible with the bytes
    /// currently buffered.
    pub fn process(mut self) -> Result<FsmResult<Self, Archive>, Error> {
        loop {
            let next = transition!(&mut self.state => {
                State::ReadEocd { haystack_size } => self.process_read_eocd(haystack_size)?,
                State::ReadEocd64Locator { eocdr } => self.process_read_eocd64_locator(eocdr)?,
                State::ReadEocd64 { eocdr64_offset, eocdr } => {
                    self.process_read_eocd64(eocdr64_offset, eocdr)?
                }
                State::ReadCentralDirectory { eocd, entries } => {
                    self.process_read_central_directory(eocd, entries)?
                }
                State::Transitioning => unreachable!("transitioning state observed by caller"),
            });
            match next {
                FsmResult::Continue(state) => {
                    self.state = state;
                    if self.wants_read().is_some() && self.buffer.available_data() == 0 {
                        return Ok(FsmResult::Continue(self));
                    }
                }
                FsmResult::Done(archive) => return Ok(FsmResult::Done(archive)),
            }
        }
    }

    fn process_read_eocd(&mut self, haystack_size: u64) -> Result<FsmResult<State, Archive>, Error> {
        if (self.buffer.available_data() as u64) < haystack_size {
            return Ok(FsmResult::Continue(State::ReadEocd { haystack_size }));
        }
        let haystack = self.buffer.data();
        let (offset, record) = EndOfCentralDirectoryRecord::find_in_block(haystack)
            .ok_or(FormatError::DirectoryEndSignatureNotFound)?;
        let eocdr = Located {
            offset: self.read_offset + offset as u64,
            inner: record,
        };
        trace!(offset = eocdr.offset, "found EOCD");
        if eocdr.inner.disk_nbr != 0
            || eocdr.inner.dir_disk_nbr != 0
            || eocdr.inner.dir_records_this_disk != eocdr.inner.directory_records
        {
            return Err(FormatError::MultiDiskUnsupported.into());
        }
        let needs_zip64 = eocdr.inner.directory_records == 0xFFFF
            || eocdr.inner.directory_size == 0xFFFF_FFFF
            || eocdr.inner.directory_offset == 0xFFFF_FFFF;
        if needs_zip64 && eocdr.offset >= 20 {
            let locator_offset = eocdr.offset - 20;
            self.seek(locator_offset);
            Ok(FsmResult::Continue(State::ReadEocd64Locator { eocdr }))
        } else {
            let eocd = EndOfCentralDirectory::new(eocdr, None);
            self.start_central_directory(eocd)
        }
    }

    fn process_read_eocd64_locator(
        &mut self,
        eocdr: Located<EndOfCentralDirectoryRecord>,
    ) -> Result<FsmResult<State, Archive>, Error> {
        if self.buffer.available_data() < EndOfCentralDirectory64Locator::LENGTH {
            return Ok(FsmResult::Continue(State::ReadEocd64Locator { eocdr }));
        }
        let mut input = Partial::new(self.buffer.data());
        let locator = EndOfCentralDirectory64Locator::parser(&mut input)
            .map_err(|_| FormatError::Directory64EndRecordInvalid)?;
        let eocdr64_offset = locator.directory_offset;
        self.seek(eocdr64_offset);
        Ok(FsmResult::Continue(State::ReadEocd64 { eocdr64_offset, eocdr }))
    }

    fn process_read_eocd64(
        &mut self,
        eocdr64_offset: u64,
        eocdr: Located<EndOfCentralDirectoryRecord>,
    ) -> Result<FsmResult<State, Archive>, Error> {
        // The ZIP64 EOCD record has a variable trailing "extensible data
        // sector"; we don't know its length up front, so require a
        // generous minimum and let the parser consume only what it needs.
        const MIN_ZIP64_EOCD: usize = 56;
        if self.buffer.available_data() < MIN_ZIP64_EOCD {
            return Ok(FsmResult::Continue(State::ReadEocd64 { eocdr64_offset, eocdr }));
        }
        let mut input = Partial::new(self.buffer.data());
        let record = EndOfCentralDirectory64Record::parser(&mut input)
            .map_err(|_| FormatError::Directory64EndRecordInvalid)?;
        let dir64 = Located { offset: eocdr64_offset, inner: record };
        let eocd = EndOfCentralDirectory::new(eocdr, Some(dir64));
        self.start_central_directory(eocd)
    }

    fn start_central_directory(
        &mut self,
        eocd: EndOfCentralDirectory,
    ) -> Result<FsmResult<State, Archive>, Error> {
        let cd_bytes_limit = self.limits.zip_central_directory_bytes(self.profile);
        if eocd.directory_size() > cd_bytes_limit {
            return Err(Error::ResourceLimit(crate::error::ResourceLimitError {
                limit_name: "maxZipCentralDirectoryBytes",
                limit: Some(cd_bytes_limit),
                required: Some(eocd.directory_size()),
            }));
        }
        let entries_limit = self.limits.entries(self.profile);
        if eocd.directory_records() > entries_limit {
            return Err(Error::ResourceLimit(crate::error::ResourceLimitError {
                limit_name: "maxEntries",
                limit: Some(entries_limit),
                required: Some(eocd.directory_records()),
            }));
        }
        let comment_limit = self.limits.zip_comment_bytes(self.profile);
        if eocd.comment().0.len() as u64 > comment_limit {
            return Err(Error::ResourceLimit(crate::error::ResourceLimitError {
                limit_name: "maxZipCommentBytes",
                limit: Some(comment_limit),
                required: Some(eocd.comment().0.len() as u64),
            }));
        }
        if eocd.directory_offset() > self.size {
            return Err(FormatError::DirectoryOffsetPointsOutsideFile.into());
        }
        self.seek(eocd.directory_offset());
        Ok(FsmResult::Continue(State::ReadCentralDirectory {
            eocd,
            entries: Vec::with_capacity(eocd.directory_records().min(4096) as usize),
        }))
    }

    fn process_read_central_directory(
        &mut self,
        eocd: EndOfCentralDirectory,
        mut entries: Vec<Entry>,
    ) -> Result<FsmResult<State, Archive>, Error> {
        let entries_limit = self.limits.entries(self.profile);
        loop {
            if entries.len() as u64 >= eocd.directory_records() {
                return self.finish(eocd, entries);
            }
            if self.buffer.available_data() < DirectoryHeader::MIN_LENGTH {
                if self.wants_more_cd_bytes(&eocd, entries.len()) {
                    return Ok(FsmResult::Continue(State::ReadCentralDirectory { eocd, entries }));
                }
                return Err(FormatError::Truncated.into());
            }
            let mut input = Partial::new(self.buffer.data());
            match DirectoryHeader::parser(&mut input) {
                Ok(header) => {
                    let consumed = self.buffer.data().len() - input.len();
                    self.buffer.consume(consumed);
                    self.read_offset += consumed as u64;
                    entries.push(header.into_entry());
                    if entries.len() as u64 > entries_limit {
                        return Err(Error::ResourceLimit(crate::error::ResourceLimitError {
                            limit_name: "maxEntries",
                            limit: Some(entries_limit),
                            required: Some(entries.len() as u64),
                        }));
                    }
                }
                Err(winnow::error::ErrMode::Incomplete(_)) => {
                    if self.wants_more_cd_bytes(&eocd, entries.len()) {
                        return Ok(FsmResult::Continue(State::ReadCentralDirectory { eocd, entries }));
                    }
                    return Err(FormatError::Truncated.into());
                }
                Err(_) => return Err(FormatError::InvalidCentralRecord {
                    expected: DirectoryHeader::MIN_LENGTH as u64,
                    actual: self.buffer.available_data() as u64,
                }
                .into()),
            }
        }
    }

    fn wants_more_cd_bytes(&mut self, eocd: &EndOfCentralDirectory, parsed: usize) -> bool {
        let cd_end = eocd.directory_offset() + eocd.directory_size();
        let have = self.read_offset + self.buffer.available_data() as u64;
        let _ = parsed;
        have < cd_end && have < self.size
    }

    fn finish(
        &mut self,
        eocd: EndOfCentralDirectory,
        entries: Vec<Entry>,
    ) -> Result<FsmResult<State, Archive>, Error> {
        let encoding = detect_archive_encoding(&entries);
        let comment = encoding::decode(&eocd.comment().0, encoding).unwrap_or_default();
        let archive = Archive {
            size: self.size,
            encoding,
            entries,
            comment,
        };
        Ok(FsmResult::Done(archive))
    }

    /// Preflight notes accumulated while building (e.g. the EOCD-search
    /// clamp open question), to be folded into an audit report upstream.
    pub fn notes(&self) -> &[PreflightNote] {
        &self.notes
    }
}

use crate::encoding;

/// Sample up to 4096 bytes total across entry names/comments and run
/// `chardetng` to pick a single archive-wide encoding for any entries whose
/// UTF-8 flag was not set and who had no matching Unicode extra field.
fn detect_archive_encoding(entries: &[Entry]) -> encoding::Encoding {
    let mut detector = chardetng::EncodingDetector::new();
    let mut fed = 0usize;
    for entry in entries {
        if fed >= 4096 {
            break;
        }
        if matches!(entry.name_source, crate::encoding::NameSource::Cp437) {
            let take = entry.raw_name.len().min(4096 - fed);
            detector.feed(&entry.raw_name[..take], false);
            fed += take;
        }
    }
    detector.feed(b"", true);
    let (enc, _) = detector.guess_assess(None, true);
    if enc == encoding_rs::SHIFT_JIS {
        encoding::Encoding::ShiftJis
    } else {
        encoding::Encoding::Cp437
    }
}
