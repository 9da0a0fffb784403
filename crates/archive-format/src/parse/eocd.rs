//! End Of Central Directory discovery, including the ZIP64 promotion path.

use winnow::binary::{le_u16, le_u32, le_u64};
use winnow::token::{literal, take};
use winnow::{seq, PResult, Partial};

use super::raw::ZipString;

/// The classic (32-bit) End Of Central Directory record.
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectoryRecord {
    /// This disk's number.
    pub disk_nbr: u16,
    /// Disk where the central directory starts.
    pub dir_disk_nbr: u16,
    /// Entry count on this disk.
    pub dir_records_this_disk: u16,
    /// Entry count across all disks.
    pub directory_records: u16,
    /// Size of the central directory, in bytes.
    pub directory_size: u32,
    /// Offset of the central directory from the start of the archive.
    pub directory_offset: u32,
    /// The archive comment.
    pub comment: ZipString,
}

impl EndOfCentralDirectoryRecord {
    /// Fixed signature preceding the record.
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    /// Minimum length: fixed fields with a zero-length comment.
    pub const MIN_LENGTH: usize = 22;

    /// Parse the signature and fixed fields, then the variable-length
    /// comment (whose length is itself a fixed field).
    pub fn parser(i: &mut Partial<&[u8]>) -> PResult<EndOfCentralDirectoryRecord> {
        literal(Self::SIGNATURE).parse_next(i)?;
        seq! {EndOfCentralDirectoryRecord {
            disk_nbr: le_u16,
            dir_disk_nbr: le_u16,
            dir_records_this_disk: le_u16,
            directory_records: le_u16,
            directory_size: le_u32,
            directory_offset: le_u32,
            comment: le_u16.flat_map(ZipString::parser),
        }}
        .parse_next(i)
    }

    /// Scan `haystack` (a tail slice of the archive) backward for the last
    /// occurrence of the EOCD signature whose declared comment length would
    /// terminate exactly at the end of `haystack`.
    pub fn find_in_block(haystack: &[u8]) -> Option<(usize, EndOfCentralDirectoryRecord)> {
        if haystack.len() < Self::MIN_LENGTH {
            return None;
        }
        let last_start = haystack.len() - Self::MIN_LENGTH;
        for start in (0..=last_start).rev() {
            if &haystack[start..start + 4] != Self::SIGNATURE {
                continue;
            }
            let mut p = Partial::new(&haystack[start..]);
            if let Ok(rec) = Self::parser(&mut p) {
                let consumed = haystack[start..].len() - p.len();
                if start + consumed == haystack.len() {
                    return Some((start, rec));
                }
            }
        }
        None
    }
}

/// The ZIP64 End Of Central Directory locator, pointing at the ZIP64 record.
#[derive(Debug, Clone, Copy)]
pub struct EndOfCentralDirectory64Locator {
    /// Disk that holds the ZIP64 EOCD record.
    pub dir_disk_number: u32,
    /// Absolute offset of the ZIP64 EOCD record.
    pub directory_offset: u64,
    /// Total number of disks.
    pub total_disks: u32,
}

impl EndOfCentralDirectory64Locator {
    /// Fixed signature.
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    /// Fixed on-disk length.
    pub const LENGTH: usize = 20;

    /// Parse the locator.
    pub fn parser(i: &mut Partial<&[u8]>) -> PResult<EndOfCentralDirectory64Locator> {
        literal(Self::SIGNATURE).parse_next(i)?;
        seq! {EndOfCentralDirectory64Locator {
            dir_disk_number: le_u32,
            directory_offset: le_u64,
            total_disks: le_u32,
        }}
        .parse_next(i)
    }
}

/// The ZIP64 End Of Central Directory record.
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory64Record {
    /// Version that created this record.
    pub version_made_by: u16,
    /// Version needed to extract.
    pub version_needed: u16,
    /// This disk's number.
    pub disk_nbr: u32,
    /// Disk where the central directory starts.
    pub dir_disk_nbr: u32,
    /// Entry count on this disk.
    pub dir_records_this_disk: u64,
    /// Entry count across all disks.
    pub directory_records: u64,
    /// Size of the central directory, in bytes.
    pub directory_size: u64,
    /// Offset of the central directory from the start of the archive.
    pub directory_offset: u64,
}

impl EndOfCentralDirectory64Record {
    /// Fixed signature.
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";

    /// Parse the fixed-size fields, ignoring any trailing "zip64 extensible
    /// data sector" bytes (their length is declared but nothing in this
    /// core relies on them).
    pub fn parser(i: &mut Partial<&[u8]>) -> PResult<EndOfCentralDirectory64Record> {
        literal(Self::SIGNATURE).parse_next(i)?;
        let record_size = le_u64.parse_next(i)?;
        let version_made_by = le_u16.parse_next(i)?;
        let version_needed = le_u16.parse_next(i)?;
        let disk_nbr = le_u32.parse_next(i)?;
        let dir_disk_nbr = le_u32.parse_next(i)?;
        let dir_records_this_disk = le_u64.parse_next(i)?;
        let directory_records = le_u64.parse_next(i)?;
        let directory_size = le_u64.parse_next(i)?;
        let directory_offset = le_u64.parse_next(i)?;
        // record_size counts everything after itself; the fixed fields above
        // consume exactly 44 bytes of that, so skip any remainder.
        let consumed_after_size: u64 = 44;
        if record_size > consumed_after_size {
            let _: &[u8] = take(record_size - consumed_after_size).parse_next(i)?;
        }
        Ok(EndOfCentralDirectory64Record {
            version_made_by,
            version_needed,
            disk_nbr,
            dir_disk_nbr,
            dir_records_this_disk,
            directory_records,
            directory_size,
            directory_offset,
        })
    }
}

/// A value together with the absolute offset in the archive where it was
/// found — used so callers can detect prepended-padding (self-extracting
/// stubs) by comparing a record's *claimed* offset to where it actually sat.
#[derive(Debug, Clone, Copy)]
pub struct Located<T> {
    /// Absolute byte offset where `inner` was found.
    pub offset: u64,
    /// The parsed value.
    pub inner: T,
}

/// The fully reconciled end-of-central-directory information: the classic
/// record, an optional ZIP64 record, and a `global_offset` correction for
/// archives with bytes prepended before the true ZIP data (e.g. self-
/// extracting installers).
///
/// Some self-extracting archives (and tools like `mojosetup`) prepend an
/// arbitrary stub before the real ZIP bytes. The EOCD's own `directory_offset`
/// is relative to *where the producer thought byte 0 was* — the true ZIP
/// start — not to the file's actual byte 0. We detect this by comparing
/// where the EOCD was actually found against where it claims the central
/// directory should end (`directory_offset + directory_size`): the
/// difference is `global_offset`, added to every subsequent absolute offset
/// we compute (central directory, local headers).
///
/// ```text
/// [ stub bytes ....... ][ PK\x03\x04 ... ][ PK\x01\x02 ... ][ PK\x05\x06 ]
/// ^ byte 0                                ^ claimed cd_offset
/// |<----------------- global_offset ----->|
/// ```
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory {
    /// The classic EOCD record, located.
    pub dir: Located<EndOfCentralDirectoryRecord>,
    /// The ZIP64 EOCD record, if a locator was found.
    pub dir64: Option<Located<EndOfCentralDirectory64Record>>,
    /// Correction applied to turn claimed offsets into real file offsets.
    pub global_offset: i64,
}

impl EndOfCentralDirectory {
    /// Reconcile a located classic EOCD with an optional located ZIP64
    /// record, computing `global_offset` from whichever record is
    /// authoritative.
    pub fn new(
        dir: Located<EndOfCentralDirectoryRecord>,
        dir64: Option<Located<EndOfCentralDirectory64Record>>,
    ) -> Self {
        let (claimed_offset, claimed_size) = match &dir64 {
            Some(d64) => (d64.inner.directory_offset, d64.inner.directory_size),
            None => (
                dir.inner.directory_offset as u64,
                dir.inner.directory_size as u64,
            ),
        };
        let eocd_offset = dir.offset;
        let expected_eocd_offset = claimed_offset + claimed_size;
        let global_offset = eocd_offset as i64 - expected_eocd_offset as i64;
        EndOfCentralDirectory { dir, dir64, global_offset }
    }

    /// The real, corrected offset of the central directory's first byte.
    pub fn directory_offset(&self) -> u64 {
        let claimed = match &self.dir64 {
            Some(d64) => d64.inner.directory_offset,
            None => self.dir.inner.directory_offset as u64,
        };
        (claimed as i64 + self.global_offset) as u64
    }

    /// The central directory's declared size in bytes.
    pub fn directory_size(&self) -> u64 {
        match &self.dir64 {
            Some(d64) => d64.inner.directory_size,
            None => self.dir.inner.directory_size as u64,
        }
    }

    /// The total entry count across all disks.
    pub fn directory_records(&self) -> u64 {
        match &self.dir64 {
            Some(d64) => d64.inner.directory_records,
            None => self.dir.inner.directory_records as u64,
        }
    }

    /// The archive comment, from the classic EOCD (ZIP64 has none).
    pub fn comment(&self) -> &ZipString {
        &self.dir.inner.comment
    }

    /// True if any field in the classic EOCD carries a ZIP64 sentinel value,
    /// meaning a ZIP64 locator/record is required.
    pub fn needs_zip64(&self) -> bool {
        let d = &self.dir.inner;
        d.directory_records == 0xFFFF
            || d.directory_size == 0xFFFF_FFFF
            || d.directory_offset == 0xFFFF_FFFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_eocd(comment: &[u8]) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(EndOfCentralDirectoryRecord::SIGNATURE);
        v.extend_from_slice(&0u16.to_le_bytes()); // disk_nbr
        v.extend_from_slice(&0u16.to_le_bytes()); // dir_disk_nbr
        v.extend_from_slice(&1u16.to_le_bytes()); // dir_records_this_disk
        v.extend_from_slice(&1u16.to_le_bytes()); // directory_records
        v.extend_from_slice(&100u32.to_le_bytes()); // directory_size
        v.extend_from_slice(&0u32.to_le_bytes()); // directory_offset
        v.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        v.extend_from_slice(comment);
        v
    }

    #[test]
    fn finds_eocd_at_tail() {
        let mut haystack = vec![0u8; 10];
        haystack.extend_from_slice(&sample_eocd(b"hi"));
        let (offset, rec) = EndOfCentralDirectoryRecord::find_in_block(&haystack).unwrap();
        assert_eq!(offset, 10);
        assert_eq!(rec.directory_records, 1);
    }

    #[test]
    fn global_offset_zero_without_stub() {
        let bytes = sample_eocd(b"");
        let (offset, rec) = EndOfCentralDirectoryRecord::find_in_block(&bytes).unwrap();
        let eocd = EndOfCentralDirectory::new(
            Located { offset: offset as u64, inner: rec },
            None,
        );
        assert_eq!(eocd.global_offset, 0);
    }
}
