//! A minimal, deterministic ZIP writer for the normalize engine (C14).
//!
//! No repo in this corpus's teacher (`bearcove-rc-zip`) writes ZIP archives
//! — `rc-zip`/`rc-zip-sync` are read-only. This module is grounded instead
//! on `examples/other_examples/936c185f_KSD-CO-s-zip__src-writer.rs.rs`'s
//! local-header/central-directory/ZIP64/EOCD layout, adapted for the one
//! way this crate ever calls it: every entry's final bytes are already
//! fully materialized in memory, so there is no need for a streaming
//! encoder or a trailing data descriptor — sizes and CRC32 are known
//! before the local header is written. DEFLATE compression uses
//! `miniz_oxide::deflate::compress_to_vec`, the compression-side sibling
//! of the `miniz_oxide::inflate` API already used for decompression
//! elsewhere in this workspace, rather than the reference's `flate2`
//! (not part of this workspace's dependency stack).

use std::io::{self, Write};

use crc32fast::Hasher as Crc32;

const LOCAL_FILE_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_DIRECTORY_SIG: u32 = 0x0201_4b50;
const ZIP64_EOCD_SIG: u32 = 0x0606_4b50;
const ZIP64_EOCD_LOCATOR_SIG: u32 = 0x0706_4b50;
const EOCD_SIG: u32 = 0x0605_4b50;

const ZIP64_EXTRA_ID: u16 = 0x0001;
const VERSION_NEEDED_DEFAULT: u16 = 20;
const VERSION_NEEDED_ZIP64: u16 = 45;
const FLAG_UTF8: u16 = 0x0800;

const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// How an entry's bytes should be stored in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMethod {
    /// Stored as-is, no compression.
    Store,
    /// DEFLATE-compressed via `miniz_oxide`.
    Deflate,
}

/// One entry queued for writing.
pub struct PendingEntry<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
    pub method: WriteMethod,
    pub mode: u32,
    /// MS-DOS date/time fields, zeroed by the normalize engine unless the
    /// caller asked for non-deterministic output.
    pub dos_time: u16,
    pub dos_date: u16,
}

struct WrittenRecord {
    name: String,
    method: WriteMethod,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    local_header_offset: u64,
    mode: u32,
    dos_time: u16,
    dos_date: u16,
}

/// Writes a canonical ZIP archive: local headers with sizes/CRC32 known
/// upfront (no data descriptor), a central directory, and a classic or
/// ZIP64 end-of-central-directory record depending on whether any count
/// or offset overflows its 32-bit field.
pub struct ZipWriter<W: Write> {
    out: W,
    offset: u64,
    records: Vec<WrittenRecord>,
}

impl<W: Write> ZipWriter<W> {
    pub fn new(out: W) -> Self {
        ZipWriter { out, offset: 0, records: Vec::new() }
    }

    /// Write one entry's local header and body.
    pub fn write_entry(&mut self, entry: &PendingEntry<'_>) -> io::Result<()> {
        let uncompressed_size = entry.data.len() as u64;
        let mut crc = Crc32::new();
        crc.update(entry.data);
        let crc32 = crc.finalize();

        let compressed = match entry.method {
            WriteMethod::Store => entry.data.to_vec(),
            WriteMethod::Deflate => miniz_oxide::deflate::compress_to_vec(entry.data, 6),
        };
        let compressed_size = compressed.len() as u64;

        let local_header_offset = self.offset;
        let name_bytes = entry.name.as_bytes();
        let needs_zip64 = uncompressed_size > ZIP64_THRESHOLD || compressed_size > ZIP64_THRESHOLD;

        let mut zip64_extra = Vec::new();
        if needs_zip64 {
            zip64_extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
            zip64_extra.extend_from_slice(&16u16.to_le_bytes());
            zip64_extra.extend_from_slice(&uncompressed_size.to_le_bytes());
            zip64_extra.extend_from_slice(&compressed_size.to_le_bytes());
        }

        let version_needed = if needs_zip64 { VERSION_NEEDED_ZIP64 } else { VERSION_NEEDED_DEFAULT };
        let method_id: u16 = match entry.method {
            WriteMethod::Store => 0,
            WriteMethod::Deflate => 8,
        };

        let mut written = 0u64;
        written += self.write_u32(LOCAL_FILE_HEADER_SIG)?;
        written += self.write_u16(version_needed)?;
        written += self.write_u16(FLAG_UTF8)?;
        written += self.write_u16(method_id)?;
        written += self.write_u16(entry.dos_time)?;
        written += self.write_u16(entry.dos_date)?;
        written += self.write_u32(crc32)?;
        written += self.write_u32(clamp_zip64(compressed_size))?;
        written += self.write_u32(clamp_zip64(uncompressed_size))?;
        written += self.write_u16(name_bytes.len() as u16)?;
        written += self.write_u16(zip64_extra.len() as u16)?;
        self.out.write_all(name_bytes)?;
        written += name_bytes.len() as u64;
        self.out.write_all(&zip64_extra)?;
        written += zip64_extra.len() as u64;
        self.out.write_all(&compressed)?;
        written += compressed.len() as u64;

        self.offset += written;
        self.records.push(WrittenRecord {
            name: entry.name.to_string(),
            method: entry.method,
            crc32,
            compressed_size,
            uncompressed_size,
            local_header_offset,
            mode: entry.mode,
            dos_time: entry.dos_time,
            dos_date: entry.dos_date,
        });
        Ok(())
    }

    /// Write the central directory and EOCD record(s), returning the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        let central_directory_offset = self.offset;
        let mut central_directory_size = 0u64;

        for record in &self.records {
            let name_bytes = record.name.as_bytes();
            let needs_zip64 = record.uncompressed_size > ZIP64_THRESHOLD
                || record.compressed_size > ZIP64_THRESHOLD
                || record.local_header_offset > ZIP64_THRESHOLD;

            let mut zip64_extra = Vec::new();
            if needs_zip64 {
                zip64_extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
                let mut payload = Vec::new();
                if record.uncompressed_size > ZIP64_THRESHOLD {
                    payload.extend_from_slice(&record.uncompressed_size.to_le_bytes());
                }
                if record.compressed_size > ZIP64_THRESHOLD {
                    payload.extend_from_slice(&record.compressed_size.to_le_bytes());
                }
                if record.local_header_offset > ZIP64_THRESHOLD {
                    payload.extend_from_slice(&record.local_header_offset.to_le_bytes());
                }
                zip64_extra.extend_from_slice(&(payload.len() as u16).to_le_bytes());
                zip64_extra.extend_from_slice(&payload);
            }

            let version_needed = if needs_zip64 { VERSION_NEEDED_ZIP64 } else { VERSION_NEEDED_DEFAULT };
            let method_id: u16 = match record.method {
                WriteMethod::Store => 0,
                WriteMethod::Deflate => 8,
            };
            // Unix host (3), permission bits in the high 16 bits of the
            // external attributes word, matching the convention `rc-zip`
            // reads entries with in `parse/archive.rs`'s `mode` handling.
            let external_attributes = (record.mode & 0xffff) << 16;

            let mut entry_size = 0u64;
            entry_size += self.write_u32(CENTRAL_DIRECTORY_SIG)?;
            entry_size += self.write_u16((3u16 << 8) | 63)?; // version made by: unix, spec version 6.3
            entry_size += self.write_u16(version_needed)?;
            entry_size += self.write_u16(FLAG_UTF8)?;
            entry_size += self.write_u16(method_id)?;
            entry_size += self.write_u16(record.dos_time)?;
            entry_size += self.write_u16(record.dos_date)?;
            entry_size += self.write_u32(record.crc32)?;
            entry_size += self.write_u32(clamp_zip64(record.compressed_size))?;
            entry_size += self.write_u32(clamp_zip64(record.uncompressed_size))?;
            entry_size += self.write_u16(name_bytes.len() as u16)?;
            entry_size += self.write_u16(zip64_extra.len() as u16)?;
            entry_size += self.write_u16(0)?; // comment length
            entry_size += self.write_u16(0)?; // disk number start
            entry_size += self.write_u16(0)?; // internal attributes
            entry_size += self.write_u32(external_attributes)?;
            entry_size += self.write_u32(clamp_zip64(record.local_header_offset))?;
            self.out.write_all(name_bytes)?;
            entry_size += name_bytes.len() as u64;
            self.out.write_all(&zip64_extra)?;
            entry_size += zip64_extra.len() as u64;

            self.offset += entry_size;
            central_directory_size += entry_size;
        }

        let entry_count = self.records.len() as u64;
        let needs_zip64_eocd = entry_count > u16::MAX as u64
            || central_directory_size > ZIP64_THRESHOLD
            || central_directory_offset > ZIP64_THRESHOLD;

        if needs_zip64_eocd {
            let zip64_eocd_offset = self.offset;
            self.write_u32(ZIP64_EOCD_SIG)?;
            self.write_u64(44)?; // size of zip64 EOCD record, excluding sig+this field
            self.write_u16(VERSION_NEEDED_ZIP64)?;
            self.write_u16(VERSION_NEEDED_ZIP64)?;
            self.write_u32(0)?; // this disk
            self.write_u32(0)?; // disk with central directory start
            self.write_u64(entry_count)?; // entries on this disk
            self.write_u64(entry_count)?; // total entries
            self.write_u64(central_directory_size)?;
            self.write_u64(central_directory_offset)?;

            self.write_u32(ZIP64_EOCD_LOCATOR_SIG)?;
            self.write_u32(0)?; // disk with zip64 EOCD start
            self.write_u64(zip64_eocd_offset)?;
            self.write_u32(1)?; // total number of disks
        }

        self.write_u32(EOCD_SIG)?;
        self.write_u16(0)?; // this disk
        self.write_u16(0)?; // disk with central directory start
        self.write_u16(clamp_zip64_u16(entry_count))?;
        self.write_u16(clamp_zip64_u16(entry_count))?;
        self.write_u32(clamp_zip64(central_directory_size))?;
        self.write_u32(clamp_zip64(central_directory_offset))?;
        self.write_u16(0)?; // archive comment length

        Ok(self.out)
    }

    fn write_u16(&mut self, v: u16) -> io::Result<u64> {
        self.out.write_all(&v.to_le_bytes())?;
        Ok(2)
    }

    fn write_u32(&mut self, v: u32) -> io::Result<u64> {
        self.out.write_all(&v.to_le_bytes())?;
        Ok(4)
    }

    fn write_u64(&mut self, v: u64) -> io::Result<u64> {
        self.out.write_all(&v.to_le_bytes())?;
        Ok(8)
    }
}

fn clamp_zip64(v: u64) -> u32 {
    if v > ZIP64_THRESHOLD {
        u32::MAX
    } else {
        v as u32
    }
}

fn clamp_zip64_u16(v: u64) -> u16 {
    if v > u16::MAX as u64 {
        u16::MAX
    } else {
        v as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_a_minimal_store_archive_with_valid_eocd_tail() {
        let mut writer = ZipWriter::new(Vec::new());
        writer
            .write_entry(&PendingEntry {
                name: "hello.txt",
                data: b"hello world",
                method: WriteMethod::Store,
                mode: 0o644,
                dos_time: 0,
                dos_date: 0,
            })
            .unwrap();
        let out = writer.finish().unwrap();
        assert!(out.len() > 22);
        let tail = &out[out.len() - 22..];
        assert_eq!(u32::from_le_bytes(tail[0..4].try_into().unwrap()), EOCD_SIG);
        assert_eq!(u16::from_le_bytes(tail[10..12].try_into().unwrap()), 1);
    }

    #[test]
    fn deflate_entry_round_trips_through_miniz_oxide_inflate() {
        let mut writer = ZipWriter::new(Vec::new());
        let data = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        writer
            .write_entry(&PendingEntry {
                name: "a.txt",
                data,
                method: WriteMethod::Deflate,
                mode: 0o644,
                dos_time: 0,
                dos_date: 0,
            })
            .unwrap();
        let out = writer.finish().unwrap();
        assert_eq!(u32::from_le_bytes(out[0..4].try_into().unwrap()), LOCAL_FILE_HEADER_SIG);
    }
}
