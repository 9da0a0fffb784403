//! A deterministic ustar writer: same entries, same order, always the same
//! bytes. No PAX extensions, no GNU longname escape hatch — names that don't
//! fit the ustar 100+155 byte name/prefix split are rejected rather than
//! worked around, so the output format stays a single, predictable shape.

use std::io::Write;

use super::header::{format_octal_field, TarEntry, TarEntryType};
use super::BLOCK_SIZE;
use crate::error::{Error, FormatError};

const USTAR_MAGIC: &[u8] = b"ustar\0";
const USTAR_VERSION: &[u8] = b"00";

/// Knobs for the deterministic writer. All default to the
/// identity-erasing values: zeroed ownership, epoch timestamp.
#[derive(Debug, Clone)]
pub struct TarWriterOptions {
    /// uid to stamp on every entry. Defaults to 0.
    pub uid: u64,
    /// gid to stamp on every entry. Defaults to 0.
    pub gid: u64,
    /// mtime (Unix epoch seconds) to stamp on every entry unless the
    /// entry already carries one and `preserve_mtime` is set.
    pub mtime: i64,
    /// When true, use each entry's own `mtime` field instead of `mtime` above.
    pub preserve_mtime: bool,
}

impl Default for TarWriterOptions {
    fn default() -> Self {
        TarWriterOptions { uid: 0, gid: 0, mtime: 0, preserve_mtime: false }
    }
}

/// Writes entries in caller-supplied order to a deterministic ustar stream.
pub struct TarWriter<W: Write> {
    inner: W,
    options: TarWriterOptions,
}

impl<W: Write> TarWriter<W> {
    /// Wrap a writer, using `options` for every entry written through it.
    pub fn new(inner: W, options: TarWriterOptions) -> Self {
        TarWriter { inner, options }
    }

    /// Write one entry's header and body. `body` must yield exactly
    /// `entry.size` bytes for regular files; non-regular entries should
    /// pass an empty slice.
    pub fn write_entry(&mut self, entry: &TarEntry, body: &[u8]) -> Result<(), Error> {
        if entry.entry_type == TarEntryType::Regular && body.len() as u64 != entry.size {
            return Err(FormatError::WrongSize { expected: entry.size, actual: body.len() as u64 }.into());
        }

        let (name, prefix) = split_ustar_name(&entry.name)?;
        let mut block = [0u8; BLOCK_SIZE];

        write_field(&mut block[0..100], name.as_bytes());
        block[100..108].copy_from_slice(&format_octal_field(entry.mode as u64, 8));
        block[108..116].copy_from_slice(&format_octal_field(self.options.uid, 8));
        block[116..124].copy_from_slice(&format_octal_field(self.options.gid, 8));
        let size = if entry.entry_type == TarEntryType::Regular { entry.size } else { 0 };
        block[124..136].copy_from_slice(&format_octal_field(size, 12));
        let mtime = if self.options.preserve_mtime { entry.mtime } else { self.options.mtime };
        block[136..148].copy_from_slice(&format_octal_field(mtime.max(0) as u64, 12));
        // checksum field: 8 spaces while computing, then overwritten below.
        block[148..156].fill(b' ');
        block[156] = entry.entry_type.to_byte();
        if let Some(link) = &entry.link_name {
            write_field(&mut block[157..257], link.as_bytes());
        }
        block[257..263].copy_from_slice(USTAR_MAGIC);
        block[263..265].copy_from_slice(USTAR_VERSION);
        write_field(&mut block[345..500], prefix.as_bytes());

        let checksum = block.iter().map(|&b| b as u32).sum::<u32>();
        let checksum_field = format!("{:06o}\0 ", checksum);
        block[148..156].copy_from_slice(checksum_field.as_bytes());

        self.inner.write_all(&block)?;
        if entry.entry_type == TarEntryType::Regular {
            self.inner.write_all(body)?;
            let padding = padding_for(entry.size);
            if padding > 0 {
                self.inner.write_all(&vec![0u8; padding as usize])?;
            }
        }
        Ok(())
    }

    /// Write the two all-zero end-of-archive blocks and flush.
    pub fn finish(mut self) -> Result<W, Error> {
        self.inner.write_all(&[0u8; BLOCK_SIZE * 2])?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn write_field(dst: &mut [u8], src: &[u8]) {
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
}

fn padding_for(size: u64) -> u64 {
    let rem = size % BLOCK_SIZE as u64;
    if rem == 0 {
        0
    } else {
        BLOCK_SIZE as u64 - rem
    }
}

/// Split a forward-slash name into ustar's 100-byte name field and
/// 155-byte prefix field, erroring rather than silently truncating when
/// it doesn't fit either form.
fn split_ustar_name(name: &str) -> Result<(String, String), Error> {
    if name.len() <= 100 {
        return Ok((name.to_string(), String::new()));
    }
    let mut split_at = None;
    for (i, c) in name.char_indices() {
        if c == '/' && i <= 155 && name.len() - i - 1 <= 100 {
            split_at = Some(i);
        }
    }
    match split_at {
        Some(i) => Ok((name[i + 1..].to_string(), name[..i].to_string())),
        None => Err(FormatError::InvalidHeaderOffset.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(name: &str, size: u64) -> TarEntry {
        TarEntry {
            name: name.to_string(),
            link_name: None,
            mode: 0o644,
            uid: 1000,
            gid: 1000,
            uname: Some("alice".into()),
            gname: Some("alice".into()),
            size,
            mtime: 1_700_000_000,
            entry_type: TarEntryType::Regular,
        }
    }

    #[test]
    fn zeroes_ownership_and_epoch_mtime_by_default() {
        let mut out = Vec::new();
        {
            let mut writer = TarWriter::new(&mut out, TarWriterOptions::default());
            writer.write_entry(&sample_entry("a.txt", 3), b"abc").unwrap();
            writer.finish().unwrap();
        }
        assert_eq!(&out[108..115], b"0000000");
        assert_eq!(&out[116..123], b"0000000");
        assert_eq!(&out[136..147], b"00000000000");
    }

    #[test]
    fn same_input_produces_same_bytes() {
        let entry = sample_entry("a.txt", 3);
        let make = || {
            let mut out = Vec::new();
            let mut writer = TarWriter::new(&mut out, TarWriterOptions::default());
            writer.write_entry(&entry, b"abc").unwrap();
            writer.finish().unwrap();
            out
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn long_name_splits_into_prefix_and_name() {
        let long = format!("{}/{}", "d".repeat(150), "file.txt");
        let (name, prefix) = split_ustar_name(&long).unwrap();
        assert_eq!(name, "file.txt");
        assert_eq!(prefix, "d".repeat(150));
    }
}
