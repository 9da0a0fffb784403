//! A pull-based cursor over a TAR byte stream: `next_entry()` yields one
//! [`TarEntry`] plus its body reader at a time, mirroring how this crate's
//! ZIP side exposes entries as a cursor rather than a generator (spec §9).

use std::io::Read;

use super::header::{parse_numeric_field, TarEntry, TarEntryType};
use super::BLOCK_SIZE;
use crate::error::{Error, FormatError};

const USTAR_MAGIC: &[u8] = b"ustar";

/// Reads ustar + PAX + GNU-longname/longlink TAR streams.
pub struct TarReader<R: Read> {
    inner: R,
    /// Pending GNU longname override for the next header.
    pending_long_name: Option<String>,
    /// Pending GNU longlink override for the next header.
    pending_long_link: Option<String>,
    /// Pending PAX extended records for the next header.
    pending_pax: Option<PaxRecords>,
}

#[derive(Default, Clone)]
struct PaxRecords {
    path: Option<String>,
    linkpath: Option<String>,
    size: Option<u64>,
    mtime: Option<i64>,
    uid: Option<u64>,
    gid: Option<u64>,
}

impl<R: Read> TarReader<R> {
    /// Wrap a reader positioned at the start of a TAR stream.
    pub fn new(inner: R) -> Self {
        TarReader {
            inner,
            pending_long_name: None,
            pending_long_link: None,
            pending_pax: None,
        }
    }

    /// Read the next logical entry, or `None` at the two-zero-block
    /// end-of-archive marker (or true EOF, which some non-conforming
    /// writers omit the marker for).
    pub fn next_entry(&mut self) -> Result<Option<(TarEntry, TarEntryBody<'_, R>)>, Error> {
        loop {
            let mut block = [0u8; BLOCK_SIZE];
            let n = read_fully_or_eof(&mut self.inner, &mut block)?;
            if n == 0 {
                return Ok(None);
            }
            if n < BLOCK_SIZE {
                return Err(FormatError::Truncated.into());
            }
            if block.iter().all(|&b| b == 0) {
                // Could be the end-of-archive marker (two zero blocks) or
                // padding; either way, nothing more to read as an entry.
                return Ok(None);
            }

            let raw_type = block[156];
            let size = parse_numeric_field(&block[124..136]);

            match raw_type {
                b'x' | b'g' => {
                    let data = read_body_bytes(&mut self.inner, size)?;
                    self.pending_pax = Some(parse_pax_records(&data));
                    continue;
                }
                b'L' => {
                    let data = read_body_bytes(&mut self.inner, size)?;
                    self.pending_long_name = Some(cstr(&data));
                    continue;
                }
                b'K' => {
                    let data = read_body_bytes(&mut self.inner, size)?;
                    self.pending_long_link = Some(cstr(&data));
                    continue;
                }
                _ => {}
            }

            let name_field = cstr(&block[0..100]);
            let prefix_field = cstr(&block[345..500]);
            let is_ustar = &block[257..262] == USTAR_MAGIC;
            let mut name = if is_ustar && !prefix_field.is_empty() {
                format!("{prefix_field}/{name_field}")
            } else {
                name_field
            };
            let mode = parse_numeric_field(&block[100..108]) as u32;
            let mut uid = parse_numeric_field(&block[108..116]);
            let mut gid = parse_numeric_field(&block[116..124]);
            let mut entry_size = size;
            let mut mtime = parse_numeric_field(&block[136..148]) as i64;
            let link_name_field = cstr(&block[157..257]);
            let mut link_name = if link_name_field.is_empty() { None } else { Some(link_name_field) };

            if let Some(long_name) = self.pending_long_name.take() {
                name = long_name;
            }
            if let Some(long_link) = self.pending_long_link.take() {
                link_name = Some(long_link);
            }
            if let Some(pax) = self.pending_pax.take() {
                if let Some(p) = pax.path {
                    name = p;
                }
                if let Some(l) = pax.linkpath {
                    link_name = Some(l);
                }
                if let Some(s) = pax.size {
                    entry_size = s;
                }
                if let Some(m) = pax.mtime {
                    mtime = m;
                }
                if let Some(u) = pax.uid {
                    uid = u;
                }
                if let Some(g) = pax.gid {
                    gid = g;
                }
            }

            let entry = TarEntry {
                name: TarEntry::normalize_name(&name),
                link_name: link_name.map(|l| TarEntry::normalize_name(&l)),
                mode,
                uid,
                gid,
                uname: non_empty(cstr(&block[265..297])),
                gname: non_empty(cstr(&block[297..329])),
                size: entry_size,
                mtime,
                entry_type: TarEntryType::from_byte(raw_type),
            };

            let body = TarEntryBody {
                reader: &mut self.inner,
                remaining: entry_size,
                padding: padding_for(entry_size),
            };
            return Ok(Some((entry, body)));
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn padding_for(size: u64) -> u64 {
    let rem = size % BLOCK_SIZE as u64;
    if rem == 0 {
        0
    } else {
        BLOCK_SIZE as u64 - rem
    }
}

fn cstr(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn read_fully_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize, Error> {
    let mut total = 0;
    while total < buf.len() {
        let n = r.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

fn read_body_bytes<R: Read>(r: &mut R, size: u64) -> Result<Vec<u8>, Error> {
    let mut data = vec![0u8; size as usize];
    r.read_exact(&mut data)?;
    let padding = padding_for(size);
    if padding > 0 {
        let mut pad = vec![0u8; padding as usize];
        r.read_exact(&mut pad)?;
    }
    Ok(data)
}

/// Parse PAX extended records: `"LENGTH KEY=VALUE\n"` lines where `LENGTH`
/// counts the entire line including itself and the trailing newline.
fn parse_pax_records(data: &[u8]) -> PaxRecords {
    let mut records = PaxRecords::default();
    let mut rest = data;
    while !rest.is_empty() {
        let Some(space_pos) = rest.iter().position(|&b| b == b' ') else { break };
        let Ok(len_str) = std::str::from_utf8(&rest[..space_pos]) else { break };
        let Ok(len) = len_str.parse::<usize>() else { break };
        if len == 0 || len > rest.len() {
            break;
        }
        let line = &rest[space_pos + 1..len];
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        if let Ok(line_str) = std::str::from_utf8(line) {
            if let Some((key, value)) = line_str.split_once('=') {
                match key {
                    "path" => records.path = Some(value.to_string()),
                    "linkpath" => records.linkpath = Some(value.to_string()),
                    "size" => records.size = value.parse().ok(),
                    "mtime" => records.mtime = value.parse::<f64>().ok().map(|f| f as i64),
                    "uid" => records.uid = value.parse().ok(),
                    "gid" => records.gid = value.parse().ok(),
                    _ => {}
                }
            }
        }
        rest = &rest[len..];
    }
    records
}

/// A view over one entry's body, bounded to exactly its declared size.
pub struct TarEntryBody<'r, R: Read> {
    reader: &'r mut R,
    remaining: u64,
    padding: u64,
}

impl<R: Read> Read for TarEntryBody<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(self.remaining) as usize;
        let n = self.reader.read(&mut buf[..want])?;
        self.remaining -= n as u64;
        if self.remaining == 0 && self.padding > 0 {
            let mut pad = vec![0u8; self.padding as usize];
            self.reader.read_exact(&mut pad)?;
            self.padding = 0;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_ustar_header(name: &str, size: u64) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[0..name.len()].copy_from_slice(name.as_bytes());
        let mode = super::super::header::format_octal_field(0o644, 8);
        block[100..108].copy_from_slice(&mode);
        let size_field = super::super::header::format_octal_field(size, 12);
        block[124..136].copy_from_slice(&size_field);
        block[156] = b'0';
        block[257..262].copy_from_slice(b"ustar");
        block
    }

    #[test]
    fn reads_single_entry() {
        let mut data = Vec::new();
        data.extend_from_slice(&build_ustar_header("hello.txt", 5));
        data.extend_from_slice(b"world");
        data.extend_from_slice(&[0u8; BLOCK_SIZE - 5]);
        data.extend_from_slice(&[0u8; BLOCK_SIZE * 2]);

        let mut reader = TarReader::new(std::io::Cursor::new(data));
        let (entry, mut body) = reader.next_entry().unwrap().unwrap();
        assert_eq!(entry.name, "hello.txt");
        let mut contents = Vec::new();
        body.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"world");
        drop(body);
        assert!(reader.next_entry().unwrap().is_none());
    }
}
