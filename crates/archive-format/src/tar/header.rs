//! The logical, already-assembled TAR entry (after prefix/name joining and
//! PAX/GNU longname overrides are applied).

/// The ustar type-flag byte, closed to the variants this crate handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarEntryType {
    /// Regular file (`'0'` or `'\0'`).
    Regular,
    /// Hard link (`'1'`).
    HardLink,
    /// Symbolic link (`'2'`).
    Symlink,
    /// Character device (`'3'`).
    CharDevice,
    /// Block device (`'4'`).
    BlockDevice,
    /// Directory (`'5'`).
    Directory,
    /// FIFO (`'6'`).
    Fifo,
    /// GNU sparse file (`'S'`).
    Sparse,
    /// Any type flag not named above.
    Other(u8),
}

impl TarEntryType {
    /// Map a raw type-flag byte to a [`TarEntryType`].
    pub fn from_byte(b: u8) -> Self {
        match b {
            b'0' | 0 => TarEntryType::Regular,
            b'1' => TarEntryType::HardLink,
            b'2' => TarEntryType::Symlink,
            b'3' => TarEntryType::CharDevice,
            b'4' => TarEntryType::BlockDevice,
            b'5' => TarEntryType::Directory,
            b'6' => TarEntryType::Fifo,
            b'S' => TarEntryType::Sparse,
            other => TarEntryType::Other(other),
        }
    }

    /// Map back to the on-disk type-flag byte.
    pub fn to_byte(self) -> u8 {
        match self {
            TarEntryType::Regular => b'0',
            TarEntryType::HardLink => b'1',
            TarEntryType::Symlink => b'2',
            TarEntryType::CharDevice => b'3',
            TarEntryType::BlockDevice => b'4',
            TarEntryType::Directory => b'5',
            TarEntryType::Fifo => b'6',
            TarEntryType::Sparse => b'S',
            TarEntryType::Other(b) => b,
        }
    }
}

/// One fully-resolved TAR entry: prefix+name joined, PAX/GNU-longname
/// overrides applied, names normalized to forward slashes.
#[derive(Debug, Clone)]
pub struct TarEntry {
    /// Logical name, forward-slash separated, redundant segments removed.
    pub name: String,
    /// Link target, for hard links and symlinks.
    pub link_name: Option<String>,
    /// Unix file mode bits.
    pub mode: u32,
    /// Owning user id.
    pub uid: u64,
    /// Owning group id.
    pub gid: u64,
    /// Owning user name (ustar `uname`, if present).
    pub uname: Option<String>,
    /// Owning group name (ustar `gname`, if present).
    pub gname: Option<String>,
    /// Entry size in bytes (meaningless for non-regular types other than sparse).
    pub size: u64,
    /// Modification time, Unix epoch seconds (PAX allows sub-second precision,
    /// truncated here to whole seconds).
    pub mtime: i64,
    /// Entry type.
    pub entry_type: TarEntryType,
}

impl TarEntry {
    /// Normalize a raw TAR name: convert backslashes, collapse `./`
    /// segments, and strip a trailing slash used to mark directories.
    pub fn normalize_name(raw: &str) -> String {
        let forward = raw.replace('\\', "/");
        let mut segments: Vec<&str> = Vec::new();
        for seg in forward.split('/') {
            if seg.is_empty() || seg == "." {
                continue;
            }
            segments.push(seg);
        }
        segments.join("/")
    }
}

/// Parse a NUL/space-terminated octal numeric TAR field, or a GNU
/// base-256 field when the high bit of the first byte is set.
pub fn parse_numeric_field(bytes: &[u8]) -> u64 {
    if let Some(&first) = bytes.first() {
        if first & 0x80 != 0 {
            return parse_base256(bytes);
        }
    }
    let s = bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect::<String>();
    let s = s.trim_matches(|c: char| c == ' ' || c == '\0');
    u64::from_str_radix(s, 8).unwrap_or(0)
}

fn parse_base256(bytes: &[u8]) -> u64 {
    let mut value: u64 = (bytes[0] & 0x7f) as u64;
    for &b in &bytes[1..] {
        value = (value << 8) | b as u64;
    }
    value
}

/// Format a numeric value as a fixed-width, NUL-terminated, space-padded
/// octal field (the deterministic-writer form; never emits base-256).
pub fn format_octal_field(value: u64, width: usize) -> Vec<u8> {
    let digits = width - 1; // last byte is NUL
    let s = format!("{:0>width$o}", value, width = digits);
    let mut out = s.into_bytes();
    out.truncate(digits);
    out.push(0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_redundant_segments() {
        assert_eq!(TarEntry::normalize_name("./a/./b/"), "a/b");
        assert_eq!(TarEntry::normalize_name("a\\b\\c"), "a/b/c");
    }

    #[test]
    fn octal_roundtrip() {
        let field = format_octal_field(0o755, 8);
        assert_eq!(parse_numeric_field(&field), 0o755);
    }

    #[test]
    fn base256_field_parses() {
        // 0x80 flag bit set, remaining 7 bytes big-endian value.
        let mut bytes = vec![0x80u8, 0, 0, 0, 0, 0, 0, 0];
        bytes[7] = 42;
        assert_eq!(parse_numeric_field(&bytes), 42);
    }
}
