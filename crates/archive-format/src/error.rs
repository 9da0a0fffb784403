use std::fmt;

/// Errors produced while parsing or decoding a ZIP or TAR container.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input does not conform to the container format.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// The input uses a feature that is recognized but not implemented.
    #[error("unsupported feature: {0}")]
    Unsupported(#[from] UnsupportedError),

    /// A name or comment could not be decoded with the declared encoding.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// An underlying I/O operation failed.
    #[error("I/O error: {0}")]
    IO(#[from] std::io::Error),

    /// A codec failed to decompress its input.
    #[error("decompression error in {method}: {msg}")]
    Decompression {
        /// The method that was being decoded.
        method: String,
        /// A human-readable description of the failure.
        msg: String,
    },

    /// A size could not be determined ahead of time.
    #[error("unknown size")]
    UnknownSize,

    /// A configured resource limit was exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(#[from] ResourceLimitError),

    /// A name-safety policy rejected an entry.
    #[error("path safety violation: {0}")]
    PathSafety(#[from] PathSafetyError),

    /// An operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// An invariant that should be impossible was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised when the on-disk structure of an archive is malformed.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// No End Of Central Directory record signature was found.
    #[error("end of central directory record not found")]
    DirectoryEndSignatureNotFound,

    /// The ZIP64 end-of-central-directory record is malformed.
    #[error("zip64 end of central directory record is invalid")]
    Directory64EndRecordInvalid,

    /// The central directory offset points outside the file.
    #[error("directory offset points outside the file")]
    DirectoryOffsetPointsOutsideFile,

    /// A central directory record had a different size than expected.
    #[error("invalid central record: expected {expected}, got {actual}")]
    InvalidCentralRecord {
        /// Expected record size.
        expected: u64,
        /// Actual bytes available.
        actual: u64,
    },

    /// An extra field was malformed.
    #[error("invalid extra field")]
    InvalidExtraField,

    /// A local header offset in the central directory was invalid.
    #[error("invalid header offset")]
    InvalidHeaderOffset,

    /// The claimed entry count is impossible given the file size.
    #[error("impossible number of files: claimed {claimed_records_count} records in a {zip_size}-byte file")]
    ImpossibleNumberOfFiles {
        /// Claimed record count.
        claimed_records_count: u64,
        /// Size of the zip file.
        zip_size: u64,
    },

    /// A local file header was malformed.
    #[error("invalid local header")]
    InvalidLocalHeader,

    /// A data descriptor was malformed.
    #[error("invalid data descriptor")]
    InvalidDataDescriptor,

    /// Archive claims multiple disks, which is not supported.
    #[error("multi-disk archives are not supported")]
    MultiDiskUnsupported,

    /// A size mismatch was detected (e.g. CRC, declared vs actual).
    #[error("wrong size: expected {expected}, got {actual}")]
    WrongSize {
        /// Expected size.
        expected: u64,
        /// Actual size observed.
        actual: u64,
    },

    /// A checksum mismatch was detected.
    #[error("wrong checksum: expected {expected:x}, got {actual:x}")]
    WrongChecksum {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum computed.
        actual: u32,
    },

    /// The archive is truncated.
    #[error("archive is truncated")]
    Truncated,

    /// Bytes remain after the logical end of the archive.
    #[error("trailing bytes after archive end")]
    TrailingBytes,
}

/// Errors for recognized-but-unimplemented features.
#[derive(Debug, thiserror::Error)]
pub enum UnsupportedError {
    /// The compression method is not one we recognize.
    #[error("method not supported: {0:?}")]
    MethodNotSupported(crate::parse::Method),

    /// The compression method is recognized but not enabled via Cargo features.
    #[error("method not enabled (missing cargo feature): {0:?}")]
    MethodNotEnabled(crate::parse::Method),

    /// The LZMA version embedded in the properties header is unsupported.
    #[error("lzma version unsupported: {major}.{minor}")]
    LzmaVersionUnsupported {
        /// Major version.
        major: u8,
        /// Minor version.
        minor: u8,
    },

    /// The LZMA properties header had an unexpected size.
    #[error("lzma properties header wrong size: expected {expected}, got {actual}")]
    LzmaPropertiesHeaderWrongSize {
        /// Expected size.
        expected: u16,
        /// Actual size.
        actual: u16,
    },

    /// Multi-disk archives.
    #[error("multi-disk archives are not supported")]
    MultiDisk,

    /// An encrypted entry was encountered without decryption support.
    #[error("encrypted entries are not supported")]
    Encrypted,

    /// An unrecognized or unsupported filter id was found in an XZ filter chain.
    #[error("unsupported filter id: {0:#x}")]
    UnsupportedFilter(u64),

    /// A randomized bzip2 block was encountered (deprecated feature, never produced by modern encoders).
    #[error("randomized bzip2 blocks are not supported")]
    RandomizedBzip2Block,
}

/// Errors raised while decoding a declared text encoding.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// The bytes were not valid for the declared encoding.
    #[error("invalid bytes for encoding {encoding}")]
    Invalid {
        /// The encoding that failed to decode the bytes.
        encoding: String,
    },

    /// The decoded string exceeded a configured size limit.
    #[error("decoded string too large")]
    StringTooLarge,
}

/// Errors raised when a configured resource limit is exceeded.
#[derive(Debug, thiserror::Error)]
pub struct ResourceLimitError {
    /// Which limit was exceeded, e.g. `"maxEntries"`.
    pub limit_name: &'static str,
    /// The configured limit value, if bounded.
    pub limit: Option<u64>,
    /// The value that was required or observed.
    pub required: Option<u64>,
}

impl fmt::Display for ResourceLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource limit {} exceeded", self.limit_name)?;
        if let Some(limit) = self.limit {
            write!(f, " (limit {limit}")?;
            if let Some(required) = self.required {
                write!(f, ", required {required}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Errors raised by name-safety policies (path traversal, collisions).
#[derive(Debug, thiserror::Error)]
pub enum PathSafetyError {
    /// An entry name escapes the archive root.
    #[error("path traversal in entry {name:?}")]
    PathTraversal {
        /// The offending entry name.
        name: String,
    },

    /// Two entries collide under some equivalence (exact, casefold, NFC).
    #[error("name collision between {name_a:?} and {name_b:?} ({kind})")]
    NameCollision {
        /// First colliding name.
        name_a: String,
        /// Second colliding name.
        name_b: String,
        /// Which equivalence class produced the collision.
        kind: &'static str,
    },
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::IO(e) => e,
            e => std::io::Error::other(e),
        }
    }
}
