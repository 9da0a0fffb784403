use std::fmt;

/// Errors produced while parsing or decoding an XZ stream (C6/C7).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The stream/block/index framing did not conform to the XZ format.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// A filter id, combination, or properties value is not supported.
    #[error("unsupported: {0}")]
    Unsupported(#[from] UnsupportedError),

    /// A block or stream integrity check failed.
    #[error("integrity check failed: expected {expected}, computed {computed}")]
    BadCheck {
        /// Expected value, formatted per check type.
        expected: String,
        /// Computed value, formatted per check type.
        computed: String,
    },

    /// A configured resource limit was exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(#[from] ResourceLimitError),

    /// The LZMA2/LZMA bitstream itself was malformed (range coder
    /// underflow, invalid chunk control byte, bad probability state).
    #[error("lzma decode error: {0}")]
    LzmaDecode(String),

    /// An operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

/// Structural framing errors.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The 6-byte stream header magic did not match.
    #[error("bad stream header magic")]
    BadStreamMagic,

    /// The 2-byte footer magic (`YZ`) did not match.
    #[error("bad stream footer magic")]
    BadFooterMagic,

    /// A header or footer CRC32 failed to validate.
    #[error("bad header crc32")]
    BadHeaderCrc,

    /// Stream header flags had reserved bits set, or header/footer flags disagreed.
    #[error("invalid stream flags")]
    InvalidStreamFlags,

    /// An unrecognized integrity check type id.
    #[error("unknown check type id {0:#x}")]
    UnknownCheckType(u8),

    /// A block header's declared size exceeded 1024 bytes or was otherwise invalid.
    #[error("invalid block header size")]
    InvalidBlockHeaderSize,

    /// Reserved bits in the block flags byte were set.
    #[error("reserved block flags bits set")]
    ReservedBlockFlagsSet,

    /// A variable-length integer was malformed (too long, or a trailing
    /// continuation byte after the 9-byte maximum, or a final byte with
    /// unnecessary leading zero groups / overflow beyond 2^63-1).
    #[error("invalid variable-length integer")]
    InvalidVli,

    /// The actual compressed size of a block's payload did not match its header.
    #[error("block compressed size mismatch: header said {expected}, payload was {actual}")]
    BlockSizeMismatch {
        /// Declared compressed size.
        expected: u64,
        /// Observed compressed size.
        actual: u64,
    },

    /// Non-zero bytes found where 4-byte alignment padding was expected.
    #[error("non-zero block padding")]
    NonZeroPadding,

    /// The index did not agree with the blocks actually present.
    #[error("index record mismatch at record {index}")]
    IndexMismatch {
        /// Which record disagreed.
        index: u64,
    },

    /// The index's own CRC32 failed to validate.
    #[error("bad index crc32")]
    BadIndexCrc,

    /// The footer's backward-size did not match the index actually present.
    #[error("footer backward size {footer} does not match index size {actual}")]
    BackwardSizeMismatch {
        /// Value recorded in the footer.
        footer: u64,
        /// Actual encoded index size.
        actual: u64,
    },

    /// The input ended before a complete structure could be parsed.
    #[error("truncated xz stream")]
    Truncated,

    /// Stream padding (inter-stream zero runs) was not a multiple of 4 bytes.
    #[error("stream padding not a multiple of 4 bytes")]
    BadStreamPadding,
}

/// Recognized-but-unsupported combinations.
#[derive(Debug, thiserror::Error)]
pub enum UnsupportedError {
    /// A filter id outside the closed set of §3 was used.
    #[error("unsupported filter id {0:#x}")]
    UnknownFilter(u64),

    /// The LZMA2 filter was missing, or was not the last filter in the chain.
    #[error("lzma2 filter must be present and last in the chain")]
    Lzma2NotLast,

    /// A non-last filter changed byte count, or appeared after LZMA2.
    #[error("filter {0:#x} may not appear as the last filter")]
    FilterMustNotBeLast(u64),

    /// A filter's properties had the wrong length for its id.
    #[error("filter {filter:#x} properties wrong length: expected {expected:?}, got {actual}")]
    BadFilterProps {
        /// Offending filter id.
        filter: u64,
        /// Acceptable properties lengths.
        expected: &'static [usize],
        /// Actual properties length observed.
        actual: usize,
    },

    /// A BCJ filter's start offset was not aligned to its architecture.
    #[error("bcj filter {filter:#x} start offset {offset} not aligned to {alignment}")]
    BadBcjAlignment {
        /// Offending filter id.
        filter: u64,
        /// Offset as declared in the properties.
        offset: u32,
        /// Required alignment for this filter.
        alignment: u32,
    },

    /// More than 4 filters were declared in one block.
    #[error("too many filters in chain: {0}")]
    TooManyFilters(u8),

    /// A multi-disk-style unsupported feature (reserved for symmetry; XZ has none today).
    #[error("unsupported lzma2 dictionary size bits {0}")]
    BadDictSizeBits(u8),
}

/// Raised when a configured resource limit is exceeded.
#[derive(Debug, thiserror::Error)]
pub struct ResourceLimitError {
    /// Which limit was exceeded, e.g. `"maxXzDictionaryBytes"`.
    pub limit_name: &'static str,
    /// The configured limit.
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
