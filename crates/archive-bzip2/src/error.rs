use std::fmt;

/// Errors produced while parsing or decoding a bzip2 stream (C8).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The stream/block framing did not conform to the bzip2 format.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// A recognized-but-unsupported feature was encountered.
    #[error("unsupported: {0}")]
    Unsupported(#[from] UnsupportedError),

    /// A configured resource limit was exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(#[from] ResourceLimitError),
}

/// Structural framing and bitstream errors.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The 3-byte `BZh` magic did not match.
    #[error("bad stream header magic")]
    BadStreamMagic,

    /// The block-size digit was not in `1..=9`.
    #[error("bad block size digit {0:#x}")]
    BadBlockSizeDigit(u8),

    /// The 48-bit value after a stream header or block was neither the
    /// block magic nor the end-of-stream magic.
    #[error("bad block magic")]
    BadBlockMagic,

    /// `origPtr` pointed outside the decoded block.
    #[error("origPtr {0} out of range for block of {1} symbols")]
    OrigPtrOutOfRange(u32, usize),

    /// A Huffman code-length table was empty (no symbols in use).
    #[error("empty huffman table")]
    EmptyHuffmanTable,

    /// A Huffman code length exceeded bzip2's 20-bit maximum.
    #[error("huffman code length {0} exceeds maximum")]
    HuffmanCodeTooLong(u32),

    /// A Huffman code did not resolve to a valid symbol.
    #[error("invalid huffman code in bitstream")]
    BadHuffmanCode,

    /// The selector group count was outside `2..=6`, or a selector's MTF
    /// index was out of range.
    #[error("invalid selector group")]
    BadSelector,

    /// A run-length-encoded run of 4 identical bytes was not followed by a
    /// count byte before the block ended.
    #[error("truncated run-length-1 count byte")]
    TruncatedRle,

    /// Decoding the Huffman/MTF/run-length symbol stream produced more
    /// symbols than the block's declared size allows.
    #[error("block symbol stream exceeded its declared block size")]
    BlockTooLarge,

    /// A block's CRC32 did not match the value recorded in its header.
    #[error("block crc mismatch: header said {expected:#010x}, computed {computed:#010x}")]
    BlockCrcMismatch {
        /// Expected CRC32 recorded in the block header.
        expected: u32,
        /// Computed CRC32 over the decoded block.
        computed: u32,
    },

    /// The stream's combined CRC32 did not match the value recorded in the footer.
    #[error("stream crc mismatch: footer said {expected:#010x}, computed {computed:#010x}")]
    StreamCrcMismatch {
        /// Expected combined CRC32 recorded in the stream footer.
        expected: u32,
        /// Computed combined CRC32 over all blocks.
        computed: u32,
    },

    /// The input ended before a complete structure could be parsed.
    #[error("truncated bzip2 stream")]
    Truncated,

    /// Non-zero-padding bytes followed the last stream member.
    #[error("trailing bytes after final bzip2 stream")]
    TrailingGarbage,
}

/// Recognized-but-unsupported bzip2 features.
#[derive(Debug, thiserror::Error)]
pub enum UnsupportedError {
    /// The deprecated "randomized" block flag was set; no encoder in
    /// meaningful use ever sets it, and decoding it correctly would require
    /// reproducing an obsolete, rarely-implemented pseudo-random table.
    #[error("randomized blocks are not supported")]
    Randomized,
}

/// Raised when a configured resource limit is exceeded.
#[derive(Debug, thiserror::Error)]
pub struct ResourceLimitError {
    /// Which limit was exceeded, e.g. `"maxBzip2BlockSize"`.
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

/// Internal decode-attempt outcome: distinguishes "ran out of buffered
/// bits, try again once more input arrives" from a genuine format error,
/// mirroring `archive_xz::lzma2`'s whole-chunk buffering precedent but at
/// the granularity of one bzip2 block rather than one LZMA2 chunk.
pub(crate) enum BlockError {
    NeedMore,
    Bad(Error),
}

impl From<Error> for BlockError {
    fn from(e: Error) -> Self {
        BlockError::Bad(e)
    }
}

impl From<FormatError> for BlockError {
    fn from(e: FormatError) -> Self {
        BlockError::Bad(Error::Format(e))
    }
}

impl From<UnsupportedError> for BlockError {
    fn from(e: UnsupportedError) -> Self {
        BlockError::Bad(Error::Unsupported(e))
    }
}

impl From<ResourceLimitError> for BlockError {
    fn from(e: ResourceLimitError) -> Self {
        BlockError::Bad(Error::ResourceLimit(e))
    }
}

impl From<crate::bitreader::NeedMoreBits> for BlockError {
    fn from(_: crate::bitreader::NeedMoreBits) -> Self {
        BlockError::NeedMore
    }
}
