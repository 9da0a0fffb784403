//! Pure-Rust bzip2 block decoder (C8): Huffman + MTF + inverse-BWT + RLE,
//! with the combined stream CRC check from spec §4.7.
//!
//! Like `archive_xz`, this crate exists so the library never needs a host
//! `libbz2`: every stage here is a from-scratch decoder over the bzip2
//! block format.

mod bitreader;
mod bwt;
pub mod crc;
pub mod decoder;
pub mod error;
mod huffman;
mod mtf;
mod rle;

pub use decoder::{DecoderLimits, Outcome, StreamDecoder};
pub use error::{Error, FormatError, ResourceLimitError, UnsupportedError};
