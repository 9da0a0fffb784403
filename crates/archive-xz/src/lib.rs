//! Pure-Rust XZ/LZMA2 decoder (C6) with its BCJ/Delta filter chain and a
//! seekable index preflight (C7) that proves resource bounds from a
//! stream's tail before a single byte is decompressed.
//!
//! This crate never reaches for a host `liblzma`: every stream/block/LZMA2
//! primitive here is a from-scratch decoder, so it degrades gracefully in
//! environments where no system compression library is installed.

pub mod block;
mod crc64;
pub mod decoder;
pub mod error;
pub mod filters;
pub mod index;
pub mod lzma;
pub mod lzma2;
pub mod preflight;
pub mod stream;
pub mod vli;

pub use decoder::{DecoderLimits, Outcome, StreamDecoder};
pub use error::{Error, FormatError, ResourceLimitError, UnsupportedError};
pub use preflight::{PreflightLimits, PreflightReport, TailSource};
