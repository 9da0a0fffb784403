//! LZMA1 decoding primitives as used inside LZMA2 chunks: a range coder,
//! the sliding-window match dictionary, the adaptive probability/state
//! tables, and the per-symbol decode loop built on top of them.

pub mod decoder;
pub mod dictionary;
pub mod range_decoder;
pub mod state;

pub use decoder::LzmaDecoder;
pub use dictionary::Dictionary;
