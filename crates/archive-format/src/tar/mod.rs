//! Ustar + PAX TAR reading and deterministic writing (C11).
//!
//! No teacher analogue exists for TAR (`rc-zip` is ZIP-only); grounded on
//! the general ustar/PAX layout and on
//! `examples/other_examples/65199745_phip1611-tar-no-std__src-header.rs.rs`
//! for octal/base-256 field conventions, adapted to an allocating, owned
//! style consistent with the rest of this crate.

mod header;
mod reader;
mod writer;

pub use header::{TarEntry, TarEntryType};
pub use reader::TarReader;
pub use writer::{TarWriter, TarWriterOptions};

/// Size of one TAR header/data block.
pub const BLOCK_SIZE: usize = 512;
