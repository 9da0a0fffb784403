#![warn(missing_docs)]
//! Uniform random-access byte-range reading, an LRU block cache, and an
//! HTTP range-request protocol that behaves as though it reads a single
//! immutable snapshot (C1, C2, C3).

pub mod cache;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod random_access;

pub use cache::BlockCache;
pub use error::Error;
pub use random_access::{CancelToken, MemoryAccess, RandomAccess};
#[cfg(feature = "file")]
pub use random_access::FileAccess;
#[cfg(feature = "http")]
pub use http::{HttpAccess, SnapshotPolicy};
