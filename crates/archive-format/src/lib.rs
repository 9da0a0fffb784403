#![warn(missing_docs)]
//! I/O-agnostic ZIP and TAR wire format parsers, sans-I/O state machines,
//! and codec plumbing.
//!
//! This crate never performs I/O itself: callers drive the [`fsm::archive::ArchiveFsm`]
//! and [`fsm::entry::EntryFsm`] state machines by feeding byte slices and
//! inspecting their requests for more input or output space, which keeps the
//! same core usable from blocking readers, HTTP range requests, and async
//! callers alike.

pub mod codec;
pub mod encoding;
pub mod error;
pub mod fsm;
pub mod limits;
pub mod parse;
pub mod tar;

pub use error::Error;
pub use limits::{ArchiveProfile, ResourceLimits};
