/// Errors from the `RandomAccess`/block-cache/HTTP-snapshot layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested byte range falls outside the source's known size.
    #[error("invalid range: offset {offset}, length {length}, source size {size}")]
    InvalidRange {
        /// Requested starting offset.
        offset: u64,
        /// Requested length.
        length: u64,
        /// The source's total size, if known.
        size: Option<u64>,
    },

    /// The source cannot report its total size (e.g. chunked HTTP without
    /// `Content-Length`).
    #[error("size unavailable")]
    SizeUnavailable,

    /// An underlying I/O operation failed.
    #[error("I/O error: {0}")]
    IO(#[from] std::io::Error),

    /// A read was cancelled before completing.
    #[error("read cancelled")]
    Cancelled,

    /// An HTTP-layer error, carrying one of the protocol's typed codes.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),
}

/// Typed failure codes for the HTTP snapshot protocol (spec §4.2).
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// A response declared a `Content-Encoding` other than identity/empty.
    #[error("unexpected Content-Encoding: {0}")]
    ContentEncoding(String),

    /// `snapshotPolicy = require-strong-etag` but no strong ETag was present.
    #[error("a strong ETag is required but was not present")]
    StrongEtagRequired,

    /// The remembered snapshot's validators changed between requests, or a
    /// conditional range request returned 200 instead of 206.
    #[error("the remote resource changed during the read")]
    ResourceChanged,

    /// A `Content-Range` header was missing or malformed.
    #[error("malformed or missing Content-Range header")]
    RangeInvalid,

    /// The server ignored the `Range` request and returned a full response
    /// without `Accept-Ranges: bytes`, while the caller requires ranges.
    #[error("server does not support range requests")]
    RangeUnsupported,

    /// The response body was shorter or longer than `Content-Range` promised.
    #[error("response body length did not match Content-Range")]
    BadResponse,

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),
}
