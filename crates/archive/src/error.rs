//! Stable, schema-versioned error model (C15).
//!
//! Every [`Error`] carries a stable code, a human message, optional entry
//! name/offset, and a sanitized context map safe to log or serialize as
//! JSON. Numeric context values that could exceed `2^53` are serialized as
//! decimal strings so a JSON consumer never silently loses precision.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Current schema version stamped on every serialized report/error.
pub const SCHEMA_VERSION: &str = "1";

/// The top-level error type returned by every fallible operation in this
/// crate (§4.14, §7's taxonomy of kinds).
#[derive(Debug)]
pub struct Error {
    /// Stable, machine-readable code (e.g. `ZIP_BAD_CRC`).
    pub code: &'static str,
    /// Human-readable description.
    pub message: String,
    /// The entry this error pertains to, if any.
    pub entry_name: Option<String>,
    /// A byte offset into the archive relevant to this error, if any.
    pub offset: Option<u64>,
    /// Additional machine-readable context, sanitized on construction.
    pub context: BTreeMap<String, String>,
    /// The underlying cause, if this error wraps one.
    pub cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|c| c.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Keys that collide with top-level serialized fields and are stripped from
/// `context` on construction, so a caller can't accidentally shadow them.
const RESERVED_CONTEXT_KEYS: &[&str] = &["code", "message", "entryName", "offset", "schemaVersion"];

impl Error {
    /// Build an error with a stable `code` and message, no context.
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Error {
            code,
            message: message.into(),
            entry_name: None,
            offset: None,
            context: BTreeMap::new(),
            cause: None,
        }
    }

    /// Attach the entry name this error pertains to.
    pub fn with_entry(mut self, name: impl Into<String>) -> Self {
        self.entry_name = Some(name.into());
        self
    }

    /// Attach a byte offset relevant to this error.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Merge sanitized key/value context, dropping any keys that shadow a
    /// top-level field.
    pub fn with_context(mut self, pairs: impl IntoIterator<Item = (&'static str, String)>) -> Self {
        for (k, v) in pairs {
            if !RESERVED_CONTEXT_KEYS.contains(&k) {
                self.context.insert(k.to_string(), v);
            }
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// A numeric value rendered as a decimal string, for use in
    /// [`Self::with_context`] — the wire contract for any field that could
    /// exceed `2^53`.
    pub fn number(n: u64) -> String {
        n.to_string()
    }

    /// Render this error as its JSON-safe serialized form.
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            schema_version: SCHEMA_VERSION,
            code: self.code,
            message: self.message.clone(),
            entry_name: self.entry_name.clone(),
            offset: self.offset.map(|o| o.to_string()),
            context: self.context.clone(),
        }
    }
}

impl From<archive_format::Error> for Error {
    fn from(e: archive_format::Error) -> Self {
        let code = format_error_code(&e);
        Error::new(code, e.to_string())
    }
}

impl From<archive_io::Error> for Error {
    fn from(e: archive_io::Error) -> Self {
        Error::new(io_error_code(&e), e.to_string())
    }
}

impl From<archive_xz::Error> for Error {
    fn from(e: archive_xz::Error) -> Self {
        Error::new("COMPRESSION_XZ_ERROR", e.to_string())
    }
}

impl From<archive_bzip2::Error> for Error {
    fn from(e: archive_bzip2::Error) -> Self {
        Error::new("COMPRESSION_BZIP2_ERROR", e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::new("ARCHIVE_IO_ERROR", e.to_string())
    }
}

/// Best-effort mapping from an `archive_format::Error` to one of the stable
/// codes named across spec §4/§8 (ZIP_*, ARCHIVE_*).
fn format_error_code(e: &archive_format::Error) -> &'static str {
    use archive_format::Error as E;
    match e {
        E::Format(fe) => {
            use archive_format::FormatError as F;
            match fe {
                F::DirectoryEndSignatureNotFound => "ZIP_BAD_CENTRAL_DIRECTORY",
                F::Directory64EndRecordInvalid => "ZIP_BAD_ZIP64",
                F::DirectoryOffsetPointsOutsideFile => "ZIP_BAD_CENTRAL_DIRECTORY",
                F::InvalidCentralRecord { .. } => "ZIP_BAD_CENTRAL_DIRECTORY",
                F::InvalidExtraField => "ZIP_BAD_CENTRAL_DIRECTORY",
                F::InvalidHeaderOffset => "ZIP_BAD_CENTRAL_DIRECTORY",
                F::ImpossibleNumberOfFiles { .. } => "ZIP_BAD_CENTRAL_DIRECTORY",
                F::InvalidLocalHeader => "ZIP_BAD_LOCAL_HEADER",
                F::InvalidDataDescriptor => "ZIP_BAD_LOCAL_HEADER",
                F::MultiDiskUnsupported => "ZIP_UNSUPPORTED_FEATURE",
                F::WrongSize { .. } => "ZIP_BAD_CRC",
                F::WrongChecksum { .. } => "ZIP_BAD_CRC",
                F::Truncated => "ZIP_TRUNCATED",
                F::TrailingBytes => "ZIP_TRAILING_BYTES",
            }
        }
        E::Unsupported(_) => "ZIP_UNSUPPORTED_FEATURE",
        E::Encoding(_) => "ZIP_BAD_ENCODING",
        E::IO(_) => "ARCHIVE_IO_ERROR",
        E::Decompression { .. } => "COMPRESSION_DECODE_ERROR",
        E::UnknownSize => "ARCHIVE_UNKNOWN_SIZE",
        E::ResourceLimit(_) => "COMPRESSION_RESOURCE_LIMIT",
        E::PathSafety(_) => "ARCHIVE_PATH_TRAVERSAL",
        E::Cancelled => "ARCHIVE_CANCELLED",
        E::Internal(_) => "ARCHIVE_INTERNAL_ERROR",
    }
}

// The only `archive_io::Error` producer reachable today is `BlockCache`/
// `RandomAccess` in `reader.rs`'s ZIP path (TAR/single-file reads are fully
// materialized over `std::io::Read`, never through `archive_io`), so every
// HTTP-layer error surfaces as `ZIP_HTTP_*`, matching spec §4.2 step 9 and
// end-to-end scenario 4's `ZIP_HTTP_RESOURCE_CHANGED`.
fn io_error_code(e: &archive_io::Error) -> &'static str {
    use archive_io::Error as E;
    match e {
        E::Cancelled => "ARCHIVE_CANCELLED",
        E::InvalidRange { .. } => "ARCHIVE_INVALID_RANGE",
        E::SizeUnavailable => "ARCHIVE_UNKNOWN_SIZE",
        E::IO(_) => "ARCHIVE_IO_ERROR",
        E::Http(http_err) => http_error_code(http_err),
    }
}

fn http_error_code(e: &archive_io::http::HttpError) -> &'static str {
    use archive_io::http::HttpError as H;
    match e {
        H::ContentEncoding(_) => "ZIP_HTTP_CONTENT_ENCODING",
        H::StrongEtagRequired => "ZIP_HTTP_STRONG_ETAG_REQUIRED",
        H::ResourceChanged => "ZIP_HTTP_RESOURCE_CHANGED",
        H::RangeInvalid => "ZIP_HTTP_RANGE_INVALID",
        H::BadResponse => "ZIP_HTTP_BAD_RESPONSE",
        H::RangeUnsupported => "ZIP_HTTP_RANGE_UNSUPPORTED",
        H::Transport(_) => "ZIP_HTTP_BAD_RESPONSE",
    }
}

/// The JSON-safe wire form of an [`Error`] (§4.14, §6 "Reports").
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    #[serde(rename = "schemaVersion")]
    schema_version: &'static str,
    code: &'static str,
    message: String,
    #[serde(rename = "entryName", skip_serializing_if = "Option::is_none")]
    entry_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<String>,
    context: BTreeMap<String, String>,
}
