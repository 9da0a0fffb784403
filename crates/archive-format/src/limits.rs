//! Resource limits and profiles.
//!
//! Replaces a dynamic options bag with a single recognized-options struct:
//! every field is `Option<T>`, `None` meaning "use the active profile's
//! default". Unknown keys simply cannot exist — they'd be a compile error.

/// Overall strictness/defaults profile for an archive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveProfile {
    /// Lenient: accepts common producer quirks, best-effort decoding.
    Compat,
    /// Strict: fails on any ambiguity or reconciliation mismatch.
    Strict,
    /// Tuned for autonomous agents consuming untrusted archives: accumulates
    /// issues and requires `assertSafe` to pass before further use.
    #[default]
    Agent,
}

/// Recognized, optional resource limits. Every field defaults per-profile
/// when left `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceLimits {
    /// Maximum number of entries in an archive.
    pub max_entries: Option<u64>,
    /// Maximum uncompressed size of any single entry.
    pub max_uncompressed_entry_bytes: Option<u64>,
    /// Maximum total uncompressed bytes across all entries.
    pub max_total_uncompressed_bytes: Option<u64>,
    /// Maximum allowed ratio of uncompressed to compressed bytes.
    pub max_compression_ratio: Option<f64>,
    /// Maximum total input bytes accepted.
    pub max_input_bytes: Option<u64>,
    /// Maximum bytes the ZIP central directory may occupy.
    pub max_zip_central_directory_bytes: Option<u64>,
    /// Maximum bytes for the ZIP archive comment.
    pub max_zip_comment_bytes: Option<u64>,
    /// Maximum bytes to search backward for the EOCD signature (clamped to >= 22).
    pub max_zip_eocd_search_bytes: Option<u64>,
    /// Maximum number of XZ index records to accumulate during preflight.
    pub max_xz_index_records: Option<u64>,
    /// Maximum bytes the XZ index itself may occupy (clamped to >= 8).
    pub max_xz_index_bytes: Option<u64>,
    /// Maximum number of XZ block headers scanned per stream during preflight.
    pub max_xz_preflight_block_headers: Option<u64>,
    /// Maximum LZMA2 dictionary size accepted.
    pub max_xz_dictionary_bytes: Option<u64>,
    /// Maximum bytes an XZ decode stage may buffer internally.
    pub max_xz_buffered_bytes: Option<u64>,
    /// Maximum bzip2 block size accepted (100_000..=900_000).
    pub max_bzip2_block_size: Option<u64>,
    /// Generic dictionary/window cap applied across codecs that allocate one.
    pub max_dictionary_bytes: Option<u64>,
    /// Maximum bytes any single codec transform may buffer upstream.
    pub max_buffered_input_bytes: Option<u64>,
    /// Maximum bytes any single codec transform may emit downstream.
    pub max_output_bytes: Option<u64>,
}

const MIN_EOCD_SEARCH_BYTES: u64 = 22;
const MIN_XZ_INDEX_BYTES: u64 = 8;

impl ResourceLimits {
    /// Build the default limits for `profile`.
    pub fn for_profile(profile: ArchiveProfile) -> Self {
        match profile {
            ArchiveProfile::Compat => Self {
                max_entries: Some(1_000_000),
                max_uncompressed_entry_bytes: Some(16 * 1024 * 1024 * 1024),
                max_total_uncompressed_bytes: Some(64 * 1024 * 1024 * 1024),
                max_compression_ratio: Some(1_032.0),
                max_input_bytes: Some(16 * 1024 * 1024 * 1024),
                max_zip_central_directory_bytes: Some(512 * 1024 * 1024),
                max_zip_comment_bytes: Some(65_535),
                max_zip_eocd_search_bytes: Some(4 * 1024 * 1024),
                max_xz_index_records: Some(1_000_000),
                max_xz_index_bytes: Some(256 * 1024 * 1024),
                max_xz_preflight_block_headers: Some(100_000),
                max_xz_dictionary_bytes: Some(1536 * 1024 * 1024),
                max_xz_buffered_bytes: Some(64 * 1024 * 1024),
                max_bzip2_block_size: Some(900_000),
                max_dictionary_bytes: Some(1536 * 1024 * 1024),
                max_buffered_input_bytes: Some(64 * 1024 * 1024),
                max_output_bytes: Some(64 * 1024 * 1024 * 1024),
            },
            ArchiveProfile::Strict => Self {
                max_entries: Some(100_000),
                max_uncompressed_entry_bytes: Some(4 * 1024 * 1024 * 1024),
                max_total_uncompressed_bytes: Some(16 * 1024 * 1024 * 1024),
                max_compression_ratio: Some(300.0),
                max_input_bytes: Some(4 * 1024 * 1024 * 1024),
                max_zip_central_directory_bytes: Some(64 * 1024 * 1024),
                max_zip_comment_bytes: Some(4096),
                max_zip_eocd_search_bytes: Some(1024 * 1024),
                max_xz_index_records: Some(100_000),
                max_xz_index_bytes: Some(32 * 1024 * 1024),
                max_xz_preflight_block_headers: Some(10_000),
                max_xz_dictionary_bytes: Some(256 * 1024 * 1024),
                max_xz_buffered_bytes: Some(16 * 1024 * 1024),
                max_bzip2_block_size: Some(900_000),
                max_dictionary_bytes: Some(256 * 1024 * 1024),
                max_buffered_input_bytes: Some(16 * 1024 * 1024),
                max_output_bytes: Some(16 * 1024 * 1024 * 1024),
            },
            ArchiveProfile::Agent => Self {
                max_entries: Some(50_000),
                max_uncompressed_entry_bytes: Some(1024 * 1024 * 1024),
                max_total_uncompressed_bytes: Some(4 * 1024 * 1024 * 1024),
                max_compression_ratio: Some(150.0),
                max_input_bytes: Some(512 * 1024 * 1024),
                max_zip_central_directory_bytes: Some(16 * 1024 * 1024),
                max_zip_comment_bytes: Some(4096),
                max_zip_eocd_search_bytes: Some(256 * 1024),
                max_xz_index_records: Some(10_000),
                max_xz_index_bytes: Some(8 * 1024 * 1024),
                max_xz_preflight_block_headers: Some(4_096),
                max_xz_dictionary_bytes: Some(128 * 1024 * 1024),
                max_xz_buffered_bytes: Some(8 * 1024 * 1024),
                max_bzip2_block_size: Some(900_000),
                max_dictionary_bytes: Some(128 * 1024 * 1024),
                max_buffered_input_bytes: Some(8 * 1024 * 1024),
                max_output_bytes: Some(4 * 1024 * 1024 * 1024),
            },
        }
    }

    /// Resolve a value against `profile`'s defaults, applying the open-question
    /// clamp for the EOCD search window (never below 22 bytes, the EOCD's own
    /// fixed minimum size).
    pub fn zip_eocd_search_bytes(&self, profile: ArchiveProfile) -> (u64, bool) {
        let configured = self
            .max_zip_eocd_search_bytes
            .unwrap_or_else(|| Self::for_profile(profile).max_zip_eocd_search_bytes.unwrap());
        if configured < MIN_EOCD_SEARCH_BYTES {
            (MIN_EOCD_SEARCH_BYTES, true)
        } else {
            (configured, false)
        }
    }

    /// Resolve the XZ index byte limit, clamped to the footer's own minimum size.
    pub fn xz_index_bytes(&self, profile: ArchiveProfile) -> u64 {
        let configured = self
            .max_xz_index_bytes
            .unwrap_or_else(|| Self::for_profile(profile).max_xz_index_bytes.unwrap());
        configured.max(MIN_XZ_INDEX_BYTES)
    }

    /// Resolve `max_entries` against `profile`.
    pub fn entries(&self, profile: ArchiveProfile) -> u64 {
        self.max_entries
            .unwrap_or_else(|| Self::for_profile(profile).max_entries.unwrap())
    }

    /// Resolve `max_uncompressed_entry_bytes` against `profile`.
    pub fn uncompressed_entry_bytes(&self, profile: ArchiveProfile) -> u64 {
        self.max_uncompressed_entry_bytes
            .unwrap_or_else(|| Self::for_profile(profile).max_uncompressed_entry_bytes.unwrap())
    }

    /// Resolve `max_total_uncompressed_bytes` against `profile`.
    pub fn total_uncompressed_bytes(&self, profile: ArchiveProfile) -> u64 {
        self.max_total_uncompressed_bytes
            .unwrap_or_else(|| Self::for_profile(profile).max_total_uncompressed_bytes.unwrap())
    }

    /// Resolve `max_zip_central_directory_bytes` against `profile`.
    pub fn zip_central_directory_bytes(&self, profile: ArchiveProfile) -> u64 {
        self.max_zip_central_directory_bytes.unwrap_or_else(|| {
            Self::for_profile(profile).max_zip_central_directory_bytes.unwrap()
        })
    }

    /// Resolve `max_zip_comment_bytes` against `profile`.
    pub fn zip_comment_bytes(&self, profile: ArchiveProfile) -> u64 {
        self.max_zip_comment_bytes
            .unwrap_or_else(|| Self::for_profile(profile).max_zip_comment_bytes.unwrap())
    }

    /// Resolve `max_xz_dictionary_bytes` against `profile`.
    pub fn xz_dictionary_bytes(&self, profile: ArchiveProfile) -> u64 {
        self.max_xz_dictionary_bytes
            .unwrap_or_else(|| Self::for_profile(profile).max_xz_dictionary_bytes.unwrap())
    }

    /// Resolve `max_xz_index_records` against `profile`.
    pub fn xz_index_records(&self, profile: ArchiveProfile) -> u64 {
        self.max_xz_index_records
            .unwrap_or_else(|| Self::for_profile(profile).max_xz_index_records.unwrap())
    }

    /// Resolve `max_xz_preflight_block_headers` against `profile`.
    pub fn xz_preflight_block_headers(&self, profile: ArchiveProfile) -> u64 {
        self.max_xz_preflight_block_headers.unwrap_or_else(|| {
            Self::for_profile(profile).max_xz_preflight_block_headers.unwrap()
        })
    }
}
