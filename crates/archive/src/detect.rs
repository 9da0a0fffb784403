//! Format and container detection (C12, spec §4.11).
//!
//! Detection reads a small fixed prefix to identify a wrapper compression
//! format or a bare container, then — for compression wrappers — peeks past
//! the decompressed head to tell a `tar.<wrapper>` from a single
//! compressed file. Brotli carries no magic at all (open question (b) in
//! spec §9): it is only ever detected from an explicit `format` hint or a
//! `.br`/`.tar.br` filename.

use crate::error::Error;

/// The closed set of logical archive formats (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// A ZIP container.
    Zip,
    /// A bare ustar/PAX TAR stream.
    Tar,
    /// A single gzip-compressed file.
    Gz,
    /// A gzip-compressed TAR stream.
    Tgz,
    /// A single bzip2-compressed file.
    Bz2,
    /// A bzip2-compressed TAR stream.
    TarBz2,
    /// A single XZ-compressed file.
    Xz,
    /// An XZ-compressed TAR stream.
    TarXz,
    /// A single Zstandard-compressed file.
    Zst,
    /// A Zstandard-compressed TAR stream.
    TarZst,
    /// A single Brotli-compressed file.
    Br,
    /// A Brotli-compressed TAR stream.
    TarBr,
}

impl ArchiveFormat {
    /// The compression wrapper this format layers over its content, if any.
    pub fn wrapper(self) -> Option<CompressionWrapper> {
        use ArchiveFormat::*;
        match self {
            Zip | Tar => None,
            Gz | Tgz => Some(CompressionWrapper::Gzip),
            Bz2 | TarBz2 => Some(CompressionWrapper::Bzip2),
            Xz | TarXz => Some(CompressionWrapper::Xz),
            Zst | TarZst => Some(CompressionWrapper::Zstd),
            Br | TarBr => Some(CompressionWrapper::Brotli),
        }
    }

    /// True if this format's content (after unwrapping compression, if any)
    /// is a TAR stream rather than a single file or a ZIP.
    pub fn is_tar_container(self) -> bool {
        use ArchiveFormat::*;
        matches!(self, Tar | Tgz | TarBz2 | TarXz | TarZst | TarBr)
    }

    fn for_wrapper_and_tar(wrapper: CompressionWrapper, is_tar: bool) -> Self {
        use ArchiveFormat::*;
        match (wrapper, is_tar) {
            (CompressionWrapper::Gzip, false) => Gz,
            (CompressionWrapper::Gzip, true) => Tgz,
            (CompressionWrapper::Bzip2, false) => Bz2,
            (CompressionWrapper::Bzip2, true) => TarBz2,
            (CompressionWrapper::Xz, false) => Xz,
            (CompressionWrapper::Xz, true) => TarXz,
            (CompressionWrapper::Zstd, false) => Zst,
            (CompressionWrapper::Zstd, true) => TarZst,
            (CompressionWrapper::Brotli, false) => Br,
            (CompressionWrapper::Brotli, true) => TarBr,
        }
    }
}

/// The compression codec a non-ZIP, non-bare-TAR archive is wrapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionWrapper {
    /// RFC 1952 gzip.
    Gzip,
    /// bzip2.
    Bzip2,
    /// XZ (LZMA2 container).
    Xz,
    /// Zstandard.
    Zstd,
    /// Brotli.
    Brotli,
}

/// How confident the detector is in its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionConfidence {
    /// A structural signature (magic bytes, or a magicless format's
    /// required hint) matched unambiguously.
    High,
    /// The wrapper matched but a peek into the decompressed head was
    /// inconclusive (e.g. too short to see ustar's magic at offset 257),
    /// so the tar-vs-single-file call fell back to the filename extension.
    Medium,
}

/// What a peek into the decompressed head of a compression wrapper found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedLayers {
    /// The outermost container kind.
    pub container: DetectedContainer,
    /// The compression wrapper, if any.
    pub compression: Option<CompressionWrapper>,
}

/// The innermost logical container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedContainer {
    /// A ZIP central-directory archive.
    Zip,
    /// A ustar/PAX TAR stream.
    Tar,
    /// A single opaque (non-container) file.
    SingleFile,
}

/// The result of running format/container detection over an input's head
/// bytes (§4.11's `ArchiveDetectionReport`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDetectionReport {
    /// The detected logical format.
    pub format: ArchiveFormat,
    /// Container/compression layer breakdown, outermost first.
    pub layers: Vec<Layer>,
    /// How the container (tar vs single-file) was determined for
    /// compression-wrapped inputs.
    pub confidence: DetectionConfidence,
    /// Human-readable detection notes (e.g. why brotli was/wasn't accepted).
    pub notes: Vec<String>,
}

/// One layer in a detection report's `layers` list, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// A gzip wrapper.
    Gzip,
    /// A bzip2 wrapper.
    Bzip2,
    /// An XZ wrapper.
    Xz,
    /// A Zstandard wrapper.
    Zstd,
    /// A Brotli wrapper.
    Brotli,
    /// A TAR container.
    Tar,
    /// A ZIP container.
    Zip,
}

const ZIP_LFH_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const ZIP_EOCD_MAGIC: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];
const ZIP_EMPTY_MAGIC: [u8; 4] = [0x50, 0x4B, 0x05, 0x05]; // spanned-archive signature, rejected downstream
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const BZIP2_MAGIC: [u8; 3] = *b"BZh";
const XZ_MAGIC: [u8; 6] = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
const USTAR_MAGIC: &[u8] = b"ustar";
const USTAR_OFFSET: usize = 257;

/// A filename-derived hint used to disambiguate magicless formats (brotli)
/// and to infer the logical entry name for single-file-compressed inputs.
#[derive(Debug, Clone, Default)]
pub struct DetectHint {
    /// The caller-supplied filename, if any (e.g. `"data.tar.br"`).
    pub filename: Option<String>,
    /// An explicit format override, bypassing magic-byte sniffing entirely.
    pub format: Option<ArchiveFormat>,
}

/// Detect the archive format from up to the first 512 bytes of `head`, plus
/// (for compression wrappers) a caller-supplied decompressed peek.
///
/// `decompressed_peek` should be the first ~512 bytes the wrapper decodes
/// to, when the caller already has them (used to distinguish `tar.<x>` from
/// a bare single compressed file). Pass `None` when unavailable; detection
/// falls back to the filename hint with [`DetectionConfidence::Medium`].
pub fn detect(
    head: &[u8],
    decompressed_peek: Option<&[u8]>,
    hint: &DetectHint,
) -> Result<ArchiveDetectionReport, Error> {
    if let Some(format) = hint.format {
        return Ok(explicit_report(format));
    }

    if head.len() >= 4 && (head[0..4] == ZIP_LFH_MAGIC || head[0..4] == ZIP_EOCD_MAGIC) {
        return Ok(ArchiveDetectionReport {
            format: ArchiveFormat::Zip,
            layers: vec![Layer::Zip],
            confidence: DetectionConfidence::High,
            notes: vec![],
        });
    }
    if head.len() >= 4 && head[0..4] == ZIP_EMPTY_MAGIC {
        return Err(Error::new("ARCHIVE_UNSUPPORTED_FEATURE", "spanned ZIP archives are not supported"));
    }
    if head.len() > USTAR_OFFSET + 5 && &head[USTAR_OFFSET..USTAR_OFFSET + 5] == USTAR_MAGIC {
        return Ok(ArchiveDetectionReport {
            format: ArchiveFormat::Tar,
            layers: vec![Layer::Tar],
            confidence: DetectionConfidence::High,
            notes: vec![],
        });
    }

    let wrapper = if head.len() >= 2 && head[0..2] == GZIP_MAGIC {
        Some(CompressionWrapper::Gzip)
    } else if head.len() >= 3 && head[0..3] == BZIP2_MAGIC {
        Some(CompressionWrapper::Bzip2)
    } else if head.len() >= 6 && head[0..6] == XZ_MAGIC {
        Some(CompressionWrapper::Xz)
    } else if head.len() >= 4 && head[0..4] == ZSTD_MAGIC {
        Some(CompressionWrapper::Zstd)
    } else {
        None
    };

    if let Some(wrapper) = wrapper {
        return Ok(wrapped_report(wrapper, decompressed_peek, hint));
    }

    // Brotli has no magic: only accept it via an explicit format or a
    // `.br`/`.tar.br` filename, per spec §4.11/§9 open question (b).
    if let Some(name) = &hint.filename {
        if name.ends_with(".tar.br") || name.ends_with(".br") {
            return Ok(wrapped_report(CompressionWrapper::Brotli, decompressed_peek, hint));
        }
    }

    Err(Error::new("ARCHIVE_FORMAT_UNRECOGNIZED", "could not determine archive format from input head"))
}

fn explicit_report(format: ArchiveFormat) -> ArchiveDetectionReport {
    let mut layers = Vec::new();
    if let Some(w) = format.wrapper() {
        layers.push(wrapper_layer(w));
    }
    if format.is_tar_container() {
        layers.push(Layer::Tar);
    }
    if matches!(format, ArchiveFormat::Zip) {
        layers.push(Layer::Zip);
    }
    ArchiveDetectionReport {
        format,
        layers,
        confidence: DetectionConfidence::High,
        notes: vec!["format forced via explicit hint".into()],
    }
}

fn wrapper_layer(w: CompressionWrapper) -> Layer {
    match w {
        CompressionWrapper::Gzip => Layer::Gzip,
        CompressionWrapper::Bzip2 => Layer::Bzip2,
        CompressionWrapper::Xz => Layer::Xz,
        CompressionWrapper::Zstd => Layer::Zstd,
        CompressionWrapper::Brotli => Layer::Brotli,
    }
}

fn wrapped_report(
    wrapper: CompressionWrapper,
    decompressed_peek: Option<&[u8]>,
    hint: &DetectHint,
) -> ArchiveDetectionReport {
    let mut notes = Vec::new();
    let (is_tar, confidence) = match decompressed_peek {
        Some(peek) if peek.len() > USTAR_OFFSET + 5 => {
            (&peek[USTAR_OFFSET..USTAR_OFFSET + 5] == USTAR_MAGIC, DetectionConfidence::High)
        }
        _ => {
            let by_name = hint
                .filename
                .as_ref()
                .map(|n| n.contains(".tar."))
                .unwrap_or(false);
            notes.push("decompressed peek too short to see ustar magic; fell back to filename hint".into());
            (by_name, DetectionConfidence::Medium)
        }
    };
    let format = ArchiveFormat::for_wrapper_and_tar(wrapper, is_tar);
    let mut layers = vec![wrapper_layer(wrapper)];
    if is_tar {
        layers.push(Layer::Tar);
    }
    ArchiveDetectionReport { format, layers, confidence, notes }
}

/// Derive the logical entry name for a single-file-compressed archive by
/// stripping the wrapper's extension from a caller-supplied filename,
/// defaulting to `"data"` when no filename is known (spec §4.11).
pub fn single_file_entry_name(format: ArchiveFormat, filename: Option<&str>) -> String {
    let Some(name) = filename else { return "data".to_string() };
    let suffix = match format {
        ArchiveFormat::Gz => ".gz",
        ArchiveFormat::Bz2 => ".bz2",
        ArchiveFormat::Xz => ".xz",
        ArchiveFormat::Zst => ".zst",
        ArchiveFormat::Br => ".br",
        _ => return name.to_string(),
    };
    name.strip_suffix(suffix).unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_zip_local_header_magic() {
        let report = detect(&ZIP_LFH_MAGIC, None, &DetectHint::default()).unwrap();
        assert_eq!(report.format, ArchiveFormat::Zip);
    }

    #[test]
    fn detects_gzip_wrapping_tar_from_peek() {
        let mut head = GZIP_MAGIC.to_vec();
        head.extend_from_slice(&[0u8; 8]);
        let mut peek = vec![0u8; USTAR_OFFSET + 5];
        peek[USTAR_OFFSET..USTAR_OFFSET + 5].copy_from_slice(USTAR_MAGIC);
        let report = detect(&head, Some(&peek), &DetectHint::default()).unwrap();
        assert_eq!(report.format, ArchiveFormat::Tgz);
        assert_eq!(report.confidence, DetectionConfidence::High);
    }

    #[test]
    fn brotli_requires_hint() {
        let head = [0u8; 16];
        let err = detect(&head, None, &DetectHint::default());
        assert!(err.is_err());
        let hint = DetectHint { filename: Some("archive.tar.br".into()), format: None };
        let report = detect(&head, None, &hint).unwrap();
        assert_eq!(report.format, ArchiveFormat::TarBr);
        assert_eq!(report.confidence, DetectionConfidence::Medium);
    }

    #[test]
    fn single_file_name_strips_wrapper_extension() {
        assert_eq!(single_file_entry_name(ArchiveFormat::Gz, Some("notes.txt.gz")), "notes.txt");
        assert_eq!(single_file_entry_name(ArchiveFormat::Gz, None), "data");
    }
}
