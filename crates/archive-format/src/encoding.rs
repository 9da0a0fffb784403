//! Name and comment decoding for ZIP entries.
//!
//! ZIP names are not reliably UTF-8: the general-purpose bit 11 flag
//! (`EFS`, language encoding flag) tells us when a producer *claims* UTF-8;
//! otherwise the historical default is CP437, with Shift-JIS a common
//! alternative in East-Asian-built archives.

use std::fmt;

/// The three encodings ZIP names or comments may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// UTF-8, as declared by the language-encoding flag or Info-ZIP unicode extra.
    Utf8,
    /// IBM/MS-DOS code page 437.
    Cp437,
    /// Shift-JIS (common in Japanese-built archives).
    ShiftJis,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Cp437 => "cp437",
            Encoding::ShiftJis => "shift-jis",
        })
    }
}

/// Where a decoded name ultimately came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    /// Decoded as UTF-8 because the language-encoding flag (bit 11) was set.
    Utf8Flag,
    /// Decoded as CP437 (the historical default, or a detected fallback).
    Cp437,
    /// Adopted from an Info-ZIP Unicode Path/Comment extra field whose CRC matched.
    UnicodeExtra,
}

/// Errors raised while decoding bytes with a declared [`Encoding`].
#[derive(Debug, thiserror::Error)]
pub enum DecodingError {
    /// The bytes were not valid UTF-8.
    #[error("invalid utf-8")]
    Utf8Error,
    /// The decoded string would exceed a configured size limit.
    #[error("decoded string too large")]
    StringTooLarge,
    /// A non-UTF-8 encoding reported a decode failure.
    #[error("encoding error")]
    EncodingError,
}

/// Decode `bytes` using `encoding`, returning an owned `String`.
pub fn decode(bytes: &[u8], encoding: Encoding) -> Result<String, DecodingError> {
    match encoding {
        Encoding::Utf8 => std::str::from_utf8(bytes)
            .map(|s| s.to_string())
            .map_err(|_| DecodingError::Utf8Error),
        Encoding::Cp437 => Ok(oem_cp::decode_string_complete_table(
            bytes,
            oem_cp::code_table::DECODING_TABLE_CP437,
        )),
        Encoding::ShiftJis => {
            let (cow, _, had_errors) = encoding_rs::SHIFT_JIS.decode(bytes);
            if had_errors {
                Err(DecodingError::EncodingError)
            } else {
                Ok(cow.into_owned())
            }
        }
    }
}

/// Decode `bytes` as UTF-8 if well-formed, else fall back to CP437 or
/// Shift-JIS depending on a heuristic, mirroring what the ZIP ecosystem has
/// converged on for archives that do not set the language-encoding flag.
pub fn detect_utf8(bytes: &[u8]) -> (String, Encoding) {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return (s.to_string(), Encoding::Utf8);
    }
    if is_likely_shift_jis(bytes) {
        if let Ok(s) = decode(bytes, Encoding::ShiftJis) {
            return (s, Encoding::ShiftJis);
        }
    }
    // CP437 has a total decode function over all 256 byte values: it never fails.
    let s = decode(bytes, Encoding::Cp437).unwrap_or_default();
    (s, Encoding::Cp437)
}

/// A conservative heuristic: ask `chardetng`, but reject the guess if the
/// bytes contain values in the CP437 box-drawing range (0xB0-0xDF) that are
/// vanishingly rare in real Shift-JIS text but extremely common in DOS-era
/// box-drawing filenames and banners — the single largest source of false
/// positives for naive Shift-JIS detectors.
fn is_likely_shift_jis(bytes: &[u8]) -> bool {
    if bytes.iter().any(|&b| (0xb0..=0xdf).contains(&b)) {
        return false;
    }
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let (enc, _confident) = detector.guess_assess(None, true);
    enc == encoding_rs::SHIFT_JIS
}

/// Returns true if `bytes` most likely are not meant to be interpreted as
/// CP437 — used to decide whether to attempt detection at all for a given
/// name/comment before falling back to the CP437 default.
pub fn is_entry_non_utf8(general_purpose_flags: u16) -> bool {
    // Bit 11: language encoding flag (EFS), per APPNOTE 4.4.4.
    general_purpose_flags & 0x0800 == 0
}
