//! Raw byte wrappers used where a field's interpretation (text encoding,
//! extra-field id) is decided by the caller rather than the parser.

use winnow::error::ParserError;
use winnow::stream::{Stream, ToUsize};
use winnow::token::take;
use winnow::{PResult, Partial};

/// A raw, not-yet-decoded name or comment.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct ZipString(pub Vec<u8>);

/// A raw extra-field or other opaque byte payload.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct ZipBytes(pub Vec<u8>);

impl std::fmt::Debug for ZipString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "ZipString({s:?})"),
            Err(_) => write!(f, "ZipString({} bytes, non-utf8)", self.0.len()),
        }
    }
}

impl std::fmt::Debug for ZipBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ZipBytes({} bytes)", self.0.len())
    }
}

impl ZipString {
    /// Build a parser that reads exactly `count` bytes into a [`ZipString`].
    pub fn parser<'i, C: ToUsize + Copy>(
        count: C,
    ) -> impl FnMut(&mut Partial<&'i [u8]>) -> PResult<ZipString> {
        move |i: &mut Partial<&'i [u8]>| {
            let bytes: &[u8] = take(count).parse_next(i)?;
            Ok(ZipString(bytes.to_vec()))
        }
    }
}

impl ZipBytes {
    /// Build a parser that reads exactly `count` bytes into a [`ZipBytes`].
    pub fn parser<'i, C: ToUsize + Copy>(
        count: C,
    ) -> impl FnMut(&mut Partial<&'i [u8]>) -> PResult<ZipBytes> {
        move |i: &mut Partial<&'i [u8]>| {
            let bytes: &[u8] = take(count).parse_next(i)?;
            Ok(ZipBytes(bytes.to_vec()))
        }
    }
}

/// Helper used by several parsers: fail with a generic backtrack error at
/// the current position, for conditions winnow's combinators can't express
/// directly (cross-field validation after a successful token parse).
pub(crate) fn backtrack<'i, O>(i: &mut Partial<&'i [u8]>) -> PResult<O> {
    Err(winnow::error::ErrMode::Backtrack(ParserError::from_error_kind(
        i,
        winnow::error::ErrorKind::Verify,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_string_parser_reads_exact_count() {
        let input = b"hello world";
        let mut p = Partial::new(&input[..]);
        let s = ZipString::parser(5u16)(&mut p).unwrap();
        assert_eq!(s.0, b"hello");
    }
}
