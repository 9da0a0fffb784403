//! LZMA2 chunk framing (spec §4.4 step 5): the control-byte protocol that
//! wraps a sequence of LZMA1 payloads (and raw/uncompressed runs) inside a
//! single filter stream, plus the dictionary-size-from-property formula.

use crate::error::Error;
use crate::lzma::{Dictionary, LzmaDecoder};

/// Decode an LZMA2 property byte (spec §4.5, the single byte carried in the
/// LZMA2 filter's properties) into a dictionary size in bytes.
pub fn dict_size_from_prop(prop: u8) -> Result<u32, Error> {
    if prop > 40 {
        return Err(crate::error::UnsupportedError::BadDictSizeBits(prop).into());
    }
    if prop == 40 {
        return Ok(u32::MAX);
    }
    let bits = prop as u32;
    Ok((2 | (bits & 1)) << (bits / 2 + 11))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkKind {
    EndOfStream,
    Uncompressed { reset_dict: bool },
    Lzma { reset: LzmaReset },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum LzmaReset {
    None,
    State,
    StateNewProps,
    StateNewPropsResetDict,
}

fn classify(control: u8) -> Result<ChunkKind, Error> {
    match control {
        0x00 => Ok(ChunkKind::EndOfStream),
        0x01 => Ok(ChunkKind::Uncompressed { reset_dict: true }),
        0x02 => Ok(ChunkKind::Uncompressed { reset_dict: false }),
        c if c & 0x80 != 0 => {
            let reset = match (c >> 5) & 0x3 {
                0 => LzmaReset::None,
                1 => LzmaReset::State,
                2 => LzmaReset::StateNewProps,
                3 => LzmaReset::StateNewPropsResetDict,
                _ => unreachable!(),
            };
            Ok(ChunkKind::Lzma { reset })
        }
        other => Err(Error::LzmaDecode(format!("invalid lzma2 control byte {other:#x}"))),
    }
}

/// Decodes a complete LZMA2 byte stream (the plaintext a block's LZMA2
/// filter produces) by buffering whole chunks before invoking the LZMA
/// range decoder on each one, per the "no bit-level resumability" design
/// described in [`crate::lzma::range_decoder`].
pub struct Lzma2Decoder {
    dict: Dictionary,
    lzma: Option<LzmaDecoder>,
    input: Vec<u8>,
    finished: bool,
    props_seen: bool,
    /// Bytes written to the dictionary since the last reset, before an
    /// [`LzmaDecoder`] exists to track them itself (leading uncompressed
    /// chunks may precede the first properties byte).
    leading_pos: u64,
}

impl Lzma2Decoder {
    /// Build a decoder with a dictionary sized per the filter's properties
    /// byte. Callers are expected to have already checked `dict_size`
    /// against their own resource limits before constructing this decoder.
    pub fn new(dict_size: u32) -> Self {
        Lzma2Decoder {
            dict: Dictionary::new(dict_size.max(4096) as usize),
            lzma: None,
            input: Vec::new(),
            finished: false,
            props_seen: false,
            leading_pos: 0,
        }
    }

    /// True once an end-of-stream control byte has been consumed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed more raw LZMA2-filter bytes and decode as many whole chunks as
    /// are now available, appending decoded plaintext to `out`.
    pub fn push(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
        self.input.extend_from_slice(data);
        loop {
            if self.finished {
                return Ok(());
            }
            match self.try_decode_one(out)? {
                true => continue,
                false => return Ok(()),
            }
        }
    }

    /// Attempt to parse and decode exactly one chunk from the front of
    /// `self.input`. Returns `Ok(true)` if a chunk was consumed, `Ok(false)`
    /// if more input is needed.
    fn try_decode_one(&mut self, out: &mut Vec<u8>) -> Result<bool, Error> {
        if self.input.is_empty() {
            return Ok(false);
        }
        let control = self.input[0];
        let kind = classify(control)?;

        match kind {
            ChunkKind::EndOfStream => {
                self.input.drain(..1);
                self.finished = true;
                Ok(true)
            }
            ChunkKind::Uncompressed { reset_dict } => {
                if self.input.len() < 3 {
                    return Ok(false);
                }
                let size = (u16::from_be_bytes([self.input[1], self.input[2]]) as usize) + 1;
                if self.input.len() < 3 + size {
                    return Ok(false);
                }
                if reset_dict {
                    self.dict.reset();
                    self.leading_pos = 0;
                    if let Some(d) = &mut self.lzma {
                        d.reset_position();
                    }
                }
                let payload = self.input[3..3 + size].to_vec();
                for &b in &payload {
                    self.dict.push(b);
                }
                out.extend_from_slice(&payload);
                match &mut self.lzma {
                    Some(d) => d.add_position(payload.len() as u64),
                    None => self.leading_pos += payload.len() as u64,
                }
                self.input.drain(..3 + size);
                Ok(true)
            }
            ChunkKind::Lzma { reset } => {
                let header_len = if reset >= LzmaReset::StateNewProps { 6 } else { 5 };
                if self.input.len() < header_len {
                    return Ok(false);
                }
                let unpacked_size =
                    (((control & 0x1F) as usize) << 16 | (self.input[1] as usize) << 8 | self.input[2] as usize) + 1;
                let compressed_size = (u16::from_be_bytes([self.input[3], self.input[4]]) as usize) + 1;
                let props_byte = if reset >= LzmaReset::StateNewProps { Some(self.input[5]) } else { None };

                let total_len = header_len + compressed_size;
                if self.input.len() < total_len {
                    return Ok(false);
                }

                if reset == LzmaReset::StateNewPropsResetDict {
                    self.dict.reset();
                    self.leading_pos = 0;
                    if let Some(d) = &mut self.lzma {
                        d.reset_position();
                    }
                }

                if let Some(p) = props_byte {
                    let (lc, lp, pb) = decode_props_byte(p)?;
                    match &mut self.lzma {
                        Some(d) => d.set_props(lc, lp, pb),
                        None => {
                            let mut d = LzmaDecoder::new(lc, lp, pb);
                            d.set_position(self.leading_pos);
                            self.lzma = Some(d);
                        }
                    }
                    self.props_seen = true;
                } else if reset == LzmaReset::State {
                    let d = self
                        .lzma
                        .as_mut()
                        .ok_or_else(|| Error::LzmaDecode("lzma2 state reset before any properties byte seen".into()))?;
                    d.reset_state();
                } else if !self.props_seen {
                    return Err(Error::LzmaDecode("lzma2 chunk with no reset before any properties byte seen".into()));
                }

                let lzma = self.lzma.as_mut().expect("properties established above");
                let payload = &self.input[header_len..total_len];
                let mut rc = crate::lzma::range_decoder::RangeDecoder::new(payload)?;
                lzma.decode_chunk(&mut rc, &mut self.dict, unpacked_size as u64, out)?;
                if rc.consumed() != payload.len() {
                    return Err(Error::LzmaDecode("lzma2 chunk had trailing unconsumed compressed bytes".into()));
                }

                self.input.drain(..total_len);
                Ok(true)
            }
        }
    }
}

/// Decode the single LZMA properties byte into (lc, lp, pb), per the
/// classic `props = (pb * 5 + lp) * 9 + lc` packing.
fn decode_props_byte(props: u8) -> Result<(u32, u32, u32), Error> {
    let mut d = props as u32;
    if d >= 9 * 5 * 5 {
        return Err(Error::LzmaDecode(format!("invalid lzma properties byte {props:#x}")));
    }
    let lc = d % 9;
    d /= 9;
    let lp = d % 5;
    let pb = d / 5;
    Ok((lc, lp, pb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dict_size_formula_matches_known_values() {
        assert_eq!(dict_size_from_prop(0).unwrap(), 1 << 12);
        assert_eq!(dict_size_from_prop(40).unwrap(), u32::MAX);
    }

    #[test]
    fn uncompressed_chunk_roundtrips() {
        let mut dec = Lzma2Decoder::new(1 << 16);
        let payload = b"hello world";
        let mut input = vec![0x01, 0x00, (payload.len() - 1) as u8];
        input.extend_from_slice(payload);
        input.push(0x00);
        let mut out = Vec::new();
        dec.push(&input, &mut out).unwrap();
        assert_eq!(out, payload);
        assert!(dec.is_finished());
    }

    #[test]
    fn props_byte_packing_roundtrips() {
        for lc in 0..4u32 {
            for lp in 0..3u32 {
                for pb in 0..3u32 {
                    let packed = ((pb * 5 + lp) * 9 + lc) as u8;
                    assert_eq!(decode_props_byte(packed).unwrap(), (lc, lp, pb));
                }
            }
        }
    }
}
