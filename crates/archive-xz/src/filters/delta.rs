//! Delta filter (spec §4.5): `out[i] = input[i] + out[i - distance]`,
//! implemented as a 256-byte circular history of already-decoded bytes.

/// Decoding state for one Delta filter instance. `distance` is fixed for
/// the lifetime of the filter (1..=256, from the filter's properties byte).
pub struct DeltaDecoder {
    distance: u8,
    history: [u8; 256],
    pos: u8,
}

impl DeltaDecoder {
    /// Construct a decoder for the given distance (1..=256).
    pub fn new(distance: usize) -> Self {
        debug_assert!((1..=256).contains(&distance));
        DeltaDecoder { distance: (distance - 1) as u8, history: [0u8; 256], pos: 0 }
    }

    /// Reverse the delta transform in place over `buf`.
    pub fn decode(&mut self, buf: &mut [u8]) {
        let distance = self.distance as u16 + 1;
        for b in buf.iter_mut() {
            let idx = self.pos.wrapping_add(distance as u8);
            *b = b.wrapping_add(self.history[idx as usize]);
            self.history[self.pos as usize] = *b;
            self.pos = self.pos.wrapping_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_distance_one_undoes_first_difference_encoding() {
        // Encoder: enc[i] = orig[i] - orig[i-1] (orig[-1] == 0).
        let orig = [10u8, 12, 9, 9, 20];
        let mut enc = vec![0u8; orig.len()];
        let mut prev = 0u8;
        for (i, &o) in orig.iter().enumerate() {
            enc[i] = o.wrapping_sub(prev);
            prev = o;
        }
        let mut dec = DeltaDecoder::new(1);
        let mut buf = enc.clone();
        dec.decode(&mut buf);
        assert_eq!(buf, orig);
    }
}
