//! LZMA probability tables and the 12-state "what happened last" automaton.

use super::range_decoder::{Prob, RangeDecoder, PROB_INIT};
use crate::error::Error;

pub const NUM_STATES: usize = 12;
pub const NUM_POS_STATES_MAX: usize = 1 << 4;
pub const NUM_LEN_TO_POS_STATES: usize = 4;
pub const NUM_ALIGN_BITS: u32 = 4;
pub const END_POS_MODEL_INDEX: u32 = 14;
pub const NUM_FULL_DISTANCES: usize = 1 << (END_POS_MODEL_INDEX as usize / 2);
pub const MATCH_MIN_LEN: u32 = 2;

/// The length coder shared by new-match and rep-match decoding: a
/// choice/choice2 pair selecting among low (3-bit), mid (3-bit), and high
/// (8-bit) trees, each keyed by the current `pos_state`.
pub struct LenCoder {
    choice: Prob,
    choice2: Prob,
    low: [[Prob; 8]; NUM_POS_STATES_MAX],
    mid: [[Prob; 8]; NUM_POS_STATES_MAX],
    high: [Prob; 256],
}

impl LenCoder {
    fn new() -> Self {
        LenCoder {
            choice: PROB_INIT,
            choice2: PROB_INIT,
            low: [[PROB_INIT; 8]; NUM_POS_STATES_MAX],
            mid: [[PROB_INIT; 8]; NUM_POS_STATES_MAX],
            high: [PROB_INIT; 256],
        }
    }

    pub fn decode(&mut self, rc: &mut RangeDecoder<'_>, pos_state: usize) -> Result<u32, Error> {
        if rc.decode_bit(&mut self.choice)? == 0 {
            return rc.decode_bit_tree(&mut self.low[pos_state], 3);
        }
        if rc.decode_bit(&mut self.choice2)? == 0 {
            return Ok(rc.decode_bit_tree(&mut self.mid[pos_state], 3)? + 8);
        }
        Ok(rc.decode_bit_tree(&mut self.high, 8)? + 16)
    }
}

/// All adaptive probabilities for one LZMA "properties reset" epoch. A
/// fresh [`Probs`] is built whenever the stream's lc/lp/pb change or the
/// LZMA2 chunk kind requests a state reset.
pub struct Probs {
    pub is_match: [[Prob; NUM_POS_STATES_MAX]; NUM_STATES],
    pub is_rep: [Prob; NUM_STATES],
    pub is_rep_g0: [Prob; NUM_STATES],
    pub is_rep_g1: [Prob; NUM_STATES],
    pub is_rep_g2: [Prob; NUM_STATES],
    pub is_rep0_long: [[Prob; NUM_POS_STATES_MAX]; NUM_STATES],
    pub pos_slot: [[Prob; 64]; NUM_LEN_TO_POS_STATES],
    pub spec_pos: [Prob; NUM_FULL_DISTANCES - END_POS_MODEL_INDEX as usize],
    pub align: [Prob; 1 << NUM_ALIGN_BITS],
    pub len_coder: LenCoder,
    pub rep_len_coder: LenCoder,
    pub literal: Vec<Prob>,
    pub lc: u32,
    pub lp: u32,
    pub pb: u32,
}

impl Probs {
    /// Allocate fresh (all-`PROB_INIT`) probabilities for the given
    /// literal-context/literal-position/pos bits.
    pub fn new(lc: u32, lp: u32, pb: u32) -> Self {
        let literal_len = 0x300usize << (lc + lp);
        Probs {
            is_match: [[PROB_INIT; NUM_POS_STATES_MAX]; NUM_STATES],
            is_rep: [PROB_INIT; NUM_STATES],
            is_rep_g0: [PROB_INIT; NUM_STATES],
            is_rep_g1: [PROB_INIT; NUM_STATES],
            is_rep_g2: [PROB_INIT; NUM_STATES],
            is_rep0_long: [[PROB_INIT; NUM_POS_STATES_MAX]; NUM_STATES],
            pos_slot: [[PROB_INIT; 64]; NUM_LEN_TO_POS_STATES],
            spec_pos: [PROB_INIT; NUM_FULL_DISTANCES - END_POS_MODEL_INDEX as usize],
            align: [PROB_INIT; 1 << NUM_ALIGN_BITS],
            len_coder: LenCoder::new(),
            rep_len_coder: LenCoder::new(),
            literal: vec![PROB_INIT; literal_len],
            lc,
            lp,
            pb,
        }
    }

    /// Re-derive literal table size after an lc/lp change without
    /// reallocating the rest of the (already-reset) state probabilities.
    pub fn set_literal_props(&mut self, lc: u32, lp: u32) {
        self.lc = lc;
        self.lp = lp;
        self.literal = vec![PROB_INIT; 0x300usize << (lc + lp)];
    }
}

/// The 12-state automaton tracking whether the last op was a literal,
/// match, rep-match, or short-rep.
#[derive(Debug, Clone, Copy, Default)]
pub struct LzmaState(pub u32);

impl LzmaState {
    pub fn after_literal(self) -> Self {
        LzmaState(if self.0 < 4 {
            0
        } else if self.0 < 10 {
            self.0 - 3
        } else {
            self.0 - 6
        })
    }

    pub fn after_match(self) -> Self {
        LzmaState(if self.0 < 7 { 7 } else { 10 })
    }

    pub fn after_rep(self) -> Self {
        LzmaState(if self.0 < 7 { 8 } else { 11 })
    }

    pub fn after_short_rep(self) -> Self {
        LzmaState(if self.0 < 7 { 9 } else { 11 })
    }

    pub fn is_literal_state(self) -> bool {
        self.0 < 7
    }
}
