//! Streaming adapters that apply the non-LZMA2 filters in a block's chain
//! to the bytes LZMA2 (or an earlier filter stage) emits (spec §4.4 step 5,
//! §4.5).

pub mod bcj;
pub mod delta;

use crate::block::{self, FilterSpec};
use crate::error::Error;

/// One post-LZMA2 filter stage: either Delta or a specific BCJ architecture.
enum Stage {
    Delta(delta::DeltaDecoder),
    Bcj(bcj::BcjDecoder),
}

impl Stage {
    fn from_spec(spec: &FilterSpec) -> Result<Self, Error> {
        Ok(match spec.id {
            block::FILTER_DELTA => Stage::Delta(delta::DeltaDecoder::new(spec.delta_distance()?)),
            block::FILTER_BCJ_X86 => Stage::Bcj(bcj::BcjDecoder::new(bcj::BcjArch::X86, spec.bcj_start_offset()?)),
            block::FILTER_BCJ_POWERPC => {
                Stage::Bcj(bcj::BcjDecoder::new(bcj::BcjArch::PowerPc, spec.bcj_start_offset()?))
            }
            block::FILTER_BCJ_IA64 => Stage::Bcj(bcj::BcjDecoder::new(bcj::BcjArch::Ia64, spec.bcj_start_offset()?)),
            block::FILTER_BCJ_ARM => Stage::Bcj(bcj::BcjDecoder::new(bcj::BcjArch::Arm, spec.bcj_start_offset()?)),
            block::FILTER_BCJ_ARM_THUMB => {
                Stage::Bcj(bcj::BcjDecoder::new(bcj::BcjArch::ArmThumb, spec.bcj_start_offset()?))
            }
            block::FILTER_BCJ_SPARC => Stage::Bcj(bcj::BcjDecoder::new(bcj::BcjArch::Sparc, spec.bcj_start_offset()?)),
            block::FILTER_BCJ_ARM64 => Stage::Bcj(bcj::BcjDecoder::new(bcj::BcjArch::Arm64, spec.bcj_start_offset()?)),
            block::FILTER_BCJ_RISCV => Stage::Bcj(bcj::BcjDecoder::new(bcj::BcjArch::RiscV, spec.bcj_start_offset()?)),
            other => return Err(crate::error::UnsupportedError::UnknownFilter(other).into()),
        })
    }

    fn reserve(&self) -> usize {
        match self {
            Stage::Delta(_) => 0,
            Stage::Bcj(d) => d.arch_instruction_size().saturating_sub(1),
        }
    }

    fn decode(&mut self, buf: &mut [u8], is_final: bool) -> usize {
        match self {
            Stage::Delta(d) => {
                d.decode(buf);
                buf.len()
            }
            Stage::Bcj(d) => d.decode(buf, is_final),
        }
    }
}

impl bcj::BcjDecoder {
    fn arch_instruction_size(&self) -> usize {
        self.arch().instruction_size()
    }
}

/// A pipeline of filter stages applied, in order, to LZMA2's plaintext
/// output (earliest-declared filter last, since LZMA2 is always last in the
/// on-disk chain and is handled separately by [`crate::lzma2`]).
pub struct FilterChain {
    stages: Vec<Stage>,
    pending: Vec<Vec<u8>>,
}

impl FilterChain {
    /// Build the chain from a block's validated filter list (LZMA2
    /// included; it is skipped here since it's handled by the LZMA2 decoder
    /// itself).
    pub fn new(filters: &[FilterSpec]) -> Result<Self, Error> {
        let mut stages = Vec::new();
        for spec in filters.iter().rev() {
            if spec.id == block::FILTER_LZMA2 {
                continue;
            }
            stages.push(Stage::from_spec(spec)?);
        }
        let pending = vec![Vec::new(); stages.len()];
        Ok(FilterChain { stages, pending })
    }

    /// True if this chain has no stages (store-only LZMA2 output needs no
    /// further transform).
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Push freshly decoded bytes through every stage in order, returning
    /// the bytes that are ready to emit downstream. Each stage withholds a
    /// small trailing reserve unless `is_final`.
    pub fn push(&mut self, mut data: Vec<u8>, is_final: bool) -> Result<Vec<u8>, Error> {
        if self.stages.is_empty() {
            return Ok(data);
        }
        for (stage, pending) in self.stages.iter_mut().zip(self.pending.iter_mut()) {
            pending.append(&mut data);
            let reserve = stage.reserve();
            let safe_len = if is_final { pending.len() } else { pending.len().saturating_sub(reserve) };
            let mut chunk = std::mem::take(pending);
            let processed = stage.decode(&mut chunk[..safe_len], is_final);
            let processed = processed.min(safe_len);
            *pending = chunk.split_off(processed);
            data = chunk;
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::FilterSpec;

    #[test]
    fn empty_chain_passes_through() {
        let mut chain = FilterChain::new(&[FilterSpec { id: block::FILTER_LZMA2, props: vec![0] }]).unwrap();
        assert!(chain.is_empty());
        let out = chain.push(b"hello".to_vec(), true).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn delta_chain_reverses_difference_encoding() {
        let filters = vec![
            FilterSpec { id: block::FILTER_DELTA, props: vec![0] },
            FilterSpec { id: block::FILTER_LZMA2, props: vec![0] },
        ];
        let mut chain = FilterChain::new(&filters).unwrap();
        let orig = [10u8, 12, 9, 9, 20];
        let mut enc = vec![0u8; orig.len()];
        let mut prev = 0u8;
        for (i, &o) in orig.iter().enumerate() {
            enc[i] = o.wrapping_sub(prev);
            prev = o;
        }
        let out = chain.push(enc, true).unwrap();
        assert_eq!(out, orig);
    }
}
