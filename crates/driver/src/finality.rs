//! Turns L1 finality into L2 finality.

use alloy_eips::BlockNumHash;
use mako_derive::types::{BlockInfo, L2BlockInfo};
use std::collections::VecDeque;

/// The number of derived L2 blocks remembered for finalization.
///
/// Covers the L1 blocks of two epochs of 32 slots each, twice over, plus one.
pub const FINALITY_LOOKBACK: usize = 4 * 32 + 1;

/// An L2 block together with the L1 block it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalityData {
    /// The last L2 block derived while the pipeline was at `l1_block`.
    pub l2_block: L2BlockInfo,
    /// The L1 block the L2 block was derived from.
    pub l1_block: BlockNumHash,
}

/// Tracks which L2 blocks were derived from which L1 blocks.
///
/// Once an L1 block is finalized, the highest L2 block derived from it or from an earlier L1
/// block is finalized too.
#[derive(Debug, Clone, Default)]
pub struct Finalizer {
    data: VecDeque<FinalityData>,
    finalized_l1: Option<BlockInfo>,
}

impl Finalizer {
    /// Creates an empty finalizer.
    pub fn new() -> Self {
        Self { data: VecDeque::with_capacity(FINALITY_LOOKBACK), finalized_l1: None }
    }

    /// Records that `l2_block` was derived while the pipeline was at `l1_block`.
    pub fn on_derived(&mut self, l2_block: L2BlockInfo, l1_block: BlockNumHash) {
        if let Some(last) = self.data.back_mut() {
            if last.l1_block == l1_block {
                last.l2_block = l2_block;
                return;
            }
        }
        if self.data.len() == FINALITY_LOOKBACK {
            self.data.pop_front();
        }
        self.data.push_back(FinalityData { l2_block, l1_block });
    }

    /// Receives a finalized L1 block and returns the entry that becomes finalized, if it is
    /// higher than `finalized_l2`.
    ///
    /// A finalized L1 block older than the previous one is ignored.
    pub fn on_l1_finalized(
        &mut self,
        l1_finalized: BlockInfo,
        finalized_l2: u64,
    ) -> Option<FinalityData> {
        if self.finalized_l1.is_some_and(|prev| prev.number > l1_finalized.number) {
            warn!(
                target: "driver",
                "Ignoring L1 finality regression from #{} to #{}",
                self.finalized_l1.map_or(0, |b| b.number),
                l1_finalized.number
            );
            return None;
        }
        self.finalized_l1 = Some(l1_finalized);

        self.data
            .iter()
            .filter(|fd| {
                fd.l1_block.number <= l1_finalized.number &&
                    fd.l2_block.block_info.number > finalized_l2
            })
            .max_by_key(|fd| fd.l2_block.block_info.number)
            .copied()
    }

    /// Forgets the derived blocks, after a pipeline reset.
    pub fn reset(&mut self) {
        self.data.clear();
    }

    /// Returns the last finalized L1 block.
    pub const fn finalized_l1(&self) -> Option<BlockInfo> {
        self.finalized_l1
    }

    /// Returns the number of remembered entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if no entry is remembered.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
