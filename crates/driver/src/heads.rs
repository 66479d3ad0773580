//! The heads of the L2 chain tracked by the driver.

use alloy_primitives::B256;
use core::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use mako_derive::types::L2BlockInfo;

/// The heads of the L2 chain, one per [SafetyLabel].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct L2ChainHeads {
    /// The L2 unsafe tip.
    #[cfg_attr(feature = "serde", serde(rename = "unsafe"))]
    pub unsafe_: L2BlockInfo,
    /// The L2 safe tip.
    pub safe: L2BlockInfo,
    /// The finalized tip.
    pub finalized: L2BlockInfo,
}

impl L2ChainHeads {
    /// Constructs a new [L2ChainHeads] with the same head for all labels.
    pub const fn new_unified(head: L2BlockInfo) -> Self {
        Self { unsafe_: head, safe: head, finalized: head }
    }

    /// Returns the head carrying the given label.
    pub const fn head(&self, label: SafetyLabel) -> &L2BlockInfo {
        match label {
            SafetyLabel::Unsafe => &self.unsafe_,
            SafetyLabel::Safe => &self.safe,
            SafetyLabel::Finalized => &self.finalized,
        }
    }

    /// Moves the safe head, dragging the unsafe head along when it falls behind.
    pub fn advance_safe(&mut self, head: L2BlockInfo) {
        if self.unsafe_.block_info.number <= head.block_info.number {
            self.unsafe_ = head;
        }
        self.safe = head;
    }

    /// Returns the forkchoice state pointing the engine at these heads.
    pub const fn forkchoice(&self) -> ForkchoiceState {
        ForkchoiceState {
            head_block_hash: self.unsafe_.block_info.hash,
            safe_block_hash: self.safe.block_info.hash,
            finalized_block_hash: self.finalized.block_info.hash,
        }
    }
}

impl From<L2ChainHeads> for ForkchoiceState {
    fn from(value: L2ChainHeads) -> Self {
        value.forkchoice()
    }
}

/// The forkchoice update sent to the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ForkchoiceState {
    /// The hash of the unsafe head.
    pub head_block_hash: B256,
    /// The hash of the safe head.
    pub safe_block_hash: B256,
    /// The hash of the finalized head.
    pub finalized_block_hash: B256,
}

/// The safety of an L2 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SafetyLabel {
    /// The block was received ahead of derivation.
    Unsafe,
    /// The block was derived from L1 data.
    Safe,
    /// The block was derived from finalized L1 data.
    Finalized,
}

impl Display for SafetyLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unsafe => write!(f, "unsafe"),
            Self::Safe => write!(f, "safe"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

impl FromStr for SafetyLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unsafe" | "latest" => Ok(Self::Unsafe),
            "safe" => Ok(Self::Safe),
            "finalized" => Ok(Self::Finalized),
            other => Err(format!("unknown safety label: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mako_derive::types::BlockInfo;

    fn head(number: u64) -> L2BlockInfo {
        L2BlockInfo {
            block_info: BlockInfo { number, hash: B256::with_last_byte(number as u8), ..Default::default() },
            ..Default::default()
        }
    }

    #[test]
    fn test_advance_safe_drags_unsafe() {
        let mut heads = L2ChainHeads::new_unified(head(1));
        heads.unsafe_ = head(5);
        heads.advance_safe(head(3));
        assert_eq!(heads.safe, head(3));
        assert_eq!(heads.unsafe_, head(5));

        heads.advance_safe(head(6));
        assert_eq!(heads.unsafe_, head(6));
        assert_eq!(heads.finalized, head(1));
    }

    #[test]
    fn test_forkchoice() {
        let heads = L2ChainHeads { unsafe_: head(3), safe: head(2), finalized: head(1) };
        let fcs = ForkchoiceState::from(heads);
        assert_eq!(fcs.head_block_hash, B256::with_last_byte(3));
        assert_eq!(fcs.safe_block_hash, B256::with_last_byte(2));
        assert_eq!(fcs.finalized_block_hash, B256::with_last_byte(1));
    }

    #[test]
    fn test_safety_label_round_trip() {
        for label in [SafetyLabel::Unsafe, SafetyLabel::Safe, SafetyLabel::Finalized] {
            assert_eq!(label.to_string().parse::<SafetyLabel>(), Ok(label));
        }
        assert_eq!("latest".parse::<SafetyLabel>(), Ok(SafetyLabel::Unsafe));
        assert!("cross-safe".parse::<SafetyLabel>().is_err());
    }
}
