//! This module contains the various Block types.

use super::{L1BlockInfoTx, L1InfoDecodingError, PayloadAttributes};
use alloy_eips::BlockNumHash;
use alloy_primitives::B256;

/// Block Header Info
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, Default)]
pub struct BlockInfo {
    /// The block hash
    pub hash: B256,
    /// The block number
    pub number: u64,
    /// The parent block hash
    pub parent_hash: B256,
    /// The block timestamp
    pub timestamp: u64,
}

impl BlockInfo {
    /// Instantiates a new [BlockInfo].
    pub const fn new(hash: B256, number: u64, parent_hash: B256, timestamp: u64) -> Self {
        Self { hash, number, parent_hash, timestamp }
    }

    /// Returns the block ID.
    pub const fn id(&self) -> BlockNumHash {
        BlockNumHash { hash: self.hash, number: self.number }
    }

    /// Returns true if `other` is the direct child of this block.
    pub fn is_parent_of(&self, other: &Self) -> bool {
        self.number + 1 == other.number && self.hash == other.parent_hash
    }
}

impl core::fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "BlockInfo {{ hash: {}, number: {}, parent_hash: {}, timestamp: {} }}",
            self.hash, self.number, self.parent_hash, self.timestamp
        )
    }
}

/// L2 Block Header Info
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, Default)]
pub struct L2BlockInfo {
    /// The base [BlockInfo]
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub block_info: BlockInfo,
    /// The L1 origin [BlockNumHash]
    #[cfg_attr(feature = "serde", serde(rename = "l1origin"))]
    pub l1_origin: BlockNumHash,
    /// The sequence number of the L2 block
    #[cfg_attr(feature = "serde", serde(rename = "sequenceNumber"))]
    pub seq_num: u64,
}

impl L2BlockInfo {
    /// Instantiates a new [L2BlockInfo].
    pub const fn new(block_info: BlockInfo, l1_origin: BlockNumHash, seq_num: u64) -> Self {
        Self { block_info, l1_origin, seq_num }
    }

    /// Returns the block ID of the L2 block.
    pub const fn id(&self) -> BlockNumHash {
        self.block_info.id()
    }

    /// Builds the [L2BlockInfo] of a block sealed from `attributes`, reading the L1 origin and
    /// sequence number from its leading L1 info deposit.
    pub fn from_payload(
        block_info: BlockInfo,
        attributes: &PayloadAttributes,
    ) -> Result<Self, L1InfoDecodingError> {
        let info_tx = attributes.transactions.first().ok_or(L1InfoDecodingError::InvalidDeposit)?;
        let l1_info = L1BlockInfoTx::decode_deposit_tx(info_tx)?;
        Ok(Self { block_info, l1_origin: l1_info.id(), seq_num: l1_info.sequence_number() })
    }
}

impl core::fmt::Display for L2BlockInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "L2BlockInfo {{ number: {}, hash: {}, l1_origin: {}, seq_num: {} }}",
            self.block_info.number, self.block_info.hash, self.l1_origin.number, self.seq_num
        )
    }
}
