//! The [EngineController] trait.

use crate::{EngineErrorClass, ForkchoiceState, SafetyLabel};
use alloy_eips::BlockNumHash;
use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use mako_derive::types::{AttributesWithParent, L2BlockInfo};

/// The fixed memory footprint accounted for every queued payload.
const PAYLOAD_FIXED_COST: u64 = 600;
/// The memory footprint accounted for every transaction on top of its bytes.
const PAYLOAD_TX_OVERHEAD: u64 = 24;

/// A minimal asynchronous interface to the execution engine of the rollup node.
///
/// Implementations are consumed by the [Driver](crate::Driver) to execute derived attributes,
/// insert unsafe payloads, and move the forkchoice of the execution layer.
#[async_trait]
pub trait EngineController {
    /// The error type of the engine.
    type Error: core::error::Error + EngineErrorClass + Send + Sync + 'static;

    /// Returns the L2 head carrying the given label.
    async fn block_by_label(&mut self, label: SafetyLabel) -> Result<L2BlockInfo, Self::Error>;

    /// Returns the L2 block with the given hash.
    async fn block_by_hash(&mut self, hash: B256) -> Result<L2BlockInfo, Self::Error>;

    /// Builds the block described by the derived attributes on top of their parent and makes it
    /// the safe head.
    ///
    /// If the unsafe chain already holds a matching block it is consolidated instead of rebuilt;
    /// a mismatching unsafe chain is reorged out.
    async fn execute_attributes(
        &mut self,
        attributes: &AttributesWithParent,
    ) -> Result<L2BlockInfo, Self::Error>;

    /// Inserts a payload received ahead of derivation on top of the unsafe head.
    async fn insert_unsafe_payload(
        &mut self,
        payload: &ExecutionPayload,
    ) -> Result<L2BlockInfo, Self::Error>;

    /// Moves the heads of the execution layer.
    async fn forkchoice_updated(&mut self, state: ForkchoiceState) -> Result<(), Self::Error>;
}

/// An L2 execution payload, as gossiped by the sequencer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ExecutionPayload {
    /// The hash of the block.
    pub block_hash: B256,
    /// The hash of the parent block.
    pub parent_hash: B256,
    /// The number of the block.
    pub block_number: u64,
    /// The timestamp of the block.
    pub timestamp: u64,
    /// The gas limit of the block.
    pub gas_limit: u64,
    /// The EIP-2718 encoded transactions, opening with the L1 info deposit.
    pub transactions: Vec<Bytes>,
}

impl ExecutionPayload {
    /// Returns the block ID of the payload.
    pub const fn id(&self) -> BlockNumHash {
        BlockNumHash { number: self.block_number, hash: self.block_hash }
    }

    /// Returns the memory footprint accounted for the payload in the unsafe payload queue.
    pub fn mem_size(&self) -> u64 {
        self.transactions
            .iter()
            .fold(PAYLOAD_FIXED_COST, |size, tx| size + PAYLOAD_TX_OVERHEAD + tx.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_mem_size() {
        let payload = ExecutionPayload {
            transactions: vec![Bytes::from(vec![0u8; 100]), Bytes::from(vec![0u8; 50])],
            ..Default::default()
        };
        assert_eq!(payload.mem_size(), 600 + 24 * 2 + 150);
        assert_eq!(ExecutionPayload::default().mem_size(), 600);
    }
}
