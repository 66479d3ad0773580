//! This module contains the [SingleBatch] type.

use super::BatchValidity;
use crate::{
    params::DEPOSIT_TX_TYPE,
    types::{BlockInfo, L2BlockInfo, RollupConfig},
};
use alloy_eips::BlockNumHash;
use alloy_primitives::{Bytes, B256};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use tracing::{info, warn};

/// Represents a single batch: a single encoded L2 block
#[derive(Debug, Default, RlpDecodable, RlpEncodable, Clone, PartialEq, Eq)]
pub struct SingleBatch {
    /// Block hash of the previous L2 block. `B256::ZERO` if it has not been set by the Batch
    /// Queue.
    pub parent_hash: B256,
    /// The batch epoch number. Same as the first L1 block number in the epoch.
    pub epoch_num: u64,
    /// The block hash of the first L1 block in the epoch
    pub epoch_hash: B256,
    /// The L2 block timestamp of this batch
    pub timestamp: u64,
    /// The L2 block transactions in this batch
    pub transactions: Vec<Bytes>,
}

impl SingleBatch {
    /// If any transactions are empty or deposited transaction types.
    pub fn has_invalid_transactions(&self) -> bool {
        self.transactions.iter().any(|tx| tx.is_empty() || tx[0] == DEPOSIT_TX_TYPE)
    }

    /// Returns the [BlockNumHash] of the batch.
    pub const fn epoch(&self) -> BlockNumHash {
        BlockNumHash { number: self.epoch_num, hash: self.epoch_hash }
    }

    /// Validate the batch timestamp against the next expected L2 timestamp.
    ///
    /// After Holocene, gaps are dropped and old batches are classified [BatchValidity::Past].
    pub fn check_batch_timestamp(
        &self,
        cfg: &RollupConfig,
        l2_safe_head: L2BlockInfo,
        inclusion_block: &BlockInfo,
    ) -> BatchValidity {
        let next_timestamp = l2_safe_head.block_info.timestamp + cfg.block_time;
        if self.timestamp > next_timestamp {
            if cfg.is_holocene_active(inclusion_block.timestamp) {
                warn!(target: "single_batch", "dropping future batch with timestamp {} after Holocene", self.timestamp);
                return BatchValidity::Drop;
            }
            info!(target: "single_batch", "received out-of-order batch for future processing after next batch ({} > {})", self.timestamp, next_timestamp);
            return BatchValidity::Future;
        }
        if self.timestamp < next_timestamp {
            warn!(target: "single_batch", "dropping batch with old timestamp, min_timestamp: {next_timestamp}");
            if cfg.is_holocene_active(inclusion_block.timestamp) {
                return BatchValidity::Past;
            }
            return BatchValidity::Drop;
        }
        BatchValidity::Accept
    }

    /// Checks if the batch is valid.
    ///
    /// `l1_blocks` starts with the L1 origin of the safe head; a second block is needed to decide
    /// batches that advance the epoch.
    pub fn check_batch(
        &self,
        cfg: &RollupConfig,
        l1_blocks: &[BlockInfo],
        l2_safe_head: L2BlockInfo,
        inclusion_block: &BlockInfo,
    ) -> BatchValidity {
        if l1_blocks.is_empty() {
            warn!(target: "single_batch", "missing L1 block input, cannot proceed with batch checking");
            return BatchValidity::Undecided;
        }

        let epoch = l1_blocks[0];

        let timestamp_check = self.check_batch_timestamp(cfg, l2_safe_head, inclusion_block);
        if !timestamp_check.is_accept() {
            return timestamp_check;
        }

        // With a correct timestamp the batch must build on top of the safe head.
        if self.parent_hash != l2_safe_head.block_info.hash {
            warn!(target: "single_batch", "ignoring batch with mismatching parent hash {}, current safe head {}", self.parent_hash, l2_safe_head.block_info.hash);
            return BatchValidity::Drop;
        }

        if self.epoch_num + cfg.seq_window_size < inclusion_block.number {
            warn!(target: "single_batch", "batch was included too late, sequence window expired");
            return BatchValidity::Drop;
        }

        let mut batch_origin = epoch;
        if self.epoch_num < epoch.number {
            warn!(target: "single_batch", "dropped batch, epoch is too old, minimum: {}", epoch.number);
            return BatchValidity::Drop;
        } else if self.epoch_num == epoch.number {
            // Sticking to the current epoch.
        } else if self.epoch_num == epoch.number + 1 {
            // Epoch advancement can only be decided with the next L1 block at hand.
            if l1_blocks.len() < 2 {
                info!(target: "single_batch", "eager batch wants to advance epoch, but could not without more L1 blocks");
                return BatchValidity::Undecided;
            }
            batch_origin = l1_blocks[1];
        } else {
            warn!(target: "single_batch", "batch is for future epoch too far ahead, while it has the next timestamp, so it must be invalid");
            return BatchValidity::Drop;
        }

        if self.epoch_hash != batch_origin.hash {
            warn!(target: "single_batch", "batch is for different L1 chain, epoch hash does not match, expected: {}", batch_origin.hash);
            return BatchValidity::Drop;
        }

        if self.timestamp < batch_origin.timestamp {
            warn!(target: "single_batch", "batch timestamp is less than L1 origin timestamp, l2_timestamp: {}, l1_timestamp: {}", self.timestamp, batch_origin.timestamp);
            return BatchValidity::Drop;
        }

        let max_drift = cfg.max_sequencer_drift(batch_origin.timestamp);
        let Some(max) = batch_origin.timestamp.checked_add(max_drift) else {
            return BatchValidity::Drop;
        };

        let no_txs = self.transactions.is_empty();
        if self.timestamp > max && !no_txs {
            // A sequencer ignoring the drift rule must adopt the next origin before including
            // transactions again.
            warn!(target: "single_batch", "batch exceeded sequencer time drift, sequencer must adopt new L1 origin to include transactions again, max_time: {max}");
            return BatchValidity::Drop;
        }
        if self.timestamp > max && no_txs && epoch.number == batch_origin.number {
            // Empty batches past the drift are allowed only while the next origin is not yet
            // adoptable.
            if l1_blocks.len() < 2 {
                info!(target: "single_batch", "without the next L1 origin we cannot determine yet if this empty batch that exceeds the time drift is still valid");
                return BatchValidity::Undecided;
            }
            if self.timestamp >= l1_blocks[1].timestamp {
                warn!(target: "single_batch", "batch exceeded sequencer time drift without adopting next origin, and next L1 origin would have been valid");
                return BatchValidity::Drop;
            }
            info!(target: "single_batch", "continuing with empty batch before late L1 block to preserve L2 time invariant");
        }

        for (i, tx) in self.transactions.iter().enumerate() {
            if tx.is_empty() {
                warn!(target: "single_batch", "transaction data must not be empty, but found empty tx at index {i}");
                return BatchValidity::Drop;
            }
            if tx[0] == DEPOSIT_TX_TYPE {
                warn!(target: "single_batch", "sequencers may not embed any deposits into batch data, but found tx that has one at index {i}");
                return BatchValidity::Drop;
            }
        }

        BatchValidity::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_rlp::{Decodable, Encodable};

    fn cfg() -> RollupConfig {
        RollupConfig {
            block_time: 2,
            seq_window_size: 4,
            max_sequencer_drift: 600,
            ..Default::default()
        }
    }

    fn safe_head() -> L2BlockInfo {
        L2BlockInfo {
            block_info: BlockInfo {
                hash: B256::repeat_byte(0xAA),
                number: 10,
                timestamp: 20,
                ..Default::default()
            },
            l1_origin: BlockNumHash { number: 5, hash: B256::repeat_byte(5) },
            seq_num: 0,
        }
    }

    fn l1_blocks() -> Vec<BlockInfo> {
        vec![
            BlockInfo { hash: B256::repeat_byte(5), number: 5, timestamp: 18, ..Default::default() },
            BlockInfo { hash: B256::repeat_byte(6), number: 6, timestamp: 30, ..Default::default() },
        ]
    }

    fn valid_batch() -> SingleBatch {
        SingleBatch {
            parent_hash: B256::repeat_byte(0xAA),
            epoch_num: 5,
            epoch_hash: B256::repeat_byte(5),
            timestamp: 22,
            transactions: vec![Bytes::from(vec![0x02, 0x01])],
        }
    }

    fn inclusion() -> BlockInfo {
        BlockInfo { number: 6, timestamp: 30, ..Default::default() }
    }

    #[test]
    fn test_rlp_roundtrip() {
        let batch = valid_batch();
        let mut buf = Vec::new();
        batch.encode(&mut buf);
        assert_eq!(SingleBatch::decode(&mut buf.as_slice()).unwrap(), batch);
    }

    #[test]
    fn test_check_batch_accept() {
        let v = valid_batch().check_batch(&cfg(), &l1_blocks(), safe_head(), &inclusion());
        assert_eq!(v, BatchValidity::Accept);
    }

    #[test]
    fn test_check_batch_empty_l1_blocks() {
        let v = valid_batch().check_batch(&cfg(), &[], safe_head(), &inclusion());
        assert_eq!(v, BatchValidity::Undecided);
    }

    #[test]
    fn test_check_batch_timestamps() {
        let future = SingleBatch { timestamp: 24, ..valid_batch() };
        assert_eq!(
            future.check_batch(&cfg(), &l1_blocks(), safe_head(), &inclusion()),
            BatchValidity::Future
        );
        let past = SingleBatch { timestamp: 20, ..valid_batch() };
        assert_eq!(
            past.check_batch(&cfg(), &l1_blocks(), safe_head(), &inclusion()),
            BatchValidity::Drop
        );

        let holocene = RollupConfig { holocene_time: Some(0), ..cfg() };
        assert_eq!(
            future.check_batch(&holocene, &l1_blocks(), safe_head(), &inclusion()),
            BatchValidity::Drop
        );
        assert_eq!(
            past.check_batch(&holocene, &l1_blocks(), safe_head(), &inclusion()),
            BatchValidity::Past
        );
    }

    #[test]
    fn test_check_batch_parent_hash_mismatch() {
        let batch = SingleBatch { parent_hash: B256::ZERO, ..valid_batch() };
        assert_eq!(
            batch.check_batch(&cfg(), &l1_blocks(), safe_head(), &inclusion()),
            BatchValidity::Drop
        );
    }

    #[test]
    fn test_check_batch_sequence_window_boundary() {
        // epoch 5 + window 4 == inclusion 9 is still in time.
        let at_deadline = BlockInfo { number: 9, ..inclusion() };
        assert_eq!(
            valid_batch().check_batch(&cfg(), &l1_blocks(), safe_head(), &at_deadline),
            BatchValidity::Accept
        );
        let late = BlockInfo { number: 10, ..inclusion() };
        assert_eq!(
            valid_batch().check_batch(&cfg(), &l1_blocks(), safe_head(), &late),
            BatchValidity::Drop
        );
    }

    #[test]
    fn test_check_batch_epoch_rules() {
        let old = SingleBatch { epoch_num: 4, ..valid_batch() };
        assert_eq!(
            old.check_batch(&cfg(), &l1_blocks(), safe_head(), &inclusion()),
            BatchValidity::Drop
        );

        let next = SingleBatch {
            epoch_num: 6,
            epoch_hash: B256::repeat_byte(6),
            timestamp: 22,
            ..valid_batch()
        };
        // Next origin timestamp 30 is after the batch timestamp.
        assert_eq!(
            next.check_batch(&cfg(), &l1_blocks(), safe_head(), &inclusion()),
            BatchValidity::Drop
        );
        assert_eq!(
            next.check_batch(&cfg(), &l1_blocks()[..1], safe_head(), &inclusion()),
            BatchValidity::Undecided
        );

        let too_far = SingleBatch { epoch_num: 7, ..valid_batch() };
        assert_eq!(
            too_far.check_batch(&cfg(), &l1_blocks(), safe_head(), &inclusion()),
            BatchValidity::Drop
        );

        let wrong_hash = SingleBatch { epoch_hash: B256::repeat_byte(9), ..valid_batch() };
        assert_eq!(
            wrong_hash.check_batch(&cfg(), &l1_blocks(), safe_head(), &inclusion()),
            BatchValidity::Drop
        );
    }

    #[test]
    fn test_check_batch_sequencer_drift() {
        let cfg = RollupConfig { max_sequencer_drift: 2, ..cfg() };
        // Origin time 18 + drift 2 = 20 < 22.
        assert_eq!(
            valid_batch().check_batch(&cfg, &l1_blocks(), safe_head(), &inclusion()),
            BatchValidity::Drop
        );

        let empty = SingleBatch { transactions: vec![], ..valid_batch() };
        assert_eq!(
            empty.check_batch(&cfg, &l1_blocks(), safe_head(), &inclusion()),
            BatchValidity::Accept
        );
        assert_eq!(
            empty.check_batch(&cfg, &l1_blocks()[..1], safe_head(), &inclusion()),
            BatchValidity::Undecided
        );

        let mut blocks = l1_blocks();
        blocks[1].timestamp = 22;
        assert_eq!(
            empty.check_batch(&cfg, &blocks, safe_head(), &inclusion()),
            BatchValidity::Drop
        );
    }

    #[test]
    fn test_check_batch_invalid_transactions() {
        let empty_tx = SingleBatch { transactions: vec![Bytes::new()], ..valid_batch() };
        assert!(empty_tx.has_invalid_transactions());
        assert_eq!(
            empty_tx.check_batch(&cfg(), &l1_blocks(), safe_head(), &inclusion()),
            BatchValidity::Drop
        );

        let deposit = SingleBatch { transactions: vec![Bytes::from(vec![0x7E])], ..valid_batch() };
        assert!(deposit.has_invalid_transactions());
        assert_eq!(
            deposit.check_batch(&cfg(), &l1_blocks(), safe_head(), &inclusion()),
            BatchValidity::Drop
        );
    }
}
