//! The [SpanBatch] type: a derived span of consecutive L2 blocks.

use super::{SpanBatchBits, SpanBatchElement, SpanBatchError, SpanBatchPayload, SpanBatchPrefix, SpanBatchTransactions, RawSpanBatch};
use crate::{
    batch::{BatchValidity, SingleBatch},
    params::DEPOSIT_TX_TYPE,
    traits::L2ChainProvider,
    types::{BlockInfo, L2BlockInfo, RollupConfig},
};
use alloy_primitives::{FixedBytes, B256};
use tracing::{info, warn};

/// The span batch contains the input to build a span of L2 blocks in derived form.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpanBatch {
    /// First 20 bytes of the first block's parent hash
    pub parent_check: FixedBytes<20>,
    /// First 20 bytes of the last block's L1 origin hash
    pub l1_origin_check: FixedBytes<20>,
    /// Genesis block timestamp
    pub genesis_timestamp: u64,
    /// Chain ID
    pub chain_id: u64,
    /// List of block input in derived form
    pub batches: Vec<SpanBatchElement>,
    /// Caching - origin bits
    pub origin_bits: SpanBatchBits,
    /// Caching - block tx counts
    pub block_tx_counts: Vec<u64>,
    /// Caching - span batch txs
    pub txs: SpanBatchTransactions,
}

impl SpanBatch {
    /// Returns the starting timestamp for the first batch in the span.
    ///
    /// The span must not be empty.
    pub fn starting_timestamp(&self) -> u64 {
        self.batches[0].timestamp
    }

    /// Returns the final timestamp for the last batch in the span.
    pub fn final_timestamp(&self) -> u64 {
        self.batches[self.batches.len() - 1].timestamp
    }

    /// Returns the epoch number for the first batch in the span.
    pub fn starting_epoch_num(&self) -> u64 {
        self.batches[0].epoch_num
    }

    /// Checks if the first 20 bytes of the given hash match the L1 origin check.
    pub fn check_origin_hash(&self, hash: B256) -> bool {
        self.l1_origin_check == hash[..20]
    }

    /// Checks if the first 20 bytes of the given hash match the parent check.
    pub fn check_parent_hash(&self, hash: B256) -> bool {
        self.parent_check == hash[..20]
    }

    /// Peek at the `n`th-to-last element of the span.
    fn peek(&self, n: usize) -> &SpanBatchElement {
        &self.batches[self.batches.len() - 1 - n]
    }

    /// Constructs the [RawSpanBatch] encoding form of this span.
    pub fn to_raw_span_batch(&self) -> Result<RawSpanBatch, SpanBatchError> {
        let span_start = self.batches.first().ok_or(SpanBatchError::EmptySpanBatch)?;
        let span_end = self.batches.last().ok_or(SpanBatchError::EmptySpanBatch)?;

        Ok(RawSpanBatch {
            prefix: SpanBatchPrefix {
                rel_timestamp: span_start.timestamp.saturating_sub(self.genesis_timestamp),
                l1_origin_num: span_end.epoch_num,
                parent_check: self.parent_check,
                l1_origin_check: self.l1_origin_check,
            },
            payload: SpanBatchPayload {
                block_count: self.batches.len() as u64,
                origin_bits: self.origin_bits.clone(),
                block_tx_counts: self.block_tx_counts.clone(),
                txs: self.txs.clone(),
            },
        })
    }

    /// Converts all [SpanBatchElement]s after the L2 safe head to [SingleBatch]es. The parent
    /// hash of the resulting batches is left unset; the batch queue fills it in.
    pub fn get_singular_batches(
        &self,
        l1_origins: &[BlockInfo],
        l2_safe_head: L2BlockInfo,
    ) -> Result<Vec<SingleBatch>, SpanBatchError> {
        let mut single_batches = Vec::with_capacity(self.batches.len());
        let mut origin_index = 0;
        for batch in &self.batches {
            if batch.timestamp <= l2_safe_head.block_info.timestamp {
                continue;
            }
            if batch.epoch_num < l2_safe_head.l1_origin.number {
                return Err(SpanBatchError::L1OriginBeforeSafeHead);
            }
            let (offset, origin) = l1_origins[origin_index..]
                .iter()
                .enumerate()
                .find(|(_, origin)| origin.number == batch.epoch_num)
                .ok_or(SpanBatchError::MissingL1Origin)?;
            origin_index += offset;
            single_batches.push(SingleBatch {
                epoch_num: batch.epoch_num,
                epoch_hash: origin.hash,
                timestamp: batch.timestamp,
                transactions: batch.transactions.clone(),
                ..Default::default()
            });
        }
        Ok(single_batches)
    }

    /// Appends a [SingleBatch] to the span, updating the cached encoding columns.
    ///
    /// `seq_num` is the sequence number of the block within its epoch; it decides the origin bit
    /// of the first element.
    pub fn append_singular_batch(
        &mut self,
        singular_batch: SingleBatch,
        seq_num: u64,
    ) -> Result<(), SpanBatchError> {
        if !self.batches.is_empty() && self.peek(0).timestamp > singular_batch.timestamp {
            return Err(SpanBatchError::UnorderedBatch);
        }

        let SingleBatch { epoch_hash, parent_hash, .. } = singular_batch;
        self.batches.push(singular_batch.into());
        self.l1_origin_check = FixedBytes::from_slice(&epoch_hash[..20]);

        let epoch_bit = if self.batches.len() == 1 {
            self.parent_check = FixedBytes::from_slice(&parent_hash[..20]);
            seq_num == 0
        } else {
            self.peek(1).epoch_num < self.peek(0).epoch_num
        };
        self.origin_bits.set_bit(self.batches.len() - 1, epoch_bit);

        let new_txs = self.peek(0).transactions.clone();
        self.block_tx_counts.push(new_txs.len() as u64);
        self.txs.add_txs(new_txs, self.chain_id)
    }

    /// Checks the validity of the whole span against the safe head.
    ///
    /// Elements at or before the safe head must match the canonical safe chain exactly.
    pub async fn check_batch<BF: L2ChainProvider + Send>(
        &self,
        cfg: &RollupConfig,
        l1_blocks: &[BlockInfo],
        l2_safe_head: L2BlockInfo,
        inclusion_block: &BlockInfo,
        fetcher: &mut BF,
    ) -> BatchValidity {
        let (prefix_validity, parent_block) =
            self.check_batch_prefix(cfg, l1_blocks, l2_safe_head, inclusion_block, fetcher).await;
        let (BatchValidity::Accept, Some(parent_block)) = (prefix_validity, parent_block) else {
            return prefix_validity;
        };

        let mut origin_index = 0;
        let mut origin_advanced = self.starting_epoch_num() == parent_block.l1_origin.number + 1;
        for (i, batch) in self.batches.iter().enumerate() {
            if batch.timestamp <= l2_safe_head.block_info.timestamp {
                continue;
            }
            if batch.epoch_num < l2_safe_head.l1_origin.number {
                warn!(target: "span_batch", "batch L1 origin is before safe head L1 origin, batch_epoch: {}, safe_head_epoch: {}", batch.epoch_num, l2_safe_head.l1_origin.number);
                return BatchValidity::Drop;
            }

            let Some((offset, l1_origin)) = l1_blocks[origin_index..]
                .iter()
                .enumerate()
                .find(|(_, b)| b.number == batch.epoch_num)
            else {
                warn!(target: "span_batch", "unable to find L1 origin for batch, batch_epoch: {}, batch_timestamp: {}", batch.epoch_num, batch.timestamp);
                return BatchValidity::Drop;
            };
            origin_index += offset;

            if i > 0 {
                origin_advanced = batch.epoch_num > self.batches[i - 1].epoch_num;
            }
            if batch.timestamp < l1_origin.timestamp {
                warn!(target: "span_batch", "batch timestamp is less than L1 origin timestamp, l2_timestamp: {}, l1_timestamp: {}", batch.timestamp, l1_origin.timestamp);
                return BatchValidity::Drop;
            }

            let max_drift = cfg.max_sequencer_drift(l1_origin.timestamp);
            if batch.timestamp > l1_origin.timestamp.saturating_add(max_drift) {
                if !batch.transactions.is_empty() {
                    warn!(target: "span_batch", "batch exceeded sequencer time drift, sequencer must adopt new L1 origin to include transactions again, max_time: {}", l1_origin.timestamp.saturating_add(max_drift));
                    return BatchValidity::Drop;
                }
                if !origin_advanced {
                    let Some(next_origin) = l1_blocks.get(origin_index + 1) else {
                        info!(target: "span_batch", "without the next L1 origin we cannot determine yet if this empty batch that exceeds the time drift is still valid");
                        return BatchValidity::Undecided;
                    };
                    if batch.timestamp >= next_origin.timestamp {
                        warn!(target: "span_batch", "batch exceeded sequencer time drift without adopting next origin, and next L1 origin would have been valid");
                        return BatchValidity::Drop;
                    }
                    info!(target: "span_batch", "continuing with empty batch before late L1 block to preserve L2 time invariant");
                }
            }

            for (j, tx) in batch.transactions.iter().enumerate() {
                if tx.is_empty() {
                    warn!(target: "span_batch", "transaction data must not be empty, but found empty tx, tx_index: {j}");
                    return BatchValidity::Drop;
                }
                if tx[0] == DEPOSIT_TX_TYPE {
                    warn!(target: "span_batch", "sequencers may not embed any deposits into batch data, but found tx that has one, tx_index: {j}");
                    return BatchValidity::Drop;
                }
            }
        }

        // Elements overlapping the safe chain must reproduce it.
        let parent_num = parent_block.block_info.number;
        let next_timestamp = l2_safe_head.block_info.timestamp + cfg.block_time;
        if self.starting_timestamp() < next_timestamp {
            for i in 0..(l2_safe_head.block_info.number - parent_num) {
                let safe_block_num = parent_num + i + 1;
                let safe_block_txs = match fetcher.transactions_by_number(safe_block_num).await {
                    Ok(txs) => txs,
                    Err(e) => {
                        warn!(target: "span_batch", "failed to fetch block number {safe_block_num}: {e}");
                        return BatchValidity::Undecided;
                    }
                };
                let Some(element) = self.batches.get(i as usize) else {
                    return BatchValidity::Drop;
                };
                let non_deposits: Vec<_> = safe_block_txs
                    .iter()
                    .filter(|tx| tx.first() != Some(&DEPOSIT_TX_TYPE))
                    .collect();
                if non_deposits.len() != element.transactions.len() {
                    warn!(target: "span_batch", "overlapped block's tx count does not match, safe_block_txs: {}, batch_txs: {}", non_deposits.len(), element.transactions.len());
                    return BatchValidity::Drop;
                }
                if non_deposits.iter().zip(&element.transactions).any(|(a, b)| *a != b) {
                    warn!(target: "span_batch", "overlapped block's transaction does not match");
                    return BatchValidity::Drop;
                }
                let safe_block_ref = match fetcher.l2_block_info_by_number(safe_block_num).await {
                    Ok(block) => block,
                    Err(e) => {
                        warn!(target: "span_batch", "failed to fetch L2 block info {safe_block_num}: {e}");
                        return BatchValidity::Undecided;
                    }
                };
                if safe_block_ref.l1_origin.number != element.epoch_num {
                    warn!(target: "span_batch", "overlapped block's L1 origin number does not match {}, {}", safe_block_ref.l1_origin.number, element.epoch_num);
                    return BatchValidity::Drop;
                }
            }
        }

        BatchValidity::Accept
    }

    /// Checks the validity of the span's prefix: its timestamps, parent and L1 origins.
    ///
    /// Returns the parent block of the span when the prefix is accepted. After Holocene this
    /// check runs as each span is loaded, before its elements are checked one by one.
    pub async fn check_batch_prefix<BF: L2ChainProvider + Send>(
        &self,
        cfg: &RollupConfig,
        l1_origins: &[BlockInfo],
        l2_safe_head: L2BlockInfo,
        inclusion_block: &BlockInfo,
        fetcher: &mut BF,
    ) -> (BatchValidity, Option<L2BlockInfo>) {
        if l1_origins.is_empty() {
            warn!(target: "span_batch", "missing L1 block input, cannot proceed with batch checking");
            return (BatchValidity::Undecided, None);
        }
        if self.batches.is_empty() {
            warn!(target: "span_batch", "empty span batch, cannot proceed with batch checking");
            return (BatchValidity::Undecided, None);
        }

        let epoch = l1_origins[0];
        let next_timestamp = l2_safe_head.block_info.timestamp + cfg.block_time;

        let starting_epoch_num = self.starting_epoch_num();
        let mut batch_origin = epoch;
        if starting_epoch_num == batch_origin.number + 1 {
            if l1_origins.len() < 2 {
                info!(target: "span_batch", "eager batch wants to advance current epoch {}, but could not without more L1 blocks", epoch.number);
                return (BatchValidity::Undecided, None);
            }
            batch_origin = l1_origins[1];
        }
        if !cfg.is_delta_active(batch_origin.timestamp) {
            warn!(target: "span_batch", "received SpanBatch with L1 origin (timestamp {}) before Delta hard fork", batch_origin.timestamp);
            return (BatchValidity::Drop, None);
        }

        if self.starting_timestamp() > next_timestamp {
            if cfg.is_holocene_active(inclusion_block.timestamp) {
                warn!(target: "span_batch", "dropping future span batch with timestamp {} after Holocene", self.starting_timestamp());
                return (BatchValidity::Drop, None);
            }
            info!(target: "span_batch", "received out-of-order batch for future processing after next batch ({} > {next_timestamp})", self.starting_timestamp());
            return (BatchValidity::Future, None);
        }

        if self.final_timestamp() < next_timestamp {
            warn!(target: "span_batch", "span batch has no new blocks after safe head");
            if cfg.is_holocene_active(inclusion_block.timestamp) {
                return (BatchValidity::Past, None);
            }
            return (BatchValidity::Drop, None);
        }

        // Without overlap the parent is the safe head itself.
        let mut parent_num = l2_safe_head.block_info.number;
        let mut parent_block = l2_safe_head;
        if self.starting_timestamp() < next_timestamp {
            if self.starting_timestamp() > l2_safe_head.block_info.timestamp {
                warn!(target: "span_batch", "batch has misaligned timestamp, block time is too short");
                return (BatchValidity::Drop, None);
            }
            let overlap = l2_safe_head.block_info.timestamp - self.starting_timestamp();
            if cfg.block_time == 0 || overlap % cfg.block_time != 0 {
                warn!(target: "span_batch", "batch has misaligned timestamp, not overlapped exactly");
                return (BatchValidity::Drop, None);
            }
            let Some(num) =
                l2_safe_head.block_info.number.checked_sub(overlap / cfg.block_time + 1)
            else {
                warn!(target: "span_batch", "span batch overlaps past the L2 genesis");
                return (BatchValidity::Drop, None);
            };
            parent_num = num;
            parent_block = match fetcher.l2_block_info_by_number(parent_num).await {
                Ok(block) => block,
                Err(e) => {
                    warn!(target: "span_batch", "failed to fetch L2 block number {parent_num}: {e}");
                    return (BatchValidity::Undecided, None);
                }
            };
        }
        if !self.check_parent_hash(parent_block.block_info.hash) {
            warn!(target: "span_batch", "ignoring batch with mismatching parent hash, parent_block: {parent_num}, parent_hash: {}, check: {}", parent_block.block_info.hash, self.parent_check);
            return (BatchValidity::Drop, None);
        }

        if starting_epoch_num + cfg.seq_window_size < inclusion_block.number {
            warn!(target: "span_batch", "batch was included too late, sequence window expired");
            return (BatchValidity::Drop, None);
        }

        if starting_epoch_num > parent_block.l1_origin.number + 1 {
            warn!(target: "span_batch", "batch is for future epoch too far ahead, while it has the next timestamp, so it must be invalid, current_epoch: {}", parent_block.l1_origin.number);
            return (BatchValidity::Drop, None);
        }

        let end_epoch_num = self.peek(0).epoch_num;
        let Some(end_origin) = l1_origins.iter().find(|b| b.number == end_epoch_num) else {
            info!(target: "span_batch", "need more l1 blocks to check entire origins of span batch");
            return (BatchValidity::Undecided, None);
        };
        if !self.check_origin_hash(end_origin.hash) {
            warn!(target: "span_batch", "batch is for different L1 chain, epoch hash does not match, l1_block: {}, hash: {}", end_origin.number, end_origin.hash);
            return (BatchValidity::Drop, None);
        }

        if starting_epoch_num < parent_block.l1_origin.number {
            warn!(target: "span_batch", "dropped batch, epoch is too old, minimum: {}", parent_block.l1_origin.number);
            return (BatchValidity::Drop, None);
        }

        (BatchValidity::Accept, Some(parent_block))
    }
}
