//! Raw Span Batch

use super::{
    SpanBatch, SpanBatchElement, SpanBatchError, SpanBatchPayload, SpanBatchPrefix,
};
use crate::batch::BatchType;
use alloy_primitives::Bytes;

/// Raw Span Batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSpanBatch {
    /// The span batch prefix
    pub prefix: SpanBatchPrefix,
    /// The span batch payload
    pub payload: SpanBatchPayload,
}

impl TryFrom<SpanBatch> for RawSpanBatch {
    type Error = SpanBatchError;

    fn try_from(value: SpanBatch) -> Result<Self, Self::Error> {
        value.to_raw_span_batch()
    }
}

impl RawSpanBatch {
    /// Returns the batch type
    pub const fn get_batch_type(&self) -> BatchType {
        BatchType::Span
    }

    /// Encodes the [RawSpanBatch] into a writer, without the batch type byte.
    pub fn encode(&self, w: &mut Vec<u8>) -> Result<(), SpanBatchError> {
        self.prefix.encode_prefix(w);
        self.payload.encode_payload(w)
    }

    /// Decodes the [RawSpanBatch] from a reader, with the batch type byte already consumed.
    pub fn decode(r: &mut &[u8]) -> Result<Self, SpanBatchError> {
        let prefix = SpanBatchPrefix::decode_prefix(r)?;
        let payload = SpanBatchPayload::decode_payload(r)?;
        Ok(Self { prefix, payload })
    }

    /// Converts a [RawSpanBatch] into a [SpanBatch], which has a list of [SpanBatchElement]s.
    pub fn derive(
        &mut self,
        block_time: u64,
        genesis_time: u64,
        chain_id: u64,
    ) -> Result<SpanBatch, SpanBatchError> {
        let block_count = self.payload.block_count as usize;
        if block_count == 0 {
            return Err(SpanBatchError::EmptySpanBatch);
        }
        if self.payload.block_tx_counts.len() != block_count {
            return Err(SpanBatchError::Decoding(super::SpanDecodingError::BlockTxCounts));
        }

        // Origin numbers are walked backwards from the last block, whose origin is in the prefix.
        let mut block_origin_nums = vec![0u64; block_count];
        let mut l1_origin_number = self.prefix.l1_origin_num;
        for i in (0..block_count).rev() {
            block_origin_nums[i] = l1_origin_number;
            if i > 0 && self.payload.origin_bits.get_bit(i).unwrap_or(0) == 1 {
                l1_origin_number = l1_origin_number
                    .checked_sub(1)
                    .ok_or(SpanBatchError::Decoding(super::SpanDecodingError::L1OriginNumber))?;
            }
        }

        self.payload.txs.recover_v(chain_id)?;
        let full_txs = self.payload.txs.full_txs(chain_id)?;

        let mut txs = full_txs.into_iter().map(Bytes::from);
        let mut batches = Vec::with_capacity(block_count);
        for (i, (origin, tx_count)) in
            block_origin_nums.iter().zip(&self.payload.block_tx_counts).enumerate()
        {
            let transactions: Vec<Bytes> = txs.by_ref().take(*tx_count as usize).collect();
            batches.push(SpanBatchElement {
                epoch_num: *origin,
                timestamp: genesis_time + self.prefix.rel_timestamp + block_time * i as u64,
                transactions,
            });
        }

        Ok(SpanBatch {
            parent_check: self.prefix.parent_check,
            l1_origin_check: self.prefix.l1_origin_check,
            genesis_timestamp: genesis_time,
            chain_id,
            batches,
            origin_bits: self.payload.origin_bits.clone(),
            block_tx_counts: self.payload.block_tx_counts.clone(),
            txs: self.payload.txs.clone(),
        })
    }
}
