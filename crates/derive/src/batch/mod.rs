//! This module contains the batch types for the derivation pipeline: [SpanBatch] &
//! [SingleBatch], and the [BatchReader] that streams them out of a channel body.

use crate::{
    errors::PipelineEncodingError,
    traits::L2ChainProvider,
    types::{BlockInfo, L2BlockInfo, RollupConfig},
};
use alloy_rlp::{Buf, Decodable, Encodable};

mod validity;
pub use validity::BatchValidity;

mod span_batch;
pub use span_batch::{
    read_tx_data, RawSpanBatch, SpanBatch, SpanBatchBits, SpanBatchElement, SpanBatchError,
    SpanBatchPayload, SpanBatchPrefix, SpanBatchSignature, SpanBatchTransactionData,
    SpanBatchTransactions, SpanDecodingError, SplitTransaction, EIP1559_TX_TYPE, EIP2930_TX_TYPE,
    LEGACY_TX_TYPE,
};

mod single_batch;
pub use single_batch::SingleBatch;

mod reader;
pub use reader::{decompress_channel, BatchReader};

/// The type tag of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchType {
    /// A [SingleBatch].
    Single,
    /// A [SpanBatch].
    Span,
}

impl BatchType {
    /// The tag byte of a [SingleBatch].
    pub const SINGLE: u8 = 0;
    /// The tag byte of a [SpanBatch].
    pub const SPAN: u8 = 1;
}

impl TryFrom<u8> for BatchType {
    type Error = PipelineEncodingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            Self::SINGLE => Ok(Self::Single),
            Self::SPAN => Ok(Self::Span),
            other => Err(PipelineEncodingError::InvalidBatchType(other)),
        }
    }
}

impl From<BatchType> for u8 {
    fn from(value: BatchType) -> Self {
        match value {
            BatchType::Single => BatchType::SINGLE,
            BatchType::Span => BatchType::SPAN,
        }
    }
}

/// A batch with its inclusion block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchWithInclusionBlock {
    /// The inclusion block
    pub inclusion_block: BlockInfo,
    /// The batch
    pub batch: Batch,
}

impl BatchWithInclusionBlock {
    /// Creates a new [BatchWithInclusionBlock].
    pub const fn new(inclusion_block: BlockInfo, batch: Batch) -> Self {
        Self { inclusion_block, batch }
    }

    /// Validates the batch can be applied on top of the specified L2 safe head.
    /// The first entry of the l1_blocks should match the origin of the l2_safe_head.
    /// One or more consecutive l1_blocks should be provided.
    /// In case of only a single L1 block, the decision whether a batch is valid may have to stay
    /// undecided.
    pub async fn check_batch<BF: L2ChainProvider + Send>(
        &self,
        cfg: &RollupConfig,
        l1_blocks: &[BlockInfo],
        l2_safe_head: L2BlockInfo,
        fetcher: &mut BF,
    ) -> BatchValidity {
        match &self.batch {
            Batch::Single(single_batch) => {
                single_batch.check_batch(cfg, l1_blocks, l2_safe_head, &self.inclusion_block)
            }
            Batch::Span(span_batch) => {
                span_batch
                    .check_batch(cfg, l1_blocks, l2_safe_head, &self.inclusion_block, fetcher)
                    .await
            }
        }
    }
}

/// A Batch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Batch {
    /// A single batch
    Single(SingleBatch),
    /// Span Batches
    Span(SpanBatch),
}

impl Batch {
    /// Returns the timestamp for the batch.
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::Single(sb) => sb.timestamp,
            Self::Span(sb) => sb.starting_timestamp(),
        }
    }

    /// Returns the [BatchType] of the batch.
    pub const fn batch_type(&self) -> BatchType {
        match self {
            Self::Single(_) => BatchType::Single,
            Self::Span(_) => BatchType::Span,
        }
    }

    /// Attempts to decode a batch from a reader: a type byte followed by the batch body.
    pub fn decode(r: &mut &[u8], cfg: &RollupConfig) -> Result<Self, PipelineEncodingError> {
        let Some(&tag) = r.first() else {
            return Err(PipelineEncodingError::EmptyBuffer);
        };
        let batch_type = BatchType::try_from(tag)?;
        r.advance(1);

        match batch_type {
            BatchType::Single => {
                let single_batch =
                    SingleBatch::decode(r).map_err(PipelineEncodingError::AlloyRlpError)?;
                Ok(Self::Single(single_batch))
            }
            BatchType::Span => {
                let mut raw_span_batch = RawSpanBatch::decode(r)?;
                let span_batch =
                    raw_span_batch.derive(cfg.block_time, cfg.genesis.l2_time, cfg.l2_chain_id)?;
                Ok(Self::Span(span_batch))
            }
        }
    }

    /// Encodes the batch as its type byte followed by the batch body.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), PipelineEncodingError> {
        out.push(self.batch_type().into());
        match self {
            Self::Single(single) => single.encode(out),
            Self::Span(span) => span.to_raw_span_batch()?.encode(out)?,
        }
        Ok(())
    }
}
