//! This module contains the `BatchQueue` stage implementation.

use super::NextBatchProvider;
use crate::{
    batch::{Batch, BatchValidity, BatchWithInclusionBlock, SingleBatch},
    errors::{PipelineEncodingError, PipelineError, PipelineErrorKind, ResetError},
    stages::AttributesProvider,
    traits::{L2ChainProvider, OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, L2BlockInfo, PipelineResult, ResetSignal, RollupConfig, Signal},
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tracing::{debug, error, info, warn};

/// [BatchQueue] is responsible for ordering unordered batches
/// and generating empty batches when the sequence window has passed.
///
/// It receives batches that are tagged with the L1 Inclusion block of the batch.
/// It only considers batches that are inside the sequencing window of a specific L1 Origin.
/// It tries to eagerly pull batches based on the current L2 safe head.
/// Otherwise it filters/creates an entire epoch's worth of batches at once.
///
/// This stage tracks a range of L1 blocks with the assumption that all batches with an L1 inclusion
/// block inside that range have been added to the stage by the time that it attempts to advance a
/// full epoch.
///
/// It is internally responsible for making sure that batches with L1 inclusions block outside it's
/// working range are not considered or pruned.
#[derive(Debug)]
pub struct BatchQueue<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
    BF: L2ChainProvider + Send + Debug,
{
    /// The rollup config.
    pub(crate) cfg: Arc<RollupConfig>,
    /// The previous stage of the derivation pipeline.
    pub prev: P,
    /// The l1 block ref
    pub(crate) origin: Option<BlockInfo>,
    /// A consecutive, time-centric window of L1 Blocks.
    /// Every L1 origin of unsafe L2 Blocks must be included in this list.
    /// If every L2 Block corresponding to a single L1 Block becomes safe,
    /// the block is popped from this list.
    /// If new L2 Block's L1 origin is not included in this list, fetch and
    /// push it to the list.
    pub(crate) l1_blocks: Vec<BlockInfo>,
    /// A set of batches in order from when we've seen them.
    pub(crate) batches: Vec<BatchWithInclusionBlock>,
    /// A set of cached [SingleBatch]es derived from [SpanBatch]es.
    ///
    /// [SpanBatch]: crate::batch::SpanBatch
    pub(crate) next_spans: Vec<SingleBatch>,
    /// Used to validate the batches.
    pub(crate) fetcher: BF,
}

impl<P, BF> BatchQueue<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
    BF: L2ChainProvider + Send + Debug,
{
    /// Creates a new [BatchQueue] stage.
    pub const fn new(cfg: Arc<RollupConfig>, prev: P, fetcher: BF) -> Self {
        Self {
            cfg,
            prev,
            origin: None,
            l1_blocks: Vec::new(),
            batches: Vec::new(),
            next_spans: Vec::new(),
            fetcher,
        }
    }

    /// Pops the next batch from the current queued up span-batch cache.
    /// The parent is used to set the parent hash of the batch.
    /// The parent is verified when the batch is later validated.
    pub fn pop_next_batch(&mut self, parent: L2BlockInfo) -> Option<SingleBatch> {
        if self.next_spans.is_empty() {
            return None;
        }
        let mut next = self.next_spans.remove(0);
        next.parent_hash = parent.block_info.hash;
        Some(next)
    }

    /// Derives the next batch to apply on top of the current L2 safe head.
    /// Follows the validity rules imposed on consecutive batches.
    /// Based on currently available buffered batch and L1 origin information.
    /// A [PipelineError::Eof] is returned if no batch can be derived yet.
    pub async fn derive_next_batch(
        &mut self,
        empty: bool,
        parent: L2BlockInfo,
    ) -> PipelineResult<Batch> {
        // Cannot derive a batch if no origin was prepared.
        if self.l1_blocks.is_empty() {
            return Err(PipelineError::MissingOrigin.crit());
        }

        // Get the epoch
        let epoch = self.l1_blocks[0];
        debug!(target: "batch_queue", "Deriving next batch for epoch: {}", epoch.number);

        // Note: epoch origin can now be one block ahead of the L2 Safe Head
        // This is in the case where we auto generate all batches in an epoch & advance the epoch
        // but don't advance the L2 Safe Head's epoch
        if parent.l1_origin != epoch.id() &&
            epoch.number.checked_sub(1) != Some(parent.l1_origin.number)
        {
            return Err(PipelineErrorKind::Reset(ResetError::L1OriginMismatch(
                parent.l1_origin.number,
                epoch.number.saturating_sub(1),
            )));
        }

        // Find the first-seen batch that matches all validity conditions.
        // We may not have sufficient information to proceed filtering, and then we stop.
        // There may be none: in that case we force-create an empty batch
        let mut next_batch = None;
        let next_timestamp = parent.block_info.timestamp + self.cfg.block_time;

        // Go over all batches, in order of inclusion, and find the first batch we can accept.
        // Filter in-place by only remembering the batches that may be processed in the future, or
        // any undecided ones.
        let mut remaining = Vec::new();
        for i in 0..self.batches.len() {
            let batch = &self.batches[i];
            let validity =
                batch.check_batch(&self.cfg, &self.l1_blocks, parent, &mut self.fetcher).await;
            match validity {
                BatchValidity::Future => {
                    remaining.push(batch.clone());
                }
                BatchValidity::Drop | BatchValidity::Past => {
                    warn!(target: "batch_queue", "Dropping batch with parent: {}", parent.block_info.number);
                    crate::inc!(DROPPED_BATCHES, &["invalid"]);
                    self.prev.flush();
                    continue;
                }
                BatchValidity::Accept => {
                    next_batch = Some(batch.clone());
                    // Don't keep the current batch in the remaining items since we are processing
                    // it now, but retain every batch we didn't get to yet.
                    remaining.extend_from_slice(&self.batches[i + 1..]);
                    break;
                }
                BatchValidity::Undecided => {
                    remaining.extend_from_slice(&self.batches[i..]);
                    self.batches = remaining;
                    return Err(PipelineError::Eof.temp());
                }
            }
        }
        self.batches = remaining;

        if let Some(nb) = next_batch {
            info!(target: "batch_queue", "Next batch found for timestamp {}", nb.batch.timestamp());
            return Ok(nb.batch);
        }

        // If the current epoch is too old compared to the L1 block we are at,
        // i.e. if the sequence window expired, we create empty batches for the current epoch
        let expiry_epoch = epoch.number + self.cfg.seq_window_size;
        let bq_origin = self.origin.ok_or(PipelineError::MissingOrigin.crit())?;
        let force_empty_batches =
            (expiry_epoch == bq_origin.number && empty) || expiry_epoch < bq_origin.number;
        let first_of_epoch = epoch.number == parent.l1_origin.number + 1;

        // If the sequencer window did not expire,
        // there is still room to receive batches for the current epoch.
        // No need to force-create empty batch(es) towards the next epoch yet.
        if !force_empty_batches {
            return Err(PipelineError::Eof.temp());
        }

        debug!(
            target: "batch_queue",
            "Generating empty batches for epoch: {} | parent: {}",
            epoch.number, parent.l1_origin.number
        );

        // The next L1 block is needed to proceed towards the next epoch.
        if self.l1_blocks.len() < 2 {
            return Err(PipelineError::Eof.temp());
        }

        let next_epoch = self.l1_blocks[1];

        // Fill with empty L2 blocks of the same epoch until we meet the time of the next L1 origin,
        // to preserve that L2 time >= L1 time. If this is the first block of the epoch, always
        // generate a batch to ensure that we at least have one batch per epoch.
        if next_timestamp < next_epoch.timestamp || first_of_epoch {
            info!(target: "batch_queue", "Generating empty batch for epoch: {}", epoch.number);
            return Ok(Batch::Single(SingleBatch {
                parent_hash: parent.block_info.hash,
                epoch_num: epoch.number,
                epoch_hash: epoch.hash,
                timestamp: next_timestamp,
                transactions: Vec::new(),
            }));
        }

        // At this point we have auto generated every batch for the current epoch
        // that we can, so we can advance to the next epoch.
        debug!(
            target: "batch_queue",
            "Advancing to next epoch: {}, timestamp: {}, epoch timestamp: {}",
            next_epoch.number, next_timestamp, next_epoch.timestamp
        );
        self.l1_blocks.remove(0);
        Err(PipelineError::Eof.temp())
    }

    /// Adds a batch to the queue.
    pub async fn add_batch(&mut self, batch: Batch, parent: L2BlockInfo) -> PipelineResult<()> {
        if self.l1_blocks.is_empty() {
            error!(target: "batch_queue", "Cannot add batch without an origin");
            return Err(PipelineError::MissingOrigin.crit());
        }
        let origin = self.origin.ok_or(PipelineError::MissingOrigin.crit())?;
        let data = BatchWithInclusionBlock { inclusion_block: origin, batch };
        // If we drop the batch, validation logs the drop reason with WARN level.
        if data.check_batch(&self.cfg, &self.l1_blocks, parent, &mut self.fetcher).await.is_drop() {
            crate::inc!(DROPPED_BATCHES, &["invalid"]);
            self.prev.flush();
            return Ok(());
        }
        self.batches.push(data);
        Ok(())
    }

    /// Updates the view of L1 blocks and the stage origin against the given parent.
    ///
    /// Returns whether the pipeline origin is still behind the parent's L1 origin.
    fn update_origins(&mut self, parent: &L2BlockInfo) -> PipelineResult<bool> {
        // If the epoch is advanced, update the l1 blocks.
        // Advancing epoch must be done after the pipeline successfully applies the entire span
        // batch to the chain.
        // Because the span batch can be reverted during processing the batch, then we must
        // preserve existing l1 blocks to verify the epochs of the next candidate batch.
        if !self.l1_blocks.is_empty() && parent.l1_origin.number > self.l1_blocks[0].number {
            if let Some(i) =
                self.l1_blocks.iter().position(|block| block.number == parent.l1_origin.number)
            {
                self.l1_blocks.drain(0..i);
                debug!(target: "batch_queue", "Advancing epoch");
            }
            // If the origin of the parent block is not included, we must advance the origin.
        }

        // NOTE: The origin is used to determine if it's behind.
        // It is the future origin that gets saved into the l1 blocks array.
        // We always update the origin of this stage if it's not the same so
        // after the update code runs, this is consistent.
        let origin_behind =
            self.prev.origin().map_or(true, |origin| origin.number < parent.l1_origin.number);

        // Advance the origin if needed.
        // The entire pipeline has the same origin.
        // Batches prior to the l1 origin of the l2 safe head are not accepted.
        if self.origin != self.prev.origin() {
            self.origin = self.prev.origin();
            if !origin_behind {
                let origin = self.origin.ok_or(PipelineError::MissingOrigin.crit())?;
                self.l1_blocks.push(origin);
            } else {
                // This is to handle the special case of startup.
                // At startup, the batch queue is reset and includes the
                // l1 origin. That is the only time where immediately after
                // reset is called, the origin behind is false.
                self.l1_blocks.clear();
            }
            debug!(target: "batch_queue", "Advancing batch queue origin: {:?}", self.origin.map(|o| o.number));
        }

        Ok(origin_behind)
    }

    async fn next_batch_inner(&mut self, parent: L2BlockInfo) -> PipelineResult<SingleBatch> {
        if !self.next_spans.is_empty() {
            // There are cached singular batches derived from the span batch.
            // Check if the next cached batch matches the given parent block.
            if self.next_spans[0].timestamp == parent.block_info.timestamp + self.cfg.block_time {
                return self.pop_next_batch(parent).ok_or(PipelineError::BatchQueueEmpty.crit());
            }
            // Parent block does not match the next batch.
            // Means the previously returned batch is invalid.
            // Drop cached batches and find another batch.
            warn!(
                target: "batch_queue",
                "Parent block does not match the next batch. Dropping {} cached batches.",
                self.next_spans.len()
            );
            self.next_spans.clear();
        }

        let origin_behind = self.update_origins(&parent)?;

        // Load more data into the batch queue.
        let mut out_of_data = false;
        match self.prev.next_batch(parent, &self.l1_blocks).await {
            Ok(b) => {
                if !origin_behind {
                    self.add_batch(b, parent).await?;
                } else {
                    warn!(target: "batch_queue", "Dropping batch: Origin is behind");
                }
            }
            Err(e) if e.is_eof() => out_of_data = true,
            Err(e) => return Err(e),
        }

        // Skip adding the data unless up to date with the origin,
        // but still fully empty the previous stages.
        if origin_behind {
            if out_of_data {
                return Err(PipelineError::Eof.temp());
            }
            return Err(PipelineError::NotEnoughData.temp());
        }

        // Attempt to derive more batches.
        let batch = match self.derive_next_batch(out_of_data, parent).await {
            Ok(b) => b,
            Err(e) if e.is_eof() => {
                if out_of_data {
                    return Err(PipelineError::Eof.temp());
                }
                return Err(PipelineError::NotEnoughData.temp());
            }
            Err(e) => return Err(e),
        };

        // If the next batch is derived from the span batch, it's the last batch of the span.
        // For singular batches, the span batch cache should be empty.
        match batch {
            Batch::Single(sb) => Ok(sb),
            Batch::Span(sb) => {
                self.next_spans = sb.get_singular_batches(&self.l1_blocks, parent).map_err(|e| {
                    PipelineError::BadEncoding(PipelineEncodingError::SpanBatchError(e)).crit()
                })?;
                self.pop_next_batch(parent).ok_or(PipelineError::BatchQueueEmpty.crit())
            }
        }
    }
}

#[async_trait]
impl<P, BF> OriginAdvancer for BatchQueue<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
    BF: L2ChainProvider + Send + Debug,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

#[async_trait]
impl<P, BF> AttributesProvider for BatchQueue<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
    BF: L2ChainProvider + Send + Debug,
{
    /// Returns the next valid batch upon the given safe head.
    async fn next_batch(&mut self, parent: L2BlockInfo) -> PipelineResult<SingleBatch> {
        crate::timer!(START, STAGE_ADVANCE_RESPONSE_TIME, &["batch_queue"], timer);
        let result = self.next_batch_inner(parent).await;
        if result.is_ok() {
            crate::timer!(STOP, timer);
        } else {
            crate::timer!(DISCARD, timer);
        }
        result
    }

    /// Returns if the previous batch was the last in the span.
    fn is_last_in_span(&self) -> bool {
        self.next_spans.is_empty()
    }
}

impl<P, BF> OriginProvider for BatchQueue<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
    BF: L2ChainProvider + Send + Debug,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P, BF> SignalReceiver for BatchQueue<P, BF>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
    BF: L2ChainProvider + Send + Debug,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        if let Signal::Reset(ResetSignal { l1_origin, .. }) = signal {
            self.origin = Some(l1_origin);
            self.batches.clear();
            // Include the new origin as an origin to build on.
            // This is only for the initialization case.
            // During normal resets we will later throw out this block.
            self.l1_blocks.clear();
            self.l1_blocks.push(l1_origin);
            self.next_spans.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        batch::{SpanBatch, SpanBatchElement},
        test_utils::{TestL2ChainProvider, TestNextBatchProvider},
    };
    use alloy_eips::BlockNumHash;
    use alloy_primitives::{Bytes, B256};

    fn l1_block(number: u64, timestamp: u64) -> BlockInfo {
        BlockInfo {
            hash: B256::with_last_byte(number as u8),
            number,
            parent_hash: B256::with_last_byte(number.saturating_sub(1) as u8),
            timestamp,
        }
    }

    fn safe_head(number: u64, timestamp: u64, epoch: &BlockInfo, seq_num: u64) -> L2BlockInfo {
        L2BlockInfo {
            block_info: BlockInfo {
                hash: B256::repeat_byte(0xA0 + number as u8),
                number,
                parent_hash: B256::repeat_byte(0xA0 + number.saturating_sub(1) as u8),
                timestamp,
            },
            l1_origin: epoch.id(),
            seq_num,
        }
    }

    fn cfg() -> Arc<RollupConfig> {
        Arc::new(RollupConfig {
            block_time: 2,
            seq_window_size: 4,
            max_sequencer_drift: 600,
            delta_time: Some(0),
            ..Default::default()
        })
    }

    async fn reset_queue(
        batches: Vec<PipelineResult<Batch>>,
        origin: BlockInfo,
    ) -> BatchQueue<TestNextBatchProvider, TestL2ChainProvider> {
        let mut mock = TestNextBatchProvider::new(batches);
        mock.origin = Some(origin);
        let mut bq = BatchQueue::new(cfg(), mock, TestL2ChainProvider::default());
        bq.signal(ResetSignal { l1_origin: origin, ..Default::default() }.signal()).await.unwrap();
        bq
    }

    #[tokio::test]
    async fn test_batch_queue_reset() {
        let origin = l1_block(1, 10);
        let bq = reset_queue(vec![], origin).await;
        assert_eq!(bq.origin, Some(origin));
        assert_eq!(bq.l1_blocks, vec![origin]);
        assert!(bq.batches.is_empty());
        assert!(bq.prev.reset);
    }

    #[tokio::test]
    async fn test_batch_queue_flush_signal_keeps_state() {
        let origin = l1_block(1, 10);
        let mut bq = reset_queue(vec![], origin).await;
        bq.next_spans.push(SingleBatch::default());
        bq.signal(Signal::FlushChannel).await.unwrap();
        assert_eq!(bq.next_spans.len(), 1);
        assert_eq!(bq.l1_blocks, vec![origin]);
    }

    #[tokio::test]
    async fn test_batch_queue_accepts_next_batch() {
        let epoch = l1_block(1, 10);
        let parent = safe_head(0, 10, &epoch, 0);
        let batch = SingleBatch {
            parent_hash: parent.block_info.hash,
            epoch_num: 1,
            epoch_hash: epoch.hash,
            timestamp: 12,
            transactions: vec![Bytes::from_static(&[0x02, 0xAA])],
        };
        let mut bq = reset_queue(vec![Ok(Batch::Single(batch.clone()))], epoch).await;

        let next = bq.next_batch(parent).await.unwrap();
        assert_eq!(next, batch);
        assert!(bq.is_last_in_span());
    }

    #[tokio::test]
    async fn test_batch_queue_origin_behind() {
        let origin = l1_block(1, 10);
        let epoch = l1_block(3, 30);
        let parent = safe_head(5, 30, &epoch, 0);
        let mut bq = reset_queue(vec![Ok(Batch::Single(SingleBatch::default()))], origin).await;

        // The batch is drained but dropped because the origin is behind.
        assert_eq!(bq.next_batch(parent).await.unwrap_err(), PipelineError::NotEnoughData.temp());
        assert!(bq.batches.is_empty());
        assert_eq!(bq.next_batch(parent).await.unwrap_err(), PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_batch_queue_drops_invalid_batch() {
        let epoch = l1_block(1, 10);
        let parent = safe_head(0, 10, &epoch, 0);
        // Deposits may not be part of a batch.
        let batch = SingleBatch {
            parent_hash: parent.block_info.hash,
            epoch_num: 1,
            epoch_hash: epoch.hash,
            timestamp: 12,
            transactions: vec![Bytes::from_static(&[0x7E, 0x00])],
        };
        let mut bq = reset_queue(vec![Ok(Batch::Single(batch))], epoch).await;
        assert_eq!(bq.next_batch(parent).await.unwrap_err(), PipelineError::NotEnoughData.temp());
        assert!(bq.batches.is_empty());
        assert!(bq.prev.flushed);
    }

    #[tokio::test]
    async fn test_batch_queue_buffers_future_batch() {
        let epoch = l1_block(1, 10);
        let parent = safe_head(0, 10, &epoch, 0);
        let first = SingleBatch {
            parent_hash: parent.block_info.hash,
            epoch_num: 1,
            epoch_hash: epoch.hash,
            timestamp: 12,
            transactions: vec![],
        };
        let second = SingleBatch { timestamp: 14, parent_hash: B256::ZERO, ..first.clone() };
        // Batches are popped from the back: the future batch arrives first.
        let batches = vec![Ok(Batch::Single(first.clone())), Ok(Batch::Single(second))];
        let mut bq = reset_queue(batches, epoch).await;

        assert_eq!(bq.next_batch(parent).await.unwrap_err(), PipelineError::NotEnoughData.temp());
        assert_eq!(bq.batches.len(), 1);
        assert_eq!(bq.next_batch(parent).await.unwrap(), first);
        assert_eq!(bq.batches.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_queue_empty_batches_after_sequencing_window() {
        let epoch = l1_block(1, 10);
        let next_epoch = l1_block(2, 20);
        let parent = safe_head(0, 10, &epoch, 0);
        let mut bq = reset_queue(vec![], epoch).await;

        // Walk the origin up to the end of the sequencing window without any batches.
        for number in 2..=4 {
            bq.prev.origin = Some(if number == 2 { next_epoch } else { l1_block(number, number * 10) });
            assert!(bq.next_batch(parent).await.unwrap_err().is_eof());
        }
        // The window of epoch 1 expires once the origin reaches block 5 and the stage is drained.
        bq.prev.origin = Some(l1_block(5, 50));

        let empty = bq.next_batch(parent).await.unwrap();
        assert_eq!(empty.timestamp, 12);
        assert_eq!(empty.epoch_num, 1);
        assert_eq!(empty.parent_hash, parent.block_info.hash);
        assert!(empty.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_batch_queue_explodes_span_batch() {
        let epoch = l1_block(1, 10);
        let parent = safe_head(0, 10, &epoch, 0);
        let mut span = SpanBatch::default();
        for (i, timestamp) in [12u64, 14, 16].into_iter().enumerate() {
            span.append_singular_batch(
                SingleBatch {
                    parent_hash: parent.block_info.hash,
                    epoch_num: 1,
                    epoch_hash: epoch.hash,
                    timestamp,
                    transactions: vec![],
                },
                i as u64 + 1,
            )
            .unwrap();
        }
        let mut bq = reset_queue(vec![Ok(Batch::Span(span))], epoch).await;

        let first = bq.next_batch(parent).await.unwrap();
        assert_eq!(first.timestamp, 12);
        assert!(!bq.is_last_in_span());

        let parent = safe_head(1, 12, &epoch, 1);
        let second = bq.next_batch(parent).await.unwrap();
        assert_eq!(second.timestamp, 14);
        assert_eq!(second.parent_hash, parent.block_info.hash);

        let parent = safe_head(2, 14, &epoch, 2);
        let third = bq.next_batch(parent).await.unwrap();
        assert_eq!(third.timestamp, 16);
        assert!(bq.is_last_in_span());
    }

    #[tokio::test]
    async fn test_batch_queue_drops_stale_span_cache() {
        let epoch = l1_block(1, 10);
        let parent = safe_head(0, 10, &epoch, 0);
        let mut bq = reset_queue(vec![], epoch).await;
        bq.next_spans = vec![SingleBatch { timestamp: 40, ..Default::default() }];
        let err = bq.next_batch(parent).await.unwrap_err();
        assert!(err.is_eof() || err.is_not_enough_data());
        assert!(bq.next_spans.is_empty());
    }

    #[tokio::test]
    async fn test_batch_queue_l1_origin_mismatch() {
        let epoch = l1_block(5, 50);
        let parent = L2BlockInfo {
            l1_origin: BlockNumHash { number: 1, hash: B256::ZERO },
            ..Default::default()
        };
        let mut bq = reset_queue(vec![], epoch).await;
        let err = bq.derive_next_batch(false, parent).await.unwrap_err();
        assert_eq!(err, ResetError::L1OriginMismatch(1, 4).reset());
    }

    #[tokio::test]
    async fn test_pop_next_batch_empty() {
        let mut bq = reset_queue(vec![], l1_block(1, 10)).await;
        assert!(bq.pop_next_batch(L2BlockInfo::default()).is_none());
    }
}
