//! Contains the [BatchValidator] stage.

use super::NextBatchProvider;
use crate::{
    batch::{Batch, BatchValidity, SingleBatch},
    errors::{PipelineError, PipelineErrorKind, ResetError},
    stages::AttributesProvider,
    traits::{OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, L2BlockInfo, PipelineResult, ResetSignal, RollupConfig, Signal},
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tracing::{debug, error, info, warn};

/// The [BatchValidator] stage is responsible for validating the [SingleBatch]es from
/// the [BatchStream] for the [AttributesQueue]'s consumption.
///
/// It replaces the [BatchQueue] once Holocene is active: batches arrive in order, so nothing is
/// buffered and every invalid batch is dropped on sight.
///
/// [BatchStream]: crate::stages::BatchStream
/// [BatchQueue]: crate::stages::BatchQueue
/// [AttributesQueue]: crate::stages::AttributesQueue
#[derive(Debug)]
pub struct BatchValidator<P>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    /// The rollup configuration.
    pub(crate) cfg: Arc<RollupConfig>,
    /// The previous stage of the derivation pipeline.
    pub(crate) prev: P,
    /// The L1 origin of the batch sequencer.
    pub(crate) origin: Option<BlockInfo>,
    /// A consecutive, time-centric window of L1 Blocks.
    /// Every L1 origin of unsafe L2 Blocks must be included in this list.
    /// If every L2 Block corresponding to a single L1 Block becomes safe,
    /// the block is popped from this list.
    /// If new L2 Block's L1 origin is not included in this list, fetch and
    /// push it to the list.
    pub(crate) l1_blocks: Vec<BlockInfo>,
}

impl<P> BatchValidator<P>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    /// Create a new [BatchValidator] stage.
    pub const fn new(cfg: Arc<RollupConfig>, prev: P) -> Self {
        Self { cfg, prev, origin: None, l1_blocks: Vec::new() }
    }

    /// Returns `true` if the pipeline origin is behind the parent origin.
    fn origin_behind(&self, parent: &L2BlockInfo) -> bool {
        self.prev.origin().map_or(true, |origin| origin.number < parent.l1_origin.number)
    }

    /// Updates the [BatchValidator]'s view of the L1 origin blocks.
    pub(crate) fn update_origins(&mut self, parent: &L2BlockInfo) -> PipelineResult<()> {
        // NOTE: The origin is used to determine if it's behind.
        // It is the future origin that gets saved into the l1 blocks array.
        // We always update the origin of this stage if it's not the same so
        // after the update code runs, this is consistent.
        let origin_behind = self.origin_behind(parent);

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
                // At startup, the batch validator is reset and includes the
                // l1 origin. That is the only time when immediately after
                // reset is called, the origin behind is false.
                self.l1_blocks.clear();
            }
            debug!(
                target: "batch_validator",
                "Advancing batch validator origin to L1 block #{}{}",
                self.origin.map(|b| b.number).unwrap_or_default(),
                if origin_behind { " (origin behind)" } else { "" }
            );
        }

        // With Holocene the epoch can always be pruned, batches are never invalidated
        // backwards.
        if !self.l1_blocks.is_empty() && parent.l1_origin.number > self.l1_blocks[0].number {
            if let Some(i) =
                self.l1_blocks.iter().position(|block| block.number == parent.l1_origin.number)
            {
                self.l1_blocks.drain(0..i);
                debug!(target: "batch_validator", "Advancing internal L1 epoch");
            }
        }

        Ok(())
    }

    /// Attempts to derive an empty batch, if the sequencing window is expired.
    pub(crate) fn try_derive_empty_batch(
        &mut self,
        parent: &L2BlockInfo,
    ) -> PipelineResult<SingleBatch> {
        let epoch = *self.l1_blocks.first().ok_or(PipelineError::MissingOrigin.crit())?;

        // If the current epoch is too old compared to the L1 block we are at,
        // i.e. if the sequence window expired, we create empty batches for the current epoch
        let stage_origin = self.origin.ok_or(PipelineError::MissingOrigin.crit())?;
        let expiry_epoch = epoch.number + self.cfg.seq_window_size;
        let force_empty_batches = expiry_epoch <= stage_origin.number;
        let first_of_epoch = epoch.number == parent.l1_origin.number + 1;
        let next_timestamp = parent.block_info.timestamp + self.cfg.block_time;

        if !force_empty_batches {
            return Err(PipelineError::Eof.temp());
        }

        // The next L1 block is needed to proceed towards the next epoch.
        if self.l1_blocks.len() < 2 {
            return Err(PipelineError::Eof.temp());
        }

        let next_epoch = self.l1_blocks[1];

        // Fill with empty L2 blocks of the same epoch until we meet the time of the next L1 origin,
        // to preserve that L2 time >= L1 time. If this is the first block of the epoch, always
        // generate a batch to ensure that we at least have one batch per epoch.
        if next_timestamp < next_epoch.timestamp || first_of_epoch {
            info!(target: "batch_validator", "Generating empty batch for epoch #{}", epoch.number);
            return Ok(SingleBatch {
                parent_hash: parent.block_info.hash,
                epoch_num: epoch.number,
                epoch_hash: epoch.hash,
                timestamp: next_timestamp,
                transactions: Vec::new(),
            });
        }

        // At this point we have auto generated every batch for the current epoch
        // that we can, so we can advance to the next epoch.
        debug!(
            target: "batch_validator",
            "Advancing batch validator epoch: {}, timestamp: {}, epoch timestamp: {}",
            next_epoch.number, next_timestamp, next_epoch.timestamp
        );
        self.l1_blocks.remove(0);
        Err(PipelineError::Eof.temp())
    }

    async fn next_batch_inner(&mut self, parent: L2BlockInfo) -> PipelineResult<SingleBatch> {
        self.update_origins(&parent)?;

        // If the origin is behind, or at the parent's origin, the previous stages are drained.
        // A channel from the parent's L1 origin block can only contain past batches.
        let stage_origin = self.origin.ok_or(PipelineError::MissingOrigin.crit())?;
        if self.origin_behind(&parent) || parent.l1_origin.number == stage_origin.number {
            self.prev.next_batch(parent, &self.l1_blocks).await?;
            return Err(PipelineError::NotEnoughData.temp());
        }

        // At least the L1 origin of the safe block and the L1 origin of the following block must
        // be included in the l1 blocks.
        if self.l1_blocks.len() < 2 {
            return Err(PipelineError::MissingOrigin.crit());
        }

        // Note: epoch origin can now be one block ahead of the L2 Safe Head
        // This is in the case where we auto generate all batches in an epoch & advance the epoch
        // but don't advance the L2 Safe Head's epoch
        let epoch = self.l1_blocks[0];
        if parent.l1_origin != epoch.id() &&
            epoch.number.checked_sub(1) != Some(parent.l1_origin.number)
        {
            return Err(PipelineErrorKind::Reset(ResetError::L1OriginMismatch(
                parent.l1_origin.number,
                epoch.number.saturating_sub(1),
            )));
        }

        let next_batch = match self.prev.next_batch(parent, &self.l1_blocks).await {
            Ok(batch) => batch,
            Err(e) if e.is_eof() => return self.try_derive_empty_batch(&parent),
            Err(e) => return Err(e),
        };

        // Spans are exploded by the batch stream before they reach this stage.
        let Batch::Single(next_batch) = next_batch else {
            error!(target: "batch_validator", "BatchValidator received a batch that is not a SingleBatch");
            return Err(PipelineError::InvalidBatchType.crit());
        };

        match next_batch.check_batch(&self.cfg, &self.l1_blocks, parent, &stage_origin) {
            BatchValidity::Accept => {
                info!(target: "batch_validator", "Found next batch (epoch #{})", next_batch.epoch_num);
                Ok(next_batch)
            }
            BatchValidity::Past => {
                warn!(target: "batch_validator", "Dropping past batch with timestamp {}", next_batch.timestamp);
                crate::inc!(DROPPED_BATCHES, &["past"]);
                Err(PipelineError::NotEnoughData.temp())
            }
            BatchValidity::Drop => {
                warn!(target: "batch_validator", "Invalid singular batch, flushing current channel");
                crate::inc!(DROPPED_BATCHES, &["invalid"]);
                self.prev.flush();
                Err(PipelineError::NotEnoughData.temp())
            }
            BatchValidity::Undecided => Err(PipelineError::NotEnoughData.temp()),
            BatchValidity::Future => {
                error!(target: "batch_validator", "Future batch detected in BatchValidator");
                Err(PipelineError::InvalidBatchValidity.crit())
            }
        }
    }
}

#[async_trait]
impl<P> AttributesProvider for BatchValidator<P>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn next_batch(&mut self, parent: L2BlockInfo) -> PipelineResult<SingleBatch> {
        crate::timer!(START, STAGE_ADVANCE_RESPONSE_TIME, &["batch_validator"], timer);
        let result = self.next_batch_inner(parent).await;
        if result.is_ok() {
            crate::timer!(STOP, timer);
        } else {
            crate::timer!(DISCARD, timer);
        }
        result
    }

    fn is_last_in_span(&self) -> bool {
        self.prev.span_buffer_size() == 0
    }
}

impl<P> OriginProvider for BatchValidator<P>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> OriginAdvancer for BatchValidator<P>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

#[async_trait]
impl<P> SignalReceiver for BatchValidator<P>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        if let Signal::Reset(ResetSignal { l1_origin, .. }) = signal {
            self.origin = Some(l1_origin);
            // Include the new origin as an origin to build on.
            // This is only for the initialization case.
            // During normal resets we will later throw out this block.
            self.l1_blocks.clear();
            self.l1_blocks.push(l1_origin);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        batch::SpanBatch,
        test_utils::{CollectingLayer, TestNextBatchProvider, TraceStorage},
    };
    use alloy_eips::BlockNumHash;
    use alloy_primitives::B256;
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    async fn reset_validator(
        cfg: RollupConfig,
        mock: TestNextBatchProvider,
        l1_origin: BlockInfo,
    ) -> BatchValidator<TestNextBatchProvider> {
        let origin = mock.origin;
        let mut bv = BatchValidator::new(Arc::new(cfg), mock);
        bv.signal(ResetSignal { l1_origin, ..Default::default() }.signal()).await.unwrap();
        // The previous stage is already past the reset origin.
        bv.prev.origin = origin;
        bv
    }

    #[tokio::test]
    async fn test_batch_validator_origin_behind_eof() {
        let cfg = Arc::new(RollupConfig::default());
        let mut mock = TestNextBatchProvider::new(vec![]);
        mock.origin = Some(BlockInfo::default());
        let mut bv = BatchValidator::new(cfg, mock);
        bv.origin = Some(BlockInfo { number: 1, ..Default::default() });

        let parent = L2BlockInfo {
            l1_origin: BlockNumHash { number: 5, ..Default::default() },
            ..Default::default()
        };
        assert_eq!(bv.next_batch(parent).await.unwrap_err(), PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_batch_validator_origin_behind_startup() {
        let mut mock = TestNextBatchProvider::new(vec![]);
        mock.origin = Some(BlockInfo::default());
        let mut bv = reset_validator(
            RollupConfig::default(),
            mock,
            BlockInfo { number: 1, ..Default::default() },
        )
        .await;

        let parent = L2BlockInfo {
            l1_origin: BlockNumHash { number: 2, ..Default::default() },
            ..Default::default()
        };
        assert_eq!(bv.l1_blocks.len(), 1);
        bv.update_origins(&parent).unwrap();
        assert!(bv.l1_blocks.is_empty());
    }

    #[tokio::test]
    async fn test_batch_validator_origin_advance() {
        let mut mock = TestNextBatchProvider::new(vec![]);
        mock.origin = Some(BlockInfo { number: 2, ..Default::default() });
        let mut bv = reset_validator(
            RollupConfig::default(),
            mock,
            BlockInfo { number: 1, ..Default::default() },
        )
        .await;

        let parent = L2BlockInfo {
            l1_origin: BlockNumHash { number: 1, ..Default::default() },
            ..Default::default()
        };
        bv.update_origins(&parent).unwrap();
        assert_eq!(bv.l1_blocks.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_validator_advance_epoch() {
        let mut mock = TestNextBatchProvider::new(vec![]);
        mock.origin = Some(BlockInfo { number: 2, ..Default::default() });
        let mut bv = reset_validator(
            RollupConfig::default(),
            mock,
            BlockInfo { number: 1, ..Default::default() },
        )
        .await;

        let parent = L2BlockInfo {
            l1_origin: BlockNumHash { number: 2, ..Default::default() },
            ..Default::default()
        };
        assert_eq!(bv.l1_blocks[0].number, 1);
        assert_eq!(bv.next_batch(parent).await.unwrap_err(), PipelineError::Eof.temp());
        assert_eq!(bv.l1_blocks.len(), 1);
        assert_eq!(bv.l1_blocks[0].number, 2);
    }

    #[tokio::test]
    async fn test_batch_validator_origin_behind_drains_prev() {
        let mut mock = TestNextBatchProvider::new(
            (0..5).map(|_| Ok(Batch::Single(SingleBatch::default()))).collect(),
        );
        mock.origin = Some(BlockInfo::default());
        let mut bv = BatchValidator::new(Arc::new(RollupConfig::default()), mock);
        bv.origin = Some(BlockInfo::default());

        let parent = L2BlockInfo {
            l1_origin: BlockNumHash { number: 5, ..Default::default() },
            ..Default::default()
        };
        assert_eq!(bv.prev.span_buffer_size(), 5);
        for i in 0..5 {
            assert_eq!(
                bv.next_batch(parent).await.unwrap_err(),
                PipelineError::NotEnoughData.temp()
            );
            assert_eq!(bv.prev.span_buffer_size(), 4 - i);
        }
        assert_eq!(bv.next_batch(parent).await.unwrap_err(), PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_batch_validator_l1_origin_mismatch() {
        let mut mock = TestNextBatchProvider::new(vec![Ok(Batch::Single(SingleBatch::default()))]);
        mock.origin = Some(BlockInfo { number: 1, ..Default::default() });
        let mut bv = BatchValidator::new(Arc::new(RollupConfig::default()), mock);
        bv.origin = Some(BlockInfo::default());
        bv.l1_blocks.push(BlockInfo::default());

        let parent = L2BlockInfo {
            l1_origin: BlockNumHash { number: 0, hash: B256::repeat_byte(0xFF) },
            ..Default::default()
        };
        assert!(matches!(
            bv.next_batch(parent).await.unwrap_err(),
            PipelineErrorKind::Reset(ResetError::L1OriginMismatch(_, _))
        ));
    }

    #[tokio::test]
    async fn test_batch_validator_received_span_batch() {
        let mut mock = TestNextBatchProvider::new(vec![Ok(Batch::Span(SpanBatch::default()))]);
        mock.origin = Some(BlockInfo { number: 1, ..Default::default() });
        let mut bv = BatchValidator::new(Arc::new(RollupConfig::default()), mock);
        bv.origin = Some(BlockInfo::default());
        bv.l1_blocks.push(BlockInfo::default());

        let parent = L2BlockInfo::default();
        assert_eq!(bv.next_batch(parent).await.unwrap_err(), PipelineError::InvalidBatchType.crit());
        // The stream is empty, the sequencing window has not expired.
        assert_eq!(bv.next_batch(parent).await.unwrap_err(), PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_batch_validator_next_batch_valid() {
        let cfg = RollupConfig {
            holocene_time: Some(0),
            block_time: 2,
            max_sequencer_drift: 700,
            ..Default::default()
        };
        let batch = SingleBatch { epoch_num: 1, timestamp: 4, ..Default::default() };
        let parent = L2BlockInfo {
            l1_origin: BlockNumHash { number: 0, ..Default::default() },
            block_info: BlockInfo { timestamp: 2, ..Default::default() },
            ..Default::default()
        };
        let mut mock = TestNextBatchProvider::new(vec![Ok(Batch::Single(batch.clone()))]);
        mock.origin = Some(BlockInfo { number: 1, ..Default::default() });
        let mut bv = reset_validator(cfg, mock, BlockInfo::default()).await;

        assert_eq!(bv.next_batch(parent).await.unwrap(), batch);
    }

    #[tokio::test]
    async fn test_batch_validator_parent_hash_mismatch_flushes() {
        let cfg = RollupConfig {
            holocene_time: Some(0),
            block_time: 2,
            max_sequencer_drift: 700,
            ..Default::default()
        };
        let batch = SingleBatch {
            parent_hash: B256::repeat_byte(0xEE),
            epoch_num: 1,
            timestamp: 4,
            ..Default::default()
        };
        let parent = L2BlockInfo {
            block_info: BlockInfo {
                hash: B256::repeat_byte(0x11),
                timestamp: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut mock = TestNextBatchProvider::new(vec![Ok(Batch::Single(batch))]);
        mock.origin = Some(BlockInfo { number: 1, ..Default::default() });
        let mut bv = reset_validator(cfg, mock, BlockInfo::default()).await;

        assert_eq!(bv.next_batch(parent).await.unwrap_err(), PipelineError::NotEnoughData.temp());
        assert!(bv.prev.flushed);
    }

    #[tokio::test]
    async fn test_batch_validator_drops_past_batch_without_flush() {
        let cfg = RollupConfig { holocene_time: Some(0), block_time: 2, ..Default::default() };
        let past = SingleBatch { epoch_num: 1, timestamp: 2, ..Default::default() };
        let parent = L2BlockInfo {
            block_info: BlockInfo { timestamp: 2, ..Default::default() },
            ..Default::default()
        };
        let mut mock = TestNextBatchProvider::new(vec![Ok(Batch::Single(past))]);
        mock.origin = Some(BlockInfo { number: 1, ..Default::default() });
        let mut bv = reset_validator(cfg, mock, BlockInfo::default()).await;

        assert_eq!(bv.next_batch(parent).await.unwrap_err(), PipelineError::NotEnoughData.temp());
        assert!(!bv.prev.flushed);
    }

    #[tokio::test]
    async fn test_batch_validator_invalid_batch_flushes() {
        let cfg = RollupConfig { holocene_time: Some(0), block_time: 2, ..Default::default() };
        // The epoch skips ahead by two blocks.
        let invalid = SingleBatch { epoch_num: 3, timestamp: 4, ..Default::default() };
        let parent = L2BlockInfo {
            block_info: BlockInfo { timestamp: 2, ..Default::default() },
            ..Default::default()
        };
        let mut mock = TestNextBatchProvider::new(vec![Ok(Batch::Single(invalid))]);
        mock.origin = Some(BlockInfo { number: 1, ..Default::default() });
        let mut bv = reset_validator(cfg, mock, BlockInfo::default()).await;

        assert_eq!(bv.next_batch(parent).await.unwrap_err(), PipelineError::NotEnoughData.temp());
        assert!(bv.prev.flushed);
    }

    #[tokio::test]
    async fn test_batch_validator_sequence_window_expired() {
        let trace_store: TraceStorage = Default::default();
        let layer = CollectingLayer::new(trace_store.clone());
        let subscriber = tracing_subscriber::Registry::default().with(layer);
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut mock = TestNextBatchProvider::new(vec![]);
        mock.origin = Some(BlockInfo { number: 1, ..Default::default() });
        let mut bv = reset_validator(
            RollupConfig { seq_window_size: 5, ..Default::default() },
            mock,
            BlockInfo { number: 1, ..Default::default() },
        )
        .await;

        // Advance the origin of the previous stage to block #7.
        for _ in 0..6 {
            bv.advance_origin().await.unwrap();
        }

        let parent = L2BlockInfo {
            l1_origin: BlockNumHash { number: 0, ..Default::default() },
            ..Default::default()
        };
        assert!(bv.next_batch(parent).await.unwrap().transactions.is_empty());

        let trace_lock = trace_store.lock();
        assert_eq!(trace_lock.iter().filter(|(l, _)| matches!(l, &Level::DEBUG)).count(), 1);
        assert_eq!(trace_lock.iter().filter(|(l, _)| matches!(l, &Level::INFO)).count(), 1);
        assert!(trace_lock[0].1.contains("Advancing batch validator origin"));
        assert!(trace_lock[1].1.contains("Generating empty batch for epoch"));
    }

    #[tokio::test]
    async fn test_batch_validator_sequence_window_expired_advance_epoch() {
        let trace_store: TraceStorage = Default::default();
        let layer = CollectingLayer::new(trace_store.clone());
        let subscriber = tracing_subscriber::Registry::default().with(layer);
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut mock = TestNextBatchProvider::new(vec![]);
        mock.origin = Some(BlockInfo { number: 1, ..Default::default() });
        let mut bv = reset_validator(
            RollupConfig { seq_window_size: 5, ..Default::default() },
            mock,
            BlockInfo { number: 1, ..Default::default() },
        )
        .await;
        for _ in 0..6 {
            bv.advance_origin().await.unwrap();
        }

        let parent = L2BlockInfo {
            l1_origin: BlockNumHash { number: 1, ..Default::default() },
            ..Default::default()
        };
        assert_eq!(bv.next_batch(parent).await.unwrap_err(), PipelineError::Eof.temp());

        let trace_lock = trace_store.lock();
        assert_eq!(trace_lock.iter().filter(|(l, _)| matches!(l, &Level::DEBUG)).count(), 2);
        assert!(trace_lock[0].1.contains("Advancing batch validator origin"));
        assert!(trace_lock[1].1.contains("Advancing batch validator epoch"));
    }
}
