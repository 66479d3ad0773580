//! This module contains the `BatchStream` stage.

use crate::{
    batch::{Batch, BatchValidity, BatchWithInclusionBlock, SingleBatch, SpanBatch},
    errors::{PipelineEncodingError, PipelineError},
    stages::NextBatchProvider,
    traits::{L2ChainProvider, OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, L2BlockInfo, PipelineResult, RollupConfig, Signal},
};
use async_trait::async_trait;
use std::{collections::VecDeque, fmt::Debug, sync::Arc};
use tracing::{error, trace, warn};

/// Provides [Batch]es for the [BatchStream] stage.
#[async_trait]
pub trait BatchStreamProvider {
    /// Returns the next [Batch] in the [BatchStream] stage.
    async fn next_batch(&mut self) -> PipelineResult<Batch>;

    /// Drains the recent `Channel` if an invalid span batch is found post-holocene.
    fn flush(&mut self);
}

/// [BatchStream] stage in the derivation pipeline.
///
/// Active from Holocene on, the stage sits between the [ChannelReader] and [BatchValidator]
/// stages. It checks the prefix of each span batch as it is read and spools the span into
/// [SingleBatch]es. Before Holocene every batch passes straight through to the [BatchQueue].
///
/// [ChannelReader]: crate::stages::ChannelReader
/// [BatchQueue]: crate::stages::BatchQueue
/// [BatchValidator]: crate::stages::BatchValidator
#[derive(Debug)]
pub struct BatchStream<P, BF>
where
    P: BatchStreamProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
    BF: L2ChainProvider + Debug,
{
    /// The previous stage in the derivation pipeline.
    pub prev: P,
    /// There can only be a single staged span batch.
    pub(crate) span: Option<SpanBatch>,
    /// A buffer of single batches derived from the [SpanBatch].
    pub(crate) buffer: VecDeque<SingleBatch>,
    /// A reference to the rollup config, used to check
    /// if the [BatchStream] stage should be activated.
    config: Arc<RollupConfig>,
    /// Used to validate the batches.
    fetcher: BF,
}

impl<P, BF> BatchStream<P, BF>
where
    P: BatchStreamProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
    BF: L2ChainProvider + Debug,
{
    /// Create a new [BatchStream] stage.
    pub const fn new(prev: P, config: Arc<RollupConfig>, fetcher: BF) -> Self {
        Self { prev, span: None, buffer: VecDeque::new(), config, fetcher }
    }

    /// Returns if the [BatchStream] stage is active based on the
    /// origin timestamp and holocene activation timestamp.
    pub fn is_active(&self) -> PipelineResult<bool> {
        let origin = self.prev.origin().ok_or(PipelineError::MissingOrigin.crit())?;
        Ok(self.config.is_holocene_active(origin.timestamp))
    }

    /// Gets a [SingleBatch] from the in-memory buffer.
    pub fn get_single_batch(
        &mut self,
        parent: L2BlockInfo,
        l1_origins: &[BlockInfo],
    ) -> PipelineResult<SingleBatch> {
        trace!(target: "batch_stream", "Attempting to get a SingleBatch from buffer len: {}", self.buffer.len());

        self.try_hydrate_buffer(parent, l1_origins)?;
        let mut next = self.buffer.pop_front().ok_or_else(|| PipelineError::NotEnoughData.temp())?;
        // Span elements carry no parent hash of their own; the safe head they are read on is it.
        next.parent_hash = parent.block_info.hash;
        Ok(next)
    }

    /// Hydrates the buffer with single batches derived from the span batch, if there is one
    /// queued up.
    ///
    /// Every element after the parent is spooled. Elements that turn out to be in the past by
    /// the time they are read are dropped by the [BatchValidator].
    ///
    /// [BatchValidator]: crate::stages::BatchValidator
    pub fn try_hydrate_buffer(
        &mut self,
        parent: L2BlockInfo,
        l1_origins: &[BlockInfo],
    ) -> PipelineResult<()> {
        if let Some(span) = self.span.take() {
            self.buffer.extend(
                span.get_singular_batches(l1_origins, parent).map_err(|e| {
                    PipelineError::BadEncoding(PipelineEncodingError::from(e)).crit()
                })?,
            );
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.span = None;
        self.buffer.clear();
    }
}

#[async_trait]
impl<P, BF> NextBatchProvider for BatchStream<P, BF>
where
    P: BatchStreamProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
    BF: L2ChainProvider + Send + Debug,
{
    fn flush(&mut self) {
        if self.is_active().unwrap_or(false) {
            self.prev.flush();
            self.clear();
        }
    }

    fn span_buffer_size(&self) -> usize {
        self.buffer.len()
    }

    async fn next_batch(
        &mut self,
        parent: L2BlockInfo,
        l1_origins: &[BlockInfo],
    ) -> PipelineResult<Batch> {
        // If the stage is not active, "pass" the next batch
        // through this stage to the BatchQueue stage.
        if !self.is_active()? {
            trace!(target: "batch_stream", "BatchStream stage is inactive, pass-through.");
            return self.prev.next_batch().await;
        }

        // If the buffer is empty, attempt to pull a batch from the previous stage.
        if self.buffer.is_empty() {
            let batch_with_inclusion = BatchWithInclusionBlock::new(
                self.origin().ok_or(PipelineError::MissingOrigin.crit())?,
                self.prev.next_batch().await?,
            );

            // If the next batch is a singular batch, it is immediately
            // forwarded to the `BatchValidator` stage. Otherwise, we buffer
            // the span batch in this stage if it passes the validity checks.
            match batch_with_inclusion.batch {
                Batch::Single(b) => return Ok(Batch::Single(b)),
                Batch::Span(b) => {
                    let (validity, _) = b
                        .check_batch_prefix(
                            self.config.as_ref(),
                            l1_origins,
                            parent,
                            &batch_with_inclusion.inclusion_block,
                            &mut self.fetcher,
                        )
                        .await;

                    match validity {
                        BatchValidity::Accept => self.span = Some(b),
                        BatchValidity::Drop => {
                            warn!(target: "batch_stream", "Dropping invalid span batch, flushing channel");
                            crate::inc!(DROPPED_BATCHES, &["span_prefix"]);
                            self.flush();
                            return Err(PipelineError::NotEnoughData.temp());
                        }
                        BatchValidity::Past => {
                            if !self.is_active()? {
                                error!(target: "batch_stream", "BatchValidity::Past is not allowed pre-holocene");
                                return Err(PipelineError::InvalidBatchValidity.crit());
                            }
                            crate::inc!(DROPPED_BATCHES, &["past"]);
                            return Err(PipelineError::NotEnoughData.temp());
                        }
                        BatchValidity::Undecided | BatchValidity::Future => {
                            return Err(PipelineError::NotEnoughData.temp())
                        }
                    }
                }
            }
        }

        // Attempt to pull a SingleBatch out of the SpanBatch.
        self.get_single_batch(parent, l1_origins).map(Batch::Single)
    }
}

#[async_trait]
impl<P, BF> OriginAdvancer for BatchStream<P, BF>
where
    P: BatchStreamProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
    BF: L2ChainProvider + Send + Debug,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

impl<P, BF> OriginProvider for BatchStream<P, BF>
where
    P: BatchStreamProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
    BF: L2ChainProvider + Debug,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P, BF> SignalReceiver for BatchStream<P, BF>
where
    P: BatchStreamProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug + Send,
    BF: L2ChainProvider + Send + Debug,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        if signal.is_reset_like() || matches!(signal, Signal::FlushChannel) {
            self.clear();
        }
        Ok(())
    }
}
