//! This module contains the [BatchProvider] stage.

use super::{BatchQueue, BatchValidator, NextBatchProvider};
use crate::{
    batch::SingleBatch,
    errors::PipelineError,
    stages::AttributesProvider,
    traits::{L2ChainProvider, OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, L2BlockInfo, PipelineResult, RollupConfig, Signal},
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tracing::info;

/// The [BatchProvider] stage is a multiplexer over the [BatchQueue] and [BatchValidator] stages.
///
/// The [BatchQueue] is active before Holocene and the [BatchValidator] after. Unlike the channel
/// stages, the L1 origin window survives a switch, so the incoming stage continues from the
/// origin and epoch view of the outgoing one.
#[derive(Debug)]
pub struct BatchProvider<P, F>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
    F: L2ChainProvider + Clone + Send + Debug,
{
    /// The rollup configuration.
    cfg: Arc<RollupConfig>,
    /// The L2 chain fetcher, handed to every [BatchQueue] that gets built.
    fetcher: F,
    /// The previous stage, held only until the first active stage is built.
    prev: Option<P>,
    /// The batch queue, active before Holocene.
    batch_queue: Option<BatchQueue<P, F>>,
    /// The batch validator, active after Holocene.
    batch_validator: Option<BatchValidator<P>>,
}

/// A mutable reference to the active batch stage.
#[derive(Debug)]
pub enum ActiveBatchStage<'a, P, F>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
    F: L2ChainProvider + Clone + Send + Debug,
{
    /// The pre-Holocene [BatchQueue].
    Queue(&'a mut BatchQueue<P, F>),
    /// The post-Holocene [BatchValidator].
    Validator(&'a mut BatchValidator<P>),
}

impl<P, F> BatchProvider<P, F>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
    F: L2ChainProvider + Clone + Send + Debug,
{
    /// Creates a new [BatchProvider] with the given configuration, previous stage and fetcher.
    pub const fn new(cfg: Arc<RollupConfig>, prev: P, fetcher: F) -> Self {
        Self { cfg, fetcher, prev: Some(prev), batch_queue: None, batch_validator: None }
    }

    /// Builds or swaps the active stage for the current L1 origin.
    fn attempt_update(&mut self) -> PipelineResult<()> {
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;
        let holocene = self.cfg.is_holocene_active(origin.timestamp);

        if let Some(prev) = self.prev.take() {
            if holocene {
                self.batch_validator = Some(BatchValidator::new(self.cfg.clone(), prev));
            } else {
                self.batch_queue =
                    Some(BatchQueue::new(self.cfg.clone(), prev, self.fetcher.clone()));
            }
        } else if holocene {
            if let Some(queue) = self.batch_queue.take() {
                info!(target: "batch_provider", "Holocene active, switching to batch validator");
                let mut validator = BatchValidator::new(self.cfg.clone(), queue.prev);
                validator.origin = queue.origin;
                validator.l1_blocks = queue.l1_blocks;
                self.batch_validator = Some(validator);
            }
        } else if let Some(validator) = self.batch_validator.take() {
            info!(target: "batch_provider", "Holocene inactive, switching to batch queue");
            let mut queue = BatchQueue::new(self.cfg.clone(), validator.prev, self.fetcher.clone());
            queue.origin = validator.origin;
            queue.l1_blocks = validator.l1_blocks;
            self.batch_queue = Some(queue);
        }
        Ok(())
    }

    /// Returns the active stage, updating it for the current L1 origin first.
    pub fn active_stage_mut(&mut self) -> PipelineResult<ActiveBatchStage<'_, P, F>> {
        self.attempt_update()?;
        if let Some(queue) = self.batch_queue.as_mut() {
            Ok(ActiveBatchStage::Queue(queue))
        } else if let Some(validator) = self.batch_validator.as_mut() {
            Ok(ActiveBatchStage::Validator(validator))
        } else {
            Err(PipelineError::NotEnoughData.temp())
        }
    }
}

#[async_trait]
impl<P, F> OriginAdvancer for BatchProvider<P, F>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
    F: L2ChainProvider + Clone + Send + Debug,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        match self.active_stage_mut()? {
            ActiveBatchStage::Queue(stage) => stage.advance_origin().await,
            ActiveBatchStage::Validator(stage) => stage.advance_origin().await,
        }
    }
}

impl<P, F> OriginProvider for BatchProvider<P, F>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
    F: L2ChainProvider + Clone + Send + Debug,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.batch_queue.as_ref().map_or_else(
            || {
                self.batch_validator.as_ref().map_or_else(
                    || self.prev.as_ref().and_then(|prev| prev.origin()),
                    |validator| validator.origin(),
                )
            },
            |queue| queue.origin(),
        )
    }
}

#[async_trait]
impl<P, F> SignalReceiver for BatchProvider<P, F>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
    F: L2ChainProvider + Clone + Send + Debug,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match self.active_stage_mut()? {
            ActiveBatchStage::Queue(stage) => stage.signal(signal).await?,
            ActiveBatchStage::Validator(stage) => stage.signal(signal).await?,
        }
        self.attempt_update()
    }
}

#[async_trait]
impl<P, F> AttributesProvider for BatchProvider<P, F>
where
    P: NextBatchProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
    F: L2ChainProvider + Clone + Send + Debug,
{
    async fn next_batch(&mut self, parent: L2BlockInfo) -> PipelineResult<SingleBatch> {
        match self.active_stage_mut()? {
            ActiveBatchStage::Queue(stage) => stage.next_batch(parent).await,
            ActiveBatchStage::Validator(stage) => stage.next_batch(parent).await,
        }
    }

    fn is_last_in_span(&self) -> bool {
        if let Some(queue) = self.batch_queue.as_ref() {
            queue.is_last_in_span()
        } else if let Some(validator) = self.batch_validator.as_ref() {
            validator.is_last_in_span()
        } else {
            false
        }
    }
}
