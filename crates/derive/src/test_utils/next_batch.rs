//! A mock [NextBatchProvider] for the [BatchQueue] and [BatchValidator] stages.
//!
//! [BatchQueue]: crate::stages::BatchQueue
//! [BatchValidator]: crate::stages::BatchValidator

use super::signal_origin;
use crate::{
    batch::Batch,
    errors::PipelineError,
    stages::NextBatchProvider,
    traits::{OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, L2BlockInfo, PipelineResult, Signal},
};
use async_trait::async_trait;

/// A mock provider for the batch ordering stages.
#[derive(Debug, Default)]
pub struct TestNextBatchProvider {
    /// The origin of the L1 block.
    pub origin: Option<BlockInfo>,
    /// A list of batches to return.
    pub batches: Vec<PipelineResult<Batch>>,
    /// Tracks if the provider has been flushed.
    pub flushed: bool,
    /// Tracks if the reset method was called.
    pub reset: bool,
}

impl TestNextBatchProvider {
    /// Creates a new [TestNextBatchProvider] with the given batches.
    pub fn new(batches: Vec<PipelineResult<Batch>>) -> Self {
        Self { origin: Some(BlockInfo::default()), batches, flushed: false, reset: false }
    }
}

impl OriginProvider for TestNextBatchProvider {
    fn origin(&self) -> Option<BlockInfo> {
        self.origin
    }
}

#[async_trait]
impl NextBatchProvider for TestNextBatchProvider {
    async fn next_batch(&mut self, _: L2BlockInfo, _: &[BlockInfo]) -> PipelineResult<Batch> {
        self.batches.pop().ok_or(PipelineError::Eof.temp())?
    }

    fn span_buffer_size(&self) -> usize {
        self.batches.len()
    }

    fn flush(&mut self) {
        self.flushed = true;
    }
}

#[async_trait]
impl OriginAdvancer for TestNextBatchProvider {
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        if let Some(origin) = self.origin.as_mut() {
            origin.number += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl SignalReceiver for TestNextBatchProvider {
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match signal {
            Signal::FlushChannel => self.flushed = true,
            Signal::L1Finalized(_) => {}
            _ => {
                self.origin = signal_origin(&signal);
                self.reset = true;
            }
        }
        Ok(())
    }
}
