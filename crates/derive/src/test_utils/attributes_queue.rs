//! Testing utilities for the attributes queue stage.

use crate::{
    batch::SingleBatch,
    errors::{BuilderError, PipelineError},
    stages::AttributesProvider,
    traits::{AttributesBuilder, OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, L2BlockInfo, PayloadAttributes, PipelineResult, Signal},
};
use alloy_eips::BlockNumHash;
use async_trait::async_trait;

/// A mock implementation of the [`AttributesBuilder`] for testing.
///
/// Attributes are popped from the back of the queue.
#[derive(Debug, Default)]
pub struct TestAttributesBuilder {
    /// The attributes to return.
    pub attributes: Vec<PipelineResult<PayloadAttributes>>,
}

#[async_trait]
impl AttributesBuilder for TestAttributesBuilder {
    async fn prepare_payload_attributes(
        &mut self,
        _l2_parent: L2BlockInfo,
        _epoch: BlockNumHash,
    ) -> PipelineResult<PayloadAttributes> {
        self.attributes
            .pop()
            .unwrap_or(Err(PipelineError::AttributesBuilder(BuilderError::AttributesUnavailable).crit()))
    }
}

/// A mock [AttributesProvider] standing in for the batch stages.
#[derive(Debug, Default)]
pub struct TestAttributesProvider {
    /// The origin of the L1 block.
    pub origin: Option<BlockInfo>,
    /// A list of batches to return.
    pub batches: Vec<PipelineResult<SingleBatch>>,
    /// Whether a flush signal was received.
    pub flushed: bool,
    /// Whether a reset-like signal was received.
    pub reset: bool,
}

impl TestAttributesProvider {
    /// Creates a new [`TestAttributesProvider`] with the given origin and batches.
    pub const fn new(origin: Option<BlockInfo>, batches: Vec<PipelineResult<SingleBatch>>) -> Self {
        Self { origin, batches, flushed: false, reset: false }
    }
}

impl OriginProvider for TestAttributesProvider {
    fn origin(&self) -> Option<BlockInfo> {
        self.origin
    }
}

#[async_trait]
impl OriginAdvancer for TestAttributesProvider {
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        Ok(())
    }
}

#[async_trait]
impl SignalReceiver for TestAttributesProvider {
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match signal {
            Signal::FlushChannel => self.flushed = true,
            Signal::Reset(_) | Signal::Activation(_) => self.reset = true,
            Signal::L1Finalized(_) => {}
        }
        Ok(())
    }
}

#[async_trait]
impl AttributesProvider for TestAttributesProvider {
    async fn next_batch(&mut self, _parent: L2BlockInfo) -> PipelineResult<SingleBatch> {
        self.batches.pop().ok_or(PipelineError::Eof.temp())?
    }

    fn is_last_in_span(&self) -> bool {
        self.batches.is_empty()
    }
}
