//! Test pipeline utilities.

use crate::{
    errors::{PipelineError, PipelineErrorKind},
    pipeline::{AttributesQueueStage, DerivationPipeline, PipelineBuilder},
    test_utils::{TestAttributesBuilder, TestChainProvider, TestDAP, TestL2ChainProvider},
    traits::{NextAttributes, OriginAdvancer, OriginProvider, Pipeline, SignalReceiver},
    types::{
        AttributesWithParent, BlockInfo, L2BlockInfo, PipelineResult, RollupConfig, Signal,
        StepResult,
    },
};
use async_trait::async_trait;
use std::sync::Arc;

/// A mock top-level stage for driving a [DerivationPipeline] directly.
///
/// Attributes are popped from the back; once drained, [PipelineError::Eof] is returned.
#[derive(Debug)]
pub struct TestNextAttributes {
    /// The attributes to return.
    pub attributes: Vec<PipelineResult<AttributesWithParent>>,
    /// The current L1 origin.
    pub origin: Option<BlockInfo>,
    /// An error to return from [OriginAdvancer::advance_origin].
    pub advance_error: Option<PipelineErrorKind>,
    /// The signals received, in order.
    pub signals: Vec<Signal>,
}

impl Default for TestNextAttributes {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl TestNextAttributes {
    /// Creates a new [TestNextAttributes] returning the given attributes.
    pub fn new(attributes: Vec<PipelineResult<AttributesWithParent>>) -> Self {
        Self {
            attributes,
            origin: Some(BlockInfo::default()),
            advance_error: None,
            signals: Vec::new(),
        }
    }
}

#[async_trait]
impl NextAttributes for TestNextAttributes {
    async fn next_attributes(&mut self, _: L2BlockInfo) -> PipelineResult<AttributesWithParent> {
        self.attributes.pop().unwrap_or(Err(PipelineError::Eof.temp()))
    }
}

impl OriginProvider for TestNextAttributes {
    fn origin(&self) -> Option<BlockInfo> {
        self.origin
    }
}

#[async_trait]
impl OriginAdvancer for TestNextAttributes {
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        if let Some(err) = self.advance_error.take() {
            return Err(err);
        }
        if let Some(origin) = self.origin.as_mut() {
            origin.number += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl SignalReceiver for TestNextAttributes {
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.signals.push(signal);
        Ok(())
    }
}

/// The fully assembled pipeline over mock providers.
pub type TestPipeline = DerivationPipeline<
    AttributesQueueStage<TestDAP, TestChainProvider, TestL2ChainProvider, TestAttributesBuilder>,
    TestL2ChainProvider,
>;

/// Assembles a [TestPipeline] from mock providers.
pub fn new_test_pipeline(
    rollup_config: Arc<RollupConfig>,
    chain_provider: TestChainProvider,
    l2_chain_provider: TestL2ChainProvider,
    dap: TestDAP,
    builder: TestAttributesBuilder,
) -> TestPipeline {
    PipelineBuilder::new()
        .rollup_config(rollup_config)
        .chain_provider(chain_provider)
        .l2_chain_provider(l2_chain_provider)
        .dap_source(dap)
        .builder(builder)
        .build()
        .expect("all components are set")
}

/// The number of steps [step_to_attributes] takes before giving up.
const MAX_STEPS: usize = 512;

/// Steps the pipeline on top of `cursor` until it prepares attributes, and confirms them.
///
/// Temporary step failures are retried. A failed origin advance or a non-temporary step
/// failure ends the walk with that error; the mock L1 chain running out surfaces as
/// [PipelineError::Eof].
pub async fn step_to_attributes<P: Pipeline + Send>(
    pipeline: &mut P,
    cursor: L2BlockInfo,
) -> PipelineResult<AttributesWithParent> {
    for _ in 0..MAX_STEPS {
        match pipeline.step(cursor).await {
            StepResult::PreparedAttributes | StepResult::AttributesInFlight => {
                return pipeline.confirm_received().ok_or(PipelineError::Eof.temp());
            }
            StepResult::AdvancedOrigin => {}
            StepResult::StepFailed(PipelineErrorKind::Temporary(_)) => {}
            StepResult::StepFailed(err) | StepResult::OriginAdvanceErr(err) => return Err(err),
        }
    }
    Err(PipelineError::NotEnoughData.temp())
}
