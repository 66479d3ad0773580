//! Contains the core derivation pipeline.

use crate::{
    errors::{PipelineError, PipelineErrorKind},
    traits::{
        L2ChainProvider, NextAttributes, OriginAdvancer, OriginProvider, Pipeline, SignalReceiver,
    },
    types::{
        ActivationSignal, AttributesWithParent, BlockInfo, L2BlockInfo, PipelineResult,
        ResetSignal, RollupConfig, Signal, StepResult, SystemConfig,
    },
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tracing::{debug, error, trace, warn};

/// The derivation pipeline is responsible for deriving L2 inputs from L1 data.
#[derive(Debug)]
pub struct DerivationPipeline<S, P>
where
    S: NextAttributes + SignalReceiver + OriginProvider + OriginAdvancer + Debug + Send,
    P: L2ChainProvider + Send + Sync + Debug,
{
    /// A handle to the next attributes.
    pub attributes: S,
    /// The prepared [AttributesWithParent] awaiting confirmation by the consumer.
    pub prepared: Option<AttributesWithParent>,
    /// The rollup config.
    pub rollup_config: Arc<RollupConfig>,
    /// The L2 Chain Provider used to fetch the system config on reset.
    pub l2_chain_provider: P,
}

impl<S, P> DerivationPipeline<S, P>
where
    S: NextAttributes + SignalReceiver + OriginProvider + OriginAdvancer + Debug + Send,
    P: L2ChainProvider + Send + Sync + Debug,
{
    /// Creates a new instance of the [DerivationPipeline].
    pub const fn new(
        attributes: S,
        rollup_config: Arc<RollupConfig>,
        l2_chain_provider: P,
    ) -> Self {
        Self { attributes, prepared: None, rollup_config, l2_chain_provider }
    }
}

impl<S, P> OriginProvider for DerivationPipeline<S, P>
where
    S: NextAttributes + SignalReceiver + OriginProvider + OriginAdvancer + Debug + Send,
    P: L2ChainProvider + Send + Sync + Debug,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.attributes.origin()
    }
}

impl<S, P> Iterator for DerivationPipeline<S, P>
where
    S: NextAttributes + SignalReceiver + OriginProvider + OriginAdvancer + Debug + Send,
    P: L2ChainProvider + Send + Sync + Debug,
{
    type Item = AttributesWithParent;

    fn next(&mut self) -> Option<Self::Item> {
        self.prepared.take()
    }
}

#[async_trait]
impl<S, P> SignalReceiver for DerivationPipeline<S, P>
where
    S: NextAttributes + SignalReceiver + OriginProvider + OriginAdvancer + Debug + Send,
    P: L2ChainProvider + Send + Sync + Debug,
{
    /// Signals the pipeline by calling the [`SignalReceiver::signal`] method.
    ///
    /// A [`Signal::Reset`] travels from the top-level [AttributesQueue] down to the
    /// [L1Traversal], each stage forwarding the signal before clearing its own state, so the
    /// stack is rebuilt from the bottom up. [`Signal::Activation`] does the same with the
    /// Holocene stage switch on top.
    ///
    /// Reset-like signals without a [SystemConfig] are completed with the system config of the
    /// L2 safe head. The in-flight attributes are dropped.
    ///
    /// [AttributesQueue]: crate::stages::AttributesQueue
    /// [L1Traversal]: crate::stages::L1Traversal
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match signal {
            Signal::Reset(ResetSignal { l2_safe_head, system_config, .. }) |
            Signal::Activation(ActivationSignal { l2_safe_head, system_config, .. }) => {
                crate::inc!(PIPELINE_SIGNALS, &["reset"]);
                let system_config = match system_config {
                    Some(config) => config,
                    None => {
                        self.system_config_by_number(l2_safe_head.block_info.number).await?
                    }
                };
                self.prepared = None;
                match self.attributes.signal(signal.with_system_config(system_config)).await {
                    Ok(()) => trace!(target: "pipeline", "Stages reset"),
                    Err(err) if err.is_eof() => trace!(target: "pipeline", "Stages reset with EOF"),
                    Err(err) => {
                        error!(target: "pipeline", "Stage reset errored: {err}");
                        return Err(err);
                    }
                }
            }
            Signal::FlushChannel => {
                crate::inc!(PIPELINE_SIGNALS, &["flush_channel"]);
                self.attributes.signal(signal).await?;
            }
            Signal::L1Finalized(block) => {
                crate::inc!(PIPELINE_SIGNALS, &["l1_finalized"]);
                debug!(target: "pipeline", "L1 block #{} finalized", block.number);
                self.attributes.signal(signal).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<S, P> Pipeline for DerivationPipeline<S, P>
where
    S: NextAttributes + SignalReceiver + OriginProvider + OriginAdvancer + Debug + Send,
    P: L2ChainProvider + Send + Sync + Debug,
{
    fn peek(&self) -> Option<&AttributesWithParent> {
        self.prepared.as_ref()
    }

    fn confirm_received(&mut self) -> Option<AttributesWithParent> {
        self.prepared.take()
    }

    fn rollup_config(&self) -> &RollupConfig {
        &self.rollup_config
    }

    async fn system_config_by_number(
        &mut self,
        number: u64,
    ) -> Result<SystemConfig, PipelineErrorKind> {
        self.l2_chain_provider
            .system_config_by_number(number, Arc::clone(&self.rollup_config))
            .await
            .map_err(Into::into)
    }

    /// Attempts to progress the pipeline.
    ///
    /// ## Returns
    ///
    /// [StepResult::AdvancedOrigin] when the stages ran dry ([PipelineError::Eof]) and the L1
    /// origin moved on, [StepResult::OriginAdvanceErr] if moving it failed. Every other stage
    /// error is surfaced as [StepResult::StepFailed] for the caller to route by class.
    async fn step(&mut self, cursor: L2BlockInfo) -> StepResult {
        if self.prepared.is_some() {
            trace!(target: "pipeline", "Attributes in flight, awaiting confirmation");
            return StepResult::AttributesInFlight;
        }

        match self.attributes.next_attributes(cursor).await {
            Ok(a) => {
                trace!(target: "pipeline", "Prepared L2 attributes: {:?}", a);
                crate::inc!(PIPELINE_STEPS, &["prepared_attributes"]);
                self.prepared = Some(a);
                StepResult::PreparedAttributes
            }
            Err(err) => match err {
                PipelineErrorKind::Temporary(PipelineError::Eof) => {
                    trace!(target: "pipeline", "Pipeline advancing origin");
                    if let Err(e) = self.attributes.advance_origin().await {
                        crate::inc!(PIPELINE_STEPS, &["origin_advance_err"]);
                        return StepResult::OriginAdvanceErr(e);
                    }
                    crate::inc!(PIPELINE_STEPS, &["advanced_origin"]);
                    StepResult::AdvancedOrigin
                }
                PipelineErrorKind::Temporary(_) => {
                    trace!(target: "pipeline", "Attributes queue step failed due to temporary error: {err}");
                    crate::inc!(PIPELINE_STEPS, &[err.class()]);
                    StepResult::StepFailed(err)
                }
                _ => {
                    warn!(target: "pipeline", "Attributes queue step failed: {err}");
                    crate::inc!(PIPELINE_STEPS, &[err.class()]);
                    StepResult::StepFailed(err)
                }
            },
        }
    }
}
