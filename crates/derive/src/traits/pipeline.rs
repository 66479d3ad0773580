//! Defines the interface for the core derivation pipeline.

use super::{OriginProvider, SignalReceiver};
use crate::{
    errors::{PipelineError, PipelineErrorKind, ResetError},
    types::{
        ActivationSignal, AttributesWithParent, L2BlockInfo, ResetSignal, RollupConfig, StepResult,
        SystemConfig,
    },
};
use async_trait::async_trait;
use tracing::{info, trace, warn};

/// This trait defines the interface for interacting with the derivation pipeline.
///
/// At most one [AttributesWithParent] is in flight: once a step prepares attributes, further
/// steps return [StepResult::AttributesInFlight] until the consumer takes them through
/// [Pipeline::confirm_received] or [Iterator::next].
#[async_trait]
pub trait Pipeline:
    OriginProvider + SignalReceiver + Iterator<Item = AttributesWithParent>
{
    /// Peeks at the next [AttributesWithParent] from the pipeline.
    fn peek(&self) -> Option<&AttributesWithParent>;

    /// Takes the in-flight attributes, allowing the pipeline to prepare the next ones.
    fn confirm_received(&mut self) -> Option<AttributesWithParent>;

    /// Returns the rollup config.
    fn rollup_config(&self) -> &RollupConfig;

    /// Returns the [SystemConfig] by L2 number.
    async fn system_config_by_number(
        &mut self,
        number: u64,
    ) -> Result<SystemConfig, PipelineErrorKind>;

    /// Attempts to progress the pipeline.
    async fn step(&mut self, cursor: L2BlockInfo) -> StepResult;

    /// Produces the next [AttributesWithParent] payload, directly after the given L2 safe head.
    ///
    /// Temporary errors are retried, resets are handled in place by resetting to the given safe
    /// head at the current origin, and critical errors are returned.
    async fn produce_payload(
        &mut self,
        l2_safe_head: L2BlockInfo,
    ) -> Result<AttributesWithParent, PipelineErrorKind> {
        loop {
            match self.step(l2_safe_head).await {
                StepResult::PreparedAttributes | StepResult::AttributesInFlight => {
                    trace!(target: "pipeline", "Prepared attributes")
                }
                StepResult::AdvancedOrigin => {
                    trace!(target: "pipeline", "Advanced origin")
                }
                StepResult::OriginAdvanceErr(e) | StepResult::StepFailed(e) => match e {
                    PipelineErrorKind::Temporary(PipelineError::Eof) => {
                        return Err(e);
                    }
                    PipelineErrorKind::Temporary(_) => {
                        trace!(target: "pipeline", "Temporary step failure: {:?}", e);
                        continue;
                    }
                    PipelineErrorKind::Reset(e) => {
                        warn!(target: "pipeline", "Resetting after step failure: {:?}", e);
                        let system_config =
                            self.system_config_by_number(l2_safe_head.block_info.number).await?;
                        let l1_origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;

                        if matches!(e, ResetError::HoloceneActivation) {
                            self.signal(
                                ActivationSignal {
                                    l2_safe_head,
                                    l1_origin,
                                    system_config: Some(system_config),
                                }
                                .signal(),
                            )
                            .await?;
                        } else {
                            self.signal(
                                ResetSignal {
                                    l2_safe_head,
                                    l1_origin,
                                    system_config: Some(system_config),
                                }
                                .signal(),
                            )
                            .await?;
                        }
                    }
                    PipelineErrorKind::Critical(_) => {
                        warn!(target: "pipeline", "Critical step failure: {:?}", e);
                        return Err(e);
                    }
                },
            }

            if let Some(attrs) = self.confirm_received() {
                info!(target: "pipeline", timestamp = attrs.attributes.timestamp, "Produced payload");
                return Ok(attrs);
            }
        }
    }
}
