//! Contains the [L1Traversal] stage of the derivation pipeline.

use crate::{
    errors::{PipelineError, PipelineErrorKind, ResetError},
    stages::L1RetrievalProvider,
    traits::{ChainProvider, OriginAdvancer, OriginProvider, SignalReceiver},
    types::{
        ActivationSignal, BlockInfo, PipelineResult, ResetSignal, RollupConfig, Signal,
        SystemConfig,
    },
};
use alloy_primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The [L1Traversal] stage of the derivation pipeline.
///
/// This stage sits at the bottom of the pipeline, holding a handle to the data source
/// (a [ChainProvider] implementation) and the current L1 [BlockInfo] in the pipeline,
/// which are used to traverse the L1 chain. When the [L1Traversal] stage is advanced,
/// it fetches the next L1 [BlockInfo] from the data source and updates the [SystemConfig]
/// with the receipts from the block.
#[derive(Debug, Clone)]
pub struct L1Traversal<Provider: ChainProvider> {
    /// The current block in the traversal stage.
    pub(crate) block: Option<BlockInfo>,
    /// The data source for the traversal stage.
    data_source: Provider,
    /// Signals whether or not the traversal stage is complete.
    done: bool,
    /// The system config.
    pub system_config: SystemConfig,
    /// A reference to the rollup config.
    pub rollup_config: Arc<RollupConfig>,
}

#[async_trait]
impl<F: ChainProvider + Send> L1RetrievalProvider for L1Traversal<F> {
    fn batcher_addr(&self) -> Address {
        self.system_config.batcher_address
    }

    async fn next_l1_block(&mut self) -> PipelineResult<Option<BlockInfo>> {
        if !self.done {
            self.done = true;
            Ok(self.block)
        } else {
            Err(PipelineError::Eof.temp())
        }
    }
}

impl<F: ChainProvider> L1Traversal<F> {
    /// Creates a new [L1Traversal] instance.
    pub fn new(data_source: F, cfg: Arc<RollupConfig>) -> Self {
        Self {
            block: Some(BlockInfo::default()),
            data_source,
            done: false,
            system_config: SystemConfig::default(),
            rollup_config: cfg,
        }
    }

    /// Retrieves a reference to the inner data source of the [L1Traversal] stage.
    pub const fn data_source(&self) -> &F {
        &self.data_source
    }
}

#[async_trait]
impl<F: ChainProvider + Send> OriginAdvancer for L1Traversal<F> {
    /// Advances the internal state of the [L1Traversal] stage to the next L1 block.
    ///
    /// The next block is only exposed once its parent hash links to the current origin and the
    /// [SystemConfig] has been rolled forward with its receipts.
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        let block = match self.block {
            Some(block) => block,
            None => {
                warn!(target: "l1_traversal", "Missing current block, can't advance origin with no reference.");
                return Err(PipelineError::Eof.temp());
            }
        };
        let next_l1_origin = match self.data_source.block_info_by_number(block.number + 1).await {
            Ok(block) => block,
            Err(e) => {
                let err: PipelineErrorKind = e.into();
                debug!(target: "l1_traversal", "Failed to fetch L1 block {}: {err}", block.number + 1);
                crate::inc!(PROVIDER_ERRORS, &["chain_provider", "block_info_by_number", err.class()]);
                return Err(err);
            }
        };

        // Check block hashes for reorgs.
        if block.hash != next_l1_origin.parent_hash {
            warn!(
                target: "l1_traversal",
                "Detected L1 reorg: origin {} is not the parent of block {}",
                block.hash,
                next_l1_origin.number
            );
            return Err(ResetError::ReorgDetected(block.hash, next_l1_origin.parent_hash).into());
        }

        // Fetch receipts for the next l1 block and update the system config.
        let receipts = match self.data_source.receipts_by_hash(next_l1_origin.hash).await {
            Ok(receipts) => receipts,
            Err(e) => {
                let err: PipelineErrorKind = e.into();
                crate::inc!(PROVIDER_ERRORS, &["chain_provider", "receipts_by_hash", err.class()]);
                return Err(err);
            }
        };

        let addr = self.rollup_config.l1_system_config_address;
        let before = self.system_config;
        if let Err(e) = self.system_config.update_with_receipts(
            receipts.as_slice(),
            &self.rollup_config,
            next_l1_origin.timestamp,
        ) {
            warn!(target: "l1_traversal", "Failed to apply system config update from {addr}: {e}");
            return Err(PipelineError::SystemConfigUpdate(e).crit());
        }
        if before != self.system_config {
            info!(
                target: "l1_traversal",
                block = next_l1_origin.number,
                batcher = %self.system_config.batcher_address,
                "System config updated"
            );
        }

        let prev_block_holocene = self.rollup_config.is_holocene_active(block.timestamp);
        let next_block_holocene = self.rollup_config.is_holocene_active(next_l1_origin.timestamp);

        // Update the block origin regardless of if a holocene activation is required.
        self.block = Some(next_l1_origin);
        self.done = false;
        crate::set!(ORIGIN_GAUGE, next_l1_origin.number as i64);
        debug!(target: "l1_traversal", "Advanced origin to L1 block {}", next_l1_origin.number);

        // If the prev block is not holocene, but the next is, we need to flag this
        // so the pipeline driver will reset the pipeline for holocene activation.
        if !prev_block_holocene && next_block_holocene {
            info!(target: "l1_traversal", "Holocene activated at L1 block {}", next_l1_origin.number);
            return Err(ResetError::HoloceneActivation.reset());
        }

        Ok(())
    }
}

impl<F: ChainProvider> OriginProvider for L1Traversal<F> {
    fn origin(&self) -> Option<BlockInfo> {
        self.block
    }
}

#[async_trait]
impl<F: ChainProvider + Send> SignalReceiver for L1Traversal<F> {
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match signal {
            Signal::Reset(ResetSignal { l1_origin, system_config, .. }) |
            Signal::Activation(ActivationSignal { l1_origin, system_config, .. }) => {
                self.block = Some(l1_origin);
                self.done = false;
                self.system_config = system_config.unwrap_or_default();
                crate::set!(ORIGIN_GAUGE, l1_origin.number as i64);
                info!(target: "l1_traversal", "Reset to L1 origin {}", l1_origin.number);
            }
            _ => {}
        }

        Ok(())
    }
}
