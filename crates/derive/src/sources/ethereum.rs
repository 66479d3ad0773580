//! Contains the [EthereumDataSource], which is a concrete implementation of the
//! [DataAvailabilityProvider] trait for the Ethereum protocol.

use crate::{
    sources::{BlobSource, CalldataSource},
    traits::{BlobProvider, ChainProvider, DataAvailabilityProvider},
    types::{BlockInfo, PipelineResult, RollupConfig},
};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use std::fmt::Debug;

/// A factory for creating an Ethereum data source provider.
///
/// Reads calldata before Ecotone and blobs from then on. A configured
/// `blobs_enabled_l1_timestamp` switches to blobs earlier.
#[derive(Debug, Clone)]
pub struct EthereumDataSource<C, B>
where
    C: ChainProvider + Send + Clone,
    B: BlobProvider + Send + Clone,
{
    /// The ecotone timestamp.
    pub ecotone_timestamp: Option<u64>,
    /// The L1 timestamp from which blobs are read.
    pub blobs_timestamp: Option<u64>,
    /// The blob source.
    pub blob_source: BlobSource<C, B>,
    /// The calldata source.
    pub calldata_source: CalldataSource<C>,
}

impl<C, B> EthereumDataSource<C, B>
where
    C: ChainProvider + Send + Clone + Debug,
    B: BlobProvider + Send + Clone + Debug,
{
    /// Instantiates a new [EthereumDataSource].
    pub fn new(chain_provider: C, blob_provider: B, cfg: &RollupConfig) -> Self {
        Self {
            ecotone_timestamp: cfg.ecotone_time,
            blobs_timestamp: cfg.blobs_enabled_l1_timestamp,
            blob_source: BlobSource::new(
                chain_provider.clone(),
                blob_provider,
                cfg.batch_inbox_address,
            ),
            calldata_source: CalldataSource::new(chain_provider, cfg.batch_inbox_address),
        }
    }

    /// Returns true if payloads of the given L1 block are read from blobs.
    pub fn blobs_active(&self, block_ref: &BlockInfo) -> bool {
        [self.ecotone_timestamp, self.blobs_timestamp]
            .into_iter()
            .flatten()
            .any(|t| block_ref.timestamp >= t)
    }
}

#[async_trait]
impl<C, B> DataAvailabilityProvider for EthereumDataSource<C, B>
where
    C: ChainProvider + Send + Sync + Clone + Debug,
    B: BlobProvider + Send + Sync + Clone + Debug,
{
    async fn next(
        &mut self,
        block_ref: &BlockInfo,
        batcher_address: Address,
    ) -> PipelineResult<Bytes> {
        if self.blobs_active(block_ref) {
            self.blob_source.next(block_ref, batcher_address).await
        } else {
            self.calldata_source.next(block_ref, batcher_address).await
        }
    }

    fn clear(&mut self) {
        self.blob_source.clear();
        self.calldata_source.clear();
    }
}
