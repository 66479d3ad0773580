//! Chain providers for the derivation pipeline.

use crate::{
    errors::PipelineErrorKind,
    types::{BlobSidecar, BlockInfo, IndexedBlobHash, L1Transaction, L2BlockInfo, RollupConfig, SystemConfig},
};
use alloy_consensus::{Header, Receipt};
use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use core::fmt::Display;
use std::sync::Arc;

/// Describes the functionality of a data source that can provide information from the L1 chain.
#[async_trait]
pub trait ChainProvider {
    /// The error type for the [ChainProvider].
    type Error: Display + ToString + Into<PipelineErrorKind>;

    /// Fetch the L1 [Header] for the given [B256] hash.
    async fn header_by_hash(&mut self, hash: B256) -> Result<Header, Self::Error>;

    /// Returns the block at the given number, or an error if the block does not exist in the data
    /// source.
    async fn block_info_by_number(&mut self, number: u64) -> Result<BlockInfo, Self::Error>;

    /// Returns all receipts in the block with the given hash, or an error if the block does not
    /// exist in the data source.
    async fn receipts_by_hash(&mut self, hash: B256) -> Result<Vec<Receipt>, Self::Error>;

    /// Returns the [BlockInfo] and list of [L1Transaction]s from the given block hash.
    async fn block_info_and_transactions_by_hash(
        &mut self,
        hash: B256,
    ) -> Result<(BlockInfo, Vec<L1Transaction>), Self::Error>;
}

/// Describes the functionality of a data source that fetches safe L2 blocks.
#[async_trait]
pub trait L2ChainProvider {
    /// The error type for the [L2ChainProvider].
    type Error: Display + ToString + Into<PipelineErrorKind>;

    /// Returns the [L2BlockInfo] for the given L2 block number.
    async fn l2_block_info_by_number(&mut self, number: u64) -> Result<L2BlockInfo, Self::Error>;

    /// Returns the EIP-2718 encoded transactions of the L2 block with the given number,
    /// deposits included.
    async fn transactions_by_number(&mut self, number: u64) -> Result<Vec<Bytes>, Self::Error>;

    /// Returns the [SystemConfig] by L2 number.
    async fn system_config_by_number(
        &mut self,
        number: u64,
        rollup_config: Arc<RollupConfig>,
    ) -> Result<SystemConfig, Self::Error>;
}

/// The BlobProvider trait specifies the functionality of a data source that can provide blobs.
#[async_trait]
pub trait BlobProvider {
    /// The error type for the [BlobProvider].
    type Error: Display + ToString + Into<PipelineErrorKind>;

    /// Fetches the sidecars of the blobs with the given hashes, in the order requested.
    async fn get_blobs(
        &mut self,
        block_ref: &BlockInfo,
        blob_hashes: &[IndexedBlobHash],
    ) -> Result<Vec<BlobSidecar>, Self::Error>;
}
