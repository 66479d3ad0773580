//! Chain and blob providers serving the [Fixture].

use crate::fixture::Fixture;
use alloy_consensus::{Header, Receipt};
use alloy_primitives::B256;
use async_trait::async_trait;
use mako_derive::{
    errors::{PipelineError, PipelineErrorKind},
    traits::{BlobProvider, ChainProvider},
    types::{BlobSidecar, BlockInfo, IndexedBlobHash, L1Transaction},
};
use std::sync::Arc;
use thiserror::Error;

/// An error of the fixture providers.
#[derive(Error, Debug)]
pub enum FixtureError {
    /// The fixture ends before the block.
    #[error("L1 block #{0} is past the end of the fixture")]
    PastTip(u64),
    /// No block of the fixture has the hash.
    #[error("unknown L1 block hash {0}")]
    UnknownHash(B256),
    /// The block carries no blob with the versioned hash.
    #[error("blob {0} not found in L1 block #{1}")]
    BlobNotFound(B256, u64),
}

impl From<FixtureError> for PipelineErrorKind {
    fn from(err: FixtureError) -> Self {
        match err {
            // The recorded chain simply has not grown that far.
            FixtureError::PastTip(_) => PipelineError::Eof.temp(),
            FixtureError::BlobNotFound(..) => PipelineError::Provider(err.to_string()).crit(),
            FixtureError::UnknownHash(_) => PipelineError::Provider(err.to_string()).temp(),
        }
    }
}

/// A [ChainProvider] over the L1 blocks of the fixture.
#[derive(Debug, Clone)]
pub struct FixtureL1Provider {
    fixture: Arc<Fixture>,
}

impl FixtureL1Provider {
    /// Creates a provider over the fixture.
    pub const fn new(fixture: Arc<Fixture>) -> Self {
        Self { fixture }
    }
}

#[async_trait]
impl ChainProvider for FixtureL1Provider {
    type Error = FixtureError;

    async fn header_by_hash(&mut self, hash: B256) -> Result<Header, Self::Error> {
        self.fixture.block_by_hash(hash).map(|b| b.header()).ok_or(FixtureError::UnknownHash(hash))
    }

    async fn block_info_by_number(&mut self, number: u64) -> Result<BlockInfo, Self::Error> {
        self.fixture.block_by_number(number).map(|b| b.info).ok_or(FixtureError::PastTip(number))
    }

    async fn receipts_by_hash(&mut self, hash: B256) -> Result<Vec<Receipt>, Self::Error> {
        self.fixture
            .block_by_hash(hash)
            .map(|b| b.receipts.clone())
            .ok_or(FixtureError::UnknownHash(hash))
    }

    async fn block_info_and_transactions_by_hash(
        &mut self,
        hash: B256,
    ) -> Result<(BlockInfo, Vec<L1Transaction>), Self::Error> {
        let block = self.fixture.block_by_hash(hash).ok_or(FixtureError::UnknownHash(hash))?;
        Ok((block.info, block.transactions.clone()))
    }
}

/// A [BlobProvider] over the blobs of the fixture.
#[derive(Debug, Clone)]
pub struct FixtureBlobProvider {
    fixture: Arc<Fixture>,
}

impl FixtureBlobProvider {
    /// Creates a provider over the fixture.
    pub const fn new(fixture: Arc<Fixture>) -> Self {
        Self { fixture }
    }
}

#[async_trait]
impl BlobProvider for FixtureBlobProvider {
    type Error = FixtureError;

    async fn get_blobs(
        &mut self,
        block_ref: &BlockInfo,
        blob_hashes: &[IndexedBlobHash],
    ) -> Result<Vec<BlobSidecar>, Self::Error> {
        let block = self
            .fixture
            .block_by_hash(block_ref.hash)
            .ok_or(FixtureError::UnknownHash(block_ref.hash))?;
        let sidecars: Vec<BlobSidecar> = block
            .blobs
            .iter()
            .map(|b| BlobSidecar {
                index: b.index,
                blob: b.blob.clone(),
                kzg_commitment: b.kzg_commitment,
                kzg_proof: b.kzg_proof,
            })
            .collect();

        blob_hashes
            .iter()
            .map(|requested| {
                sidecars
                    .iter()
                    .find(|s| s.verify_versioned_hash(&requested.hash))
                    .cloned()
                    .ok_or(FixtureError::BlobNotFound(requested.hash, block_ref.number))
            })
            .collect()
    }
}
