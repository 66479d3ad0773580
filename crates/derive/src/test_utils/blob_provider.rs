//! An implementation of the [BlobProvider] trait for tests.

use crate::{
    errors::BlobProviderError,
    traits::BlobProvider,
    types::{BlobSidecar, BlockInfo, IndexedBlobHash},
};
use alloy_eips::eip4844::Blob;
use alloy_primitives::{FixedBytes, B256};
use async_trait::async_trait;
use hashbrown::HashMap;
use sha2::{Digest, Sha256};

/// A mock blob provider for testing.
///
/// Sidecars are keyed by versioned hash. [TestBlobProvider::insert_blob] derives the versioned
/// hash from a fabricated commitment, so lookups verify like real sidecars do.
#[derive(Debug, Clone, Default)]
pub struct TestBlobProvider {
    /// Maps versioned hashes to sidecars.
    pub sidecars: HashMap<B256, BlobSidecar>,
    /// Whether the blob provider should return an error.
    pub should_error: bool,
    /// The number of `get_blobs` calls made.
    pub calls: usize,
}

impl TestBlobProvider {
    /// Inserts a blob, returning the versioned hash it is stored under.
    pub fn insert_blob(&mut self, blob: Blob) -> B256 {
        let digest: [u8; 32] = Sha256::digest(blob.as_slice()).into();
        let mut commitment = [0u8; 48];
        commitment[..32].copy_from_slice(&digest);
        let sidecar = BlobSidecar {
            index: self.sidecars.len() as u64,
            blob: Box::new(blob),
            kzg_commitment: FixedBytes::from(commitment),
            kzg_proof: FixedBytes::ZERO,
        };
        let hash = sidecar.versioned_hash();
        self.sidecars.insert(hash, sidecar);
        hash
    }

    /// Inserts a sidecar under an explicit hash, without checking the commitment.
    pub fn insert_sidecar(&mut self, hash: B256, sidecar: BlobSidecar) {
        self.sidecars.insert(hash, sidecar);
    }

    /// Clears blobs from the mock blob provider.
    pub fn clear(&mut self) {
        self.sidecars.clear();
    }
}

#[async_trait]
impl BlobProvider for TestBlobProvider {
    type Error = BlobProviderError;

    async fn get_blobs(
        &mut self,
        _block_ref: &BlockInfo,
        blob_hashes: &[IndexedBlobHash],
    ) -> Result<Vec<BlobSidecar>, Self::Error> {
        self.calls += 1;
        if self.should_error {
            return Err(BlobProviderError::Backend("blob provider unavailable".to_string()));
        }
        Ok(blob_hashes.iter().filter_map(|h| self.sidecars.get(&h.hash).cloned()).collect())
    }
}
