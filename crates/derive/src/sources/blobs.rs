//! Blob Data Source

use crate::{
    errors::{BlobProviderError, PipelineError, PipelineErrorKind},
    traits::{BlobProvider, ChainProvider, DataAvailabilityProvider},
    types::{BlobData, BlockInfo, IndexedBlobHash, L1Transaction, PipelineResult},
};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use tracing::{trace, warn};

/// A data iterator that reads from blobs.
///
/// Batcher transactions of a block are read in order. Blob transactions contribute one entry per
/// versioned hash; any other batcher transaction contributes its calldata.
#[derive(Debug, Clone)]
pub struct BlobSource<F, B>
where
    F: ChainProvider + Send,
    B: BlobProvider + Send,
{
    /// Chain provider.
    pub chain_provider: F,
    /// Fetches blobs.
    pub blob_fetcher: B,
    /// The address of the batch inbox.
    pub batch_inbox_address: Address,
    /// Data.
    pub data: Vec<BlobData>,
    /// Whether the source is open.
    pub open: bool,
}

impl<F, B> BlobSource<F, B>
where
    F: ChainProvider + Send,
    B: BlobProvider + Send,
{
    /// Creates a new blob source.
    pub const fn new(chain_provider: F, blob_fetcher: B, batch_inbox_address: Address) -> Self {
        Self { chain_provider, blob_fetcher, batch_inbox_address, data: Vec::new(), open: false }
    }

    /// Splits the transactions of a block into data placeholders and the blob hashes to fetch.
    ///
    /// Blob indices count every blob of the block, including blobs of unrelated transactions.
    fn extract_blob_data(
        &self,
        txs: Vec<L1Transaction>,
        batcher_address: Address,
    ) -> (Vec<BlobData>, Vec<IndexedBlobHash>) {
        let mut index = 0;
        let mut data = Vec::new();
        let mut hashes = Vec::new();
        for tx in txs {
            if !tx.is_batcher_tx(self.batch_inbox_address, batcher_address) {
                index += tx.blob_versioned_hashes.len();
                continue;
            }
            if !tx.is_blob_tx() {
                data.push(BlobData { data: None, calldata: Some(tx.input) });
                continue;
            }
            if !tx.input.is_empty() {
                warn!(target: "blob_source", "Blob tx {} has calldata, which will be ignored", tx.hash);
            }
            for hash in tx.blob_versioned_hashes {
                hashes.push(IndexedBlobHash { index, hash });
                data.push(BlobData::default());
                index += 1;
            }
        }
        (data, hashes)
    }

    /// Loads blob data into the source if it is not open.
    async fn load_blobs(
        &mut self,
        block_ref: &BlockInfo,
        batcher_address: Address,
    ) -> PipelineResult<()> {
        if self.open {
            return Ok(());
        }

        let (_, txs) = self
            .chain_provider
            .block_info_and_transactions_by_hash(block_ref.hash)
            .await
            .map_err(|e| PipelineError::Provider(e.to_string()).temp())?;

        let (mut data, blob_hashes) = self.extract_blob_data(txs, batcher_address);

        if blob_hashes.is_empty() {
            self.data = data;
            self.open = true;
            return Ok(());
        }

        let sidecars = self
            .blob_fetcher
            .get_blobs(block_ref, &blob_hashes)
            .await
            .map_err(Into::<PipelineErrorKind>::into)?;
        if sidecars.len() != blob_hashes.len() {
            return Err(
                BlobProviderError::SidecarLengthMismatch(blob_hashes.len(), sidecars.len()).into()
            );
        }
        for (sidecar, hash) in sidecars.iter().zip(blob_hashes.iter()) {
            if !sidecar.verify_versioned_hash(&hash.hash) {
                return Err(BlobProviderError::CommitmentMismatch(sidecar.index).into());
            }
        }

        let blobs = sidecars.into_iter().map(|s| s.blob).collect::<Vec<_>>();
        let mut blob_index = 0;
        for blob in data.iter_mut().filter(|d| d.calldata.is_none()) {
            if let Err(e) = blob.fill(&blobs, blob_index) {
                return Err(BlobProviderError::BlobDecoding(e).into());
            }
            blob_index += 1;
        }
        trace!(target: "blob_source", "Loaded {} blobs from L1 block #{}", blobs.len(), block_ref.number);

        self.data = data;
        self.open = true;
        Ok(())
    }

    /// Extracts the next data from the source, skipping blobs that fail to decode.
    fn next_data(&mut self) -> Option<Bytes> {
        while !self.data.is_empty() {
            let next = self.data.remove(0);
            if let Some(calldata) = next.calldata {
                return Some(calldata);
            }
            match next.decode() {
                Ok(data) => return Some(data),
                Err(e) => warn!(target: "blob_source", "Failed to decode blob data, skipping: {e}"),
            }
        }
        None
    }
}

#[async_trait]
impl<F, B> DataAvailabilityProvider for BlobSource<F, B>
where
    F: ChainProvider + Send,
    B: BlobProvider + Send,
{
    async fn next(
        &mut self,
        block_ref: &BlockInfo,
        batcher_address: Address,
    ) -> PipelineResult<Bytes> {
        self.load_blobs(block_ref, batcher_address).await?;
        self.next_data().ok_or(PipelineError::Eof.temp())
    }

    fn clear(&mut self) {
        self.data.clear();
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::{TestBlobProvider, TestChainProvider},
        types::{BlobSidecar, BLOB_TX_TYPE},
    };
    use alloy_eips::eip4844::Blob;
    use alloy_primitives::{address, FixedBytes, B256};

    const INBOX: Address = address!("ff00000000000000000000000000000000000010");
    const BATCHER: Address = address!("6887246668a3b87f54deb3b94ba47a6f63f32985");

    fn block() -> BlockInfo {
        BlockInfo { number: 7, hash: B256::repeat_byte(0x07), ..Default::default() }
    }

    fn blob_tx(from: Address, hashes: Vec<B256>) -> L1Transaction {
        L1Transaction {
            tx_type: BLOB_TX_TYPE,
            from,
            to: Some(INBOX),
            blob_versioned_hashes: hashes,
            ..Default::default()
        }
    }

    fn encoded(data: &[u8]) -> Blob {
        *BlobData::encode(data).unwrap()
    }

    fn source(
        txs: Vec<L1Transaction>,
        blobs: TestBlobProvider,
    ) -> BlobSource<TestChainProvider, TestBlobProvider> {
        let mut chain = TestChainProvider::default();
        chain.insert_block_with_transactions(7, block(), txs);
        BlobSource::new(chain, blobs, INBOX)
    }

    #[tokio::test]
    async fn test_load_blobs_open() {
        let mut source = source(vec![], TestBlobProvider::default());
        source.open = true;
        assert!(source.load_blobs(&BlockInfo::default(), BATCHER).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_blob_txs_skips_fetch() {
        let calldata = L1Transaction {
            from: BATCHER,
            to: Some(INBOX),
            input: Bytes::from_static(&[0x00, 0xAA]),
            ..Default::default()
        };
        let mut source = source(vec![calldata], TestBlobProvider::default());
        assert_eq!(source.next(&block(), BATCHER).await.unwrap().as_ref(), &[0x00, 0xAA]);
        assert!(source.next(&block(), BATCHER).await.unwrap_err().is_eof());
        assert_eq!(source.blob_fetcher.calls, 0);
    }

    #[tokio::test]
    async fn test_blobs_in_transaction_order() {
        let mut blobs = TestBlobProvider::default();
        let first = blobs.insert_blob(encoded(&[0x00, 0x01]));
        let second = blobs.insert_blob(encoded(&[0x00, 0x02]));
        let third = blobs.insert_blob(encoded(&[0x00, 0x03]));
        let txs = vec![
            blob_tx(BATCHER, vec![first, second]),
            blob_tx(Address::ZERO, vec![B256::repeat_byte(0xEE)]),
            blob_tx(BATCHER, vec![third]),
        ];
        let mut source = source(txs, blobs);

        for expected in [[0x00, 0x01], [0x00, 0x02], [0x00, 0x03]] {
            assert_eq!(source.next(&block(), BATCHER).await.unwrap().as_ref(), &expected);
        }
        assert!(source.next(&block(), BATCHER).await.unwrap_err().is_eof());
    }

    #[test]
    fn test_blob_indices_count_foreign_blobs() {
        let txs = vec![
            blob_tx(Address::ZERO, vec![B256::ZERO, B256::ZERO]),
            blob_tx(BATCHER, vec![B256::repeat_byte(1)]),
        ];
        let source = source(vec![], TestBlobProvider::default());
        let (data, hashes) = source.extract_blob_data(txs, BATCHER);
        assert_eq!(data.len(), 1);
        assert_eq!(hashes, vec![IndexedBlobHash { index: 2, hash: B256::repeat_byte(1) }]);
    }

    #[tokio::test]
    async fn test_missing_sidecar_is_critical() {
        let txs = vec![blob_tx(BATCHER, vec![B256::repeat_byte(0x01)])];
        let mut source = source(txs, TestBlobProvider::default());
        let err = source.next(&block(), BATCHER).await.unwrap_err();
        assert!(matches!(err, PipelineErrorKind::Critical(PipelineError::Provider(_))));
        assert!(!source.open);
    }

    #[tokio::test]
    async fn test_commitment_mismatch_is_critical() {
        let hash = B256::repeat_byte(0x01);
        let mut blobs = TestBlobProvider::default();
        blobs.insert_sidecar(
            hash,
            BlobSidecar {
                index: 0,
                blob: Box::new(encoded(&[0x00])),
                kzg_commitment: FixedBytes::repeat_byte(0x42),
                kzg_proof: FixedBytes::ZERO,
            },
        );
        let mut source = source(vec![blob_tx(BATCHER, vec![hash])], blobs);
        let err = source.next(&block(), BATCHER).await.unwrap_err();
        assert!(matches!(err, PipelineErrorKind::Critical(_)));
    }

    #[tokio::test]
    async fn test_backend_error_is_temporary() {
        let blobs = TestBlobProvider { should_error: true, ..Default::default() };
        let mut source = source(vec![blob_tx(BATCHER, vec![B256::ZERO])], blobs);
        let err = source.next(&block(), BATCHER).await.unwrap_err();
        assert!(matches!(err, PipelineErrorKind::Temporary(PipelineError::Provider(_))));
    }

    #[tokio::test]
    async fn test_undecodable_blob_is_skipped() {
        let mut blobs = TestBlobProvider::default();
        let mut bad = Blob::ZERO;
        bad[1] = 0x01;
        let bad = blobs.insert_blob(bad);
        let good = blobs.insert_blob(encoded(&[0x00, 0x09]));
        let mut source = source(vec![blob_tx(BATCHER, vec![bad, good])], blobs);
        assert_eq!(source.next(&block(), BATCHER).await.unwrap().as_ref(), &[0x00, 0x09]);
        assert!(source.next(&block(), BATCHER).await.unwrap_err().is_eof());
    }
}
