//! CallData Source

use crate::{
    errors::PipelineError,
    traits::{ChainProvider, DataAvailabilityProvider},
    types::{BlockInfo, PipelineResult},
};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use std::collections::VecDeque;
use tracing::{trace, warn};

/// A data iterator that reads from calldata.
#[derive(Debug, Clone)]
pub struct CalldataSource<CP>
where
    CP: ChainProvider + Send,
{
    /// The chain provider to use for the calldata source.
    pub chain_provider: CP,
    /// The batch inbox address.
    pub batch_inbox_address: Address,
    /// Current calldata.
    pub calldata: VecDeque<Bytes>,
    /// Whether the calldata source is open.
    pub open: bool,
}

impl<CP: ChainProvider + Send> CalldataSource<CP> {
    /// Creates a new calldata source.
    pub const fn new(chain_provider: CP, batch_inbox_address: Address) -> Self {
        Self { chain_provider, batch_inbox_address, calldata: VecDeque::new(), open: false }
    }

    /// Loads the calldata into the source if it is not open.
    async fn load_calldata(
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

        self.calldata = txs
            .into_iter()
            .filter_map(|tx| {
                if !tx.is_batcher_tx(self.batch_inbox_address, batcher_address) {
                    if tx.to == Some(self.batch_inbox_address) {
                        warn!(target: "calldata_source", "Skipping inbox tx {} from unauthorized sender {}", tx.hash, tx.from);
                    }
                    return None;
                }
                Some(tx.input)
            })
            .collect();
        trace!(target: "calldata_source", "Loaded {} batcher payloads from L1 block #{}", self.calldata.len(), block_ref.number);

        self.open = true;
        Ok(())
    }
}

#[async_trait]
impl<CP: ChainProvider + Send> DataAvailabilityProvider for CalldataSource<CP> {
    async fn next(
        &mut self,
        block_ref: &BlockInfo,
        batcher_address: Address,
    ) -> PipelineResult<Bytes> {
        self.load_calldata(block_ref, batcher_address).await?;
        self.calldata.pop_front().ok_or(PipelineError::Eof.temp())
    }

    fn clear(&mut self) {
        self.calldata.clear();
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::PipelineErrorKind, test_utils::TestChainProvider, types::L1Transaction};
    use alloy_primitives::{address, B256};

    const INBOX: Address = address!("ff00000000000000000000000000000000000010");
    const BATCHER: Address = address!("6887246668a3b87f54deb3b94ba47a6f63f32985");

    fn tx(from: Address, to: Address, input: &'static [u8]) -> L1Transaction {
        L1Transaction {
            from,
            to: Some(to),
            input: Bytes::from_static(input),
            ..Default::default()
        }
    }

    fn block() -> BlockInfo {
        BlockInfo { number: 10, hash: B256::repeat_byte(0x0A), ..Default::default() }
    }

    #[tokio::test]
    async fn test_load_calldata_open() {
        let mut source = CalldataSource::new(TestChainProvider::default(), INBOX);
        source.open = true;
        assert!(source.load_calldata(&BlockInfo::default(), BATCHER).await.is_ok());
    }

    #[tokio::test]
    async fn test_load_calldata_missing_block() {
        let mut source = CalldataSource::new(TestChainProvider::default(), INBOX);
        let err = source.load_calldata(&block(), BATCHER).await.unwrap_err();
        assert!(matches!(err, PipelineErrorKind::Temporary(PipelineError::Provider(_))));
        assert!(!source.open);
    }

    #[tokio::test]
    async fn test_next_filters_and_keeps_order() {
        let mut chain = TestChainProvider::default();
        let txs = vec![
            tx(BATCHER, INBOX, &[0x00, 0x01]),
            tx(Address::ZERO, INBOX, &[0x00, 0xBB]),
            tx(BATCHER, Address::ZERO, &[0x00, 0xCC]),
            tx(BATCHER, INBOX, &[0x00, 0x02]),
        ];
        chain.insert_block_with_transactions(10, block(), txs);
        let mut source = CalldataSource::new(chain, INBOX);

        assert_eq!(source.next(&block(), BATCHER).await.unwrap().as_ref(), &[0x00, 0x01]);
        assert_eq!(source.next(&block(), BATCHER).await.unwrap().as_ref(), &[0x00, 0x02]);
        assert!(source.next(&block(), BATCHER).await.unwrap_err().is_eof());
        assert!(source.open);

        source.clear();
        assert!(!source.open);
        assert!(source.calldata.is_empty());
    }

    #[tokio::test]
    async fn test_contract_creation_is_skipped() {
        let mut chain = TestChainProvider::default();
        let creation = L1Transaction { from: BATCHER, to: None, ..Default::default() };
        chain.insert_block_with_transactions(10, block(), vec![creation]);
        let mut source = CalldataSource::new(chain, INBOX);
        assert!(source.next(&block(), BATCHER).await.unwrap_err().is_eof());
    }
}
