//! Test Utilities for chain provider traits

use crate::{
    errors::{PipelineError, PipelineErrorKind},
    traits::{ChainProvider, L2ChainProvider},
    types::{BlockInfo, L1Transaction, L2BlockInfo, RollupConfig, SystemConfig},
};
use alloy_consensus::{Header, Receipt};
use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use hashbrown::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// A mock chain provider for testing.
#[derive(Debug, Clone, Default)]
pub struct TestChainProvider {
    /// Maps block numbers to block information using a tuple list.
    pub blocks: Vec<(u64, BlockInfo)>,
    /// Maps block hashes to header information using a tuple list.
    pub headers: Vec<(B256, Header)>,
    /// Maps block hashes to receipts using a tuple list.
    pub receipts: Vec<(B256, Vec<Receipt>)>,
    /// Maps block hashes to transactions using a tuple list.
    pub transactions: Vec<(B256, Vec<L1Transaction>)>,
}

impl TestChainProvider {
    /// Insert a block into the mock chain provider.
    pub fn insert_block(&mut self, number: u64, block: BlockInfo) {
        self.blocks.push((number, block));
    }

    /// Insert a block with transactions into the mock chain provider.
    pub fn insert_block_with_transactions(
        &mut self,
        number: u64,
        block: BlockInfo,
        txs: Vec<L1Transaction>,
    ) {
        self.blocks.push((number, block));
        self.transactions.push((block.hash, txs));
    }

    /// Insert receipts into the mock chain provider.
    pub fn insert_receipts(&mut self, hash: B256, receipts: Vec<Receipt>) {
        self.receipts.push((hash, receipts));
    }

    /// Insert a header into the mock chain provider, keyed by the given hash.
    pub fn insert_header(&mut self, hash: B256, header: Header) {
        self.headers.push((hash, header));
    }

    /// Clears all blocks, headers and receipts from the mock chain provider.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.receipts.clear();
        self.headers.clear();
        self.transactions.clear();
    }
}

/// An error for the [TestChainProvider] and [TestL2ChainProvider].
#[derive(Error, Debug)]
pub enum TestProviderError {
    /// The block was not found.
    #[error("Block not found")]
    BlockNotFound,
    /// The header was not found.
    #[error("Header not found")]
    HeaderNotFound,
    /// The receipts were not found.
    #[error("Receipts not found")]
    ReceiptsNotFound,
    /// The L2 block was not found.
    #[error("L2 Block not found")]
    L2BlockNotFound,
    /// The system config was not found.
    #[error("System config not found for block {0}")]
    SystemConfigNotFound(u64),
}

impl From<TestProviderError> for PipelineErrorKind {
    fn from(val: TestProviderError) -> Self {
        match val {
            // The mock chain has no block past its tip yet.
            TestProviderError::BlockNotFound => PipelineError::Eof.temp(),
            _ => PipelineError::Provider(val.to_string()).temp(),
        }
    }
}

#[async_trait]
impl ChainProvider for TestChainProvider {
    type Error = TestProviderError;

    async fn header_by_hash(&mut self, hash: B256) -> Result<Header, Self::Error> {
        self.headers
            .iter()
            .find(|(h, _)| *h == hash)
            .map(|(_, header)| header.clone())
            .ok_or(TestProviderError::HeaderNotFound)
    }

    async fn block_info_by_number(&mut self, number: u64) -> Result<BlockInfo, Self::Error> {
        self.blocks
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, block)| *block)
            .ok_or(TestProviderError::BlockNotFound)
    }

    async fn receipts_by_hash(&mut self, hash: B256) -> Result<Vec<Receipt>, Self::Error> {
        self.receipts
            .iter()
            .find(|(h, _)| *h == hash)
            .map(|(_, receipts)| receipts.clone())
            .ok_or(TestProviderError::ReceiptsNotFound)
    }

    async fn block_info_and_transactions_by_hash(
        &mut self,
        hash: B256,
    ) -> Result<(BlockInfo, Vec<L1Transaction>), Self::Error> {
        let block = self
            .blocks
            .iter()
            .find(|(_, b)| b.hash == hash)
            .map(|(_, b)| *b)
            .ok_or(TestProviderError::BlockNotFound)?;
        let txs = self
            .transactions
            .iter()
            .find(|(h, _)| *h == hash)
            .map(|(_, txs)| txs.clone())
            .unwrap_or_default();
        Ok((block, txs))
    }
}

/// An [L2ChainProvider] implementation for testing.
#[derive(Debug, Default, Clone)]
pub struct TestL2ChainProvider {
    /// Safe L2 blocks.
    pub blocks: Vec<L2BlockInfo>,
    /// Short circuit the block return to be the first block.
    pub short_circuit: bool,
    /// EIP-2718 encoded transactions by L2 block number.
    pub transactions: HashMap<u64, Vec<Bytes>>,
    /// System configs by L2 block number.
    pub system_configs: HashMap<u64, SystemConfig>,
}

impl TestL2ChainProvider {
    /// Creates a new [TestL2ChainProvider] with the given blocks and system configs.
    pub fn new(blocks: Vec<L2BlockInfo>, system_configs: HashMap<u64, SystemConfig>) -> Self {
        Self { blocks, short_circuit: false, transactions: HashMap::new(), system_configs }
    }
}

#[async_trait]
impl L2ChainProvider for TestL2ChainProvider {
    type Error = TestProviderError;

    async fn l2_block_info_by_number(&mut self, number: u64) -> Result<L2BlockInfo, Self::Error> {
        if self.short_circuit {
            return self.blocks.first().copied().ok_or(TestProviderError::BlockNotFound);
        }
        self.blocks
            .iter()
            .find(|b| b.block_info.number == number)
            .copied()
            .ok_or(TestProviderError::BlockNotFound)
    }

    async fn transactions_by_number(&mut self, number: u64) -> Result<Vec<Bytes>, Self::Error> {
        self.transactions.get(&number).cloned().ok_or(TestProviderError::L2BlockNotFound)
    }

    async fn system_config_by_number(
        &mut self,
        number: u64,
        _: Arc<RollupConfig>,
    ) -> Result<SystemConfig, Self::Error> {
        self.system_configs
            .get(&number)
            .copied()
            .ok_or(TestProviderError::SystemConfigNotFound(number))
    }
}
