//! Mocks for the [L1Retrieval] stage and the data availability layer beneath it.
//!
//! [L1Retrieval]: crate::stages::L1Retrieval

use crate::{
    errors::PipelineError,
    stages::L1RetrievalProvider,
    traits::{DataAvailabilityProvider, OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, PipelineResult, Signal},
};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;

/// Mock data availability provider.
///
/// Results are popped from the back; once drained, [PipelineError::Eof] is returned.
#[derive(Debug, Default)]
pub struct TestDAP {
    /// The results to return as batcher payloads.
    pub results: Vec<PipelineResult<Bytes>>,
    /// The `(block, batcher)` pairs that data was requested for.
    pub requests: Vec<(BlockInfo, Address)>,
    /// The signals received.
    pub signals: Vec<Signal>,
    /// The number of times the provider was cleared.
    pub clears: usize,
}

#[async_trait]
impl DataAvailabilityProvider for TestDAP {
    async fn next(
        &mut self,
        block_ref: &BlockInfo,
        batcher_address: Address,
    ) -> PipelineResult<Bytes> {
        self.requests.push((*block_ref, batcher_address));
        self.results.pop().unwrap_or(Err(PipelineError::Eof.temp()))
    }

    fn clear(&mut self) {
        self.clears += 1;
    }

    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.signals.push(signal);
        Ok(())
    }
}

/// A mock [L1RetrievalProvider] handing out a single block.
#[derive(Debug, Default)]
pub struct TestL1RetrievalProvider {
    /// The block to hand out once.
    pub block: Option<BlockInfo>,
    /// Whether the provider is exhausted.
    pub done: bool,
    /// The batcher address to report.
    pub batcher_address: Address,
    /// Whether a reset-like signal was received.
    pub reset: bool,
}

impl TestL1RetrievalProvider {
    /// Creates a new [TestL1RetrievalProvider] handing out `block`.
    pub const fn new(block: Option<BlockInfo>, batcher_address: Address) -> Self {
        Self { block, done: false, batcher_address, reset: false }
    }
}

#[async_trait]
impl L1RetrievalProvider for TestL1RetrievalProvider {
    async fn next_l1_block(&mut self) -> PipelineResult<Option<BlockInfo>> {
        if self.done {
            return Err(PipelineError::Eof.temp());
        }
        Ok(self.block.take())
    }

    fn batcher_addr(&self) -> Address {
        self.batcher_address
    }
}

impl OriginProvider for TestL1RetrievalProvider {
    fn origin(&self) -> Option<BlockInfo> {
        self.block
    }
}

#[async_trait]
impl OriginAdvancer for TestL1RetrievalProvider {
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        Ok(())
    }
}

#[async_trait]
impl SignalReceiver for TestL1RetrievalProvider {
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.reset |= signal.is_reset_like();
        Ok(())
    }
}
