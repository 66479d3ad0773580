//! Test utilities for the alt-DA crate.

use crate::{
    errors::{AltDaError, DaStorageError},
    traits::{AltDaInputFetcher, FinalizedHeadSignal},
    Commitment,
};
use alloy_eips::BlockNumHash;
use alloy_primitives::Bytes;
use async_trait::async_trait;
use mako_derive::{
    traits::ChainProvider,
    types::{BlockInfo, SystemConfig},
};

/// A mock [AltDaInputFetcher] replaying canned results.
///
/// Results are popped from the back. Once drained, origin advances succeed and inputs are
/// reported missing from storage.
#[derive(Debug, Clone, Default)]
pub struct TestAltDaInputFetcher {
    /// Inputs to return.
    pub inputs: Vec<Result<Bytes, AltDaError>>,
    /// Advance L1 origin results.
    pub advances: Vec<Result<(), AltDaError>>,
    /// The commitments inputs were requested for.
    pub requested: Vec<Commitment>,
    /// The origins the fetcher was reset to.
    pub resets: Vec<BlockInfo>,
    /// The finalized L1 heads received.
    pub finalized: Vec<BlockInfo>,
}

#[async_trait]
impl<CP: ChainProvider + Send> AltDaInputFetcher<CP> for TestAltDaInputFetcher {
    async fn get_input(
        &mut self,
        _l1: &mut CP,
        commitment: Commitment,
        _block: BlockInfo,
    ) -> Result<Bytes, AltDaError> {
        self.requested.push(commitment);
        self.inputs.pop().unwrap_or(Err(AltDaError::Storage(DaStorageError::NotFound)))
    }

    async fn advance_l1_origin(
        &mut self,
        _l1: &mut CP,
        _block: BlockNumHash,
    ) -> Result<(), AltDaError> {
        self.advances.pop().unwrap_or(Ok(()))
    }

    async fn reset(&mut self, base: BlockInfo, _cfg: SystemConfig) -> Result<(), AltDaError> {
        self.resets.push(base);
        Ok(())
    }

    async fn finalize(&mut self, l1_finalized: BlockInfo) -> Result<(), AltDaError> {
        self.finalized.push(l1_finalized);
        Ok(())
    }

    fn on_finalized_head_signal(&mut self, _callback: FinalizedHeadSignal) {}
}
