//! Contains the trait describing the data availability layer used by [L1Retrieval].
//!
//! [L1Retrieval]: crate::stages::L1Retrieval

use crate::types::{BlockInfo, PipelineResult, Signal};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;

/// Describes the functionality of a data source that can provide data availability information.
#[async_trait]
pub trait DataAvailabilityProvider {
    /// Returns the next batcher payload of the given L1 block.
    ///
    /// Returns [PipelineError::Eof] once every payload of the block has been returned.
    ///
    /// [PipelineError::Eof]: crate::errors::PipelineError::Eof
    async fn next(&mut self, block_ref: &BlockInfo, batcher_address: Address)
        -> PipelineResult<Bytes>;

    /// Drops any buffered payloads of the current block.
    fn clear(&mut self);

    /// Receives a pipeline signal. Reset-like signals clear the provider by default.
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        if signal.is_reset_like() {
            self.clear();
        }
        Ok(())
    }
}
