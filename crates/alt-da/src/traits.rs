//! Collaborators of the alt-DA data source.

use crate::{
    errors::{AltDaError, DaStorageError},
    Commitment,
};
use alloy_eips::BlockNumHash;
use alloy_primitives::Bytes;
use async_trait::async_trait;
use mako_derive::{
    traits::ChainProvider,
    types::{BlockInfo, SystemConfig},
};

/// A callback receiving the alt-DA finalized L1 head.
pub type FinalizedHeadSignal = Box<dyn Fn(BlockInfo) + Send + Sync>;

/// The off-chain DA service storing the inputs behind commitments.
#[async_trait]
pub trait DaStorage {
    /// Returns the input behind the commitment.
    ///
    /// Returns [DaStorageError::NotFound] if the service does not have it.
    async fn get_input(&mut self, commitment: &Commitment) -> Result<Bytes, DaStorageError>;
}

/// Resolves alt-DA commitments and tracks their challenges along the L1 chain.
#[async_trait]
pub trait AltDaInputFetcher<CP: ChainProvider + Send> {
    /// Returns the input for the commitment included in `block`.
    async fn get_input(
        &mut self,
        l1: &mut CP,
        commitment: Commitment,
        block: BlockInfo,
    ) -> Result<Bytes, AltDaError>;

    /// Syncs the challenge events of `block`, expires challenges and commitments, and moves the
    /// origin to `block`.
    async fn advance_l1_origin(&mut self, l1: &mut CP, block: BlockNumHash)
        -> Result<(), AltDaError>;

    /// Moves the origins back to `base` after a pipeline reset.
    async fn reset(&mut self, base: BlockInfo, cfg: SystemConfig) -> Result<(), AltDaError>;

    /// Receives the finalized L1 head, prunes the state and signals the alt-DA finalized head.
    async fn finalize(&mut self, l1_finalized: BlockInfo) -> Result<(), AltDaError>;

    /// Sets the callback receiving the alt-DA finalized head.
    fn on_finalized_head_signal(&mut self, callback: FinalizedHeadSignal);
}
