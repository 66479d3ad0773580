//! Contains the [AltDaDataSource], a [DataAvailabilityProvider] that resolves alt-DA
//! commitments posted by the batcher.

use crate::{errors::AltDaError, traits::AltDaInputFetcher, Commitment, TX_DATA_VERSION_1};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use core::fmt::Debug;
use mako_derive::{
    errors::{PipelineError, ResetError},
    traits::{ChainProvider, DataAvailabilityProvider},
    types::{BlockInfo, PipelineResult, Signal},
};
use tracing::{debug, error, warn};

/// Wraps an L1 [DataAvailabilityProvider] and swaps the commitments it yields for their inputs.
///
/// Payloads without the alt-DA version byte are forwarded untouched, so the frame queue can
/// still parse batches posted directly on L1.
#[derive(Debug, Clone)]
pub struct AltDaDataSource<CP, F, D>
where
    CP: ChainProvider + Send,
    F: AltDaInputFetcher<CP> + Send,
    D: DataAvailabilityProvider + Send,
{
    /// The L1 provider the fetcher syncs challenges from.
    pub chain_provider: CP,
    /// The alt-DA input fetcher.
    pub fetcher: F,
    /// The L1 data source yielding commitments.
    pub source: D,
    /// A commitment whose input could not be fetched yet.
    pub commitment: Option<Commitment>,
}

impl<CP, F, D> AltDaDataSource<CP, F, D>
where
    CP: ChainProvider + Send,
    F: AltDaInputFetcher<CP> + Send,
    D: DataAvailabilityProvider + Send,
{
    /// Creates a new [AltDaDataSource].
    pub const fn new(chain_provider: CP, fetcher: F, source: D) -> Self {
        Self { chain_provider, fetcher, source, commitment: None }
    }
}

#[async_trait]
impl<CP, F, D> DataAvailabilityProvider for AltDaDataSource<CP, F, D>
where
    CP: ChainProvider + Send + Sync + Debug,
    F: AltDaInputFetcher<CP> + Send + Sync + Debug,
    D: DataAvailabilityProvider + Send + Sync + Debug,
{
    async fn next(&mut self, block_ref: &BlockInfo, batcher_address: Address) -> PipelineResult<Bytes> {
        // Syncing an origin twice is a no-op, so this runs on every call.
        match self.fetcher.advance_l1_origin(&mut self.chain_provider, block_ref.id()).await {
            Ok(()) => {}
            Err(AltDaError::ReorgRequired) => {
                error!(target: "alt_da", "New expired challenge at L1 block #{}", block_ref.number);
                return Err(ResetError::NewExpiredChallenge.reset());
            }
            Err(e) => {
                warn!(target: "alt_da", "Failed to advance alt-DA L1 origin: {e}");
                return Err(PipelineError::Provider(format!(
                    "failed to advance alt-DA L1 origin: {e}"
                ))
                .temp());
            }
        }

        loop {
            let commitment = match self.commitment.take() {
                Some(commitment) => commitment,
                None => {
                    let data = self.source.next(block_ref, batcher_address).await?;
                    let Some((&version, body)) = data.split_first() else {
                        warn!(target: "alt_da", "Empty batcher payload");
                        return Err(PipelineError::NotEnoughData.temp());
                    };
                    if version != TX_DATA_VERSION_1 {
                        debug!(target: "alt_da", "Forwarding non alt-DA payload");
                        return Ok(data);
                    }
                    match Commitment::decode(body) {
                        Ok(commitment) => commitment,
                        Err(e) => {
                            warn!(target: "alt_da", "Invalid commitment {data}: {e}");
                            return Err(PipelineError::NotEnoughData.temp());
                        }
                    }
                }
            };

            match self
                .fetcher
                .get_input(&mut self.chain_provider, commitment.clone(), *block_ref)
                .await
            {
                Ok(data) => {
                    if commitment.max_input_size().is_some_and(|max| data.len() > max) {
                        warn!(target: "alt_da", "Input of {commitment} exceeds the max size ({} bytes)", data.len());
                        continue;
                    }
                    return Ok(data);
                }
                Err(AltDaError::ReorgRequired) => {
                    // The manager synced ahead of the pipeline and expired a derived commitment.
                    warn!(target: "alt_da", "Challenge on a derived commitment expired");
                    return Err(ResetError::ReorgRequired.reset());
                }
                Err(AltDaError::ExpiredChallenge) => {
                    warn!(target: "alt_da", "Challenge on {commitment} expired, skipping input");
                    continue;
                }
                Err(AltDaError::MissingPastWindow) => {
                    return Err(PipelineError::DataUnavailable(format!(
                        "input for commitment {commitment} is not available"
                    ))
                    .crit());
                }
                Err(AltDaError::PendingChallenge) => {
                    debug!(target: "alt_da", "Input of {commitment} pending challenge");
                    self.commitment = Some(commitment);
                    return Err(PipelineError::NotEnoughData.temp());
                }
                Err(e) => {
                    self.commitment = Some(commitment.clone());
                    return Err(PipelineError::Provider(format!(
                        "failed to fetch input of {commitment}: {e}"
                    ))
                    .temp());
                }
            }
        }
    }

    fn clear(&mut self) {
        self.commitment = None;
        self.source.clear();
    }

    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match signal {
            Signal::Reset(reset) => {
                self.clear();
                self.source.signal(signal).await?;
                self.fetcher
                    .reset(reset.l1_origin, reset.system_config.unwrap_or_default())
                    .await
                    .map_err(Into::into)
            }
            Signal::L1Finalized(block) => {
                self.source.signal(signal).await?;
                self.fetcher.finalize(block).await.map_err(Into::into)
            }
            Signal::Activation(_) => {
                self.clear();
                self.source.signal(signal).await
            }
            Signal::FlushChannel => self.source.signal(signal).await,
        }
    }
}
