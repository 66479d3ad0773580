//! Contains the [L1Retrieval] stage of the derivation pipeline.

use crate::{
    errors::PipelineError,
    stages::FrameQueueProvider,
    traits::{DataAvailabilityProvider, OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, PipelineResult, Signal},
};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Provides L1 blocks for the [L1Retrieval] stage.
/// This is the previous stage in the pipeline.
#[async_trait]
pub trait L1RetrievalProvider {
    /// Returns the next L1 [BlockInfo] in the [L1Traversal] stage, if the stage is not complete.
    /// This function can only be called once while the stage is in progress, and will return
    /// [`None`] on subsequent calls unless the stage is reset or complete. If the stage is
    /// complete and the [BlockInfo] has been consumed, an [PipelineError::Eof] error is returned.
    ///
    /// [L1Traversal]: crate::stages::L1Traversal
    async fn next_l1_block(&mut self) -> PipelineResult<Option<BlockInfo>>;

    /// Returns the batcher [Address] from the [SystemConfig].
    ///
    /// [SystemConfig]: crate::types::SystemConfig
    fn batcher_addr(&self) -> Address;
}

/// The [L1Retrieval] stage of the derivation pipeline.
///
/// For each L1 [BlockInfo] pulled from the [L1Traversal] stage, [L1Retrieval] fetches the
/// associated batcher payloads from a specified [DataAvailabilityProvider], one at a time.
///
/// [L1Traversal]: crate::stages::L1Traversal
#[derive(Debug)]
pub struct L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// The previous stage in the pipeline.
    pub prev: P,
    /// The data availability provider to use for the L1 retrieval stage.
    pub provider: DAP,
    /// The current block ref.
    pub next: Option<BlockInfo>,
}

impl<DAP, P> L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// Creates a new [L1Retrieval] stage with the previous [L1Traversal] stage and given
    /// [DataAvailabilityProvider].
    ///
    /// [L1Traversal]: crate::stages::L1Traversal
    pub const fn new(prev: P, provider: DAP) -> Self {
        Self { prev, provider, next: None }
    }
}

#[async_trait]
impl<DAP, P> OriginAdvancer for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider + Send,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

#[async_trait]
impl<DAP, P> FrameQueueProvider for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider + Send,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    type Item = Bytes;

    async fn next_data(&mut self) -> PipelineResult<Self::Item> {
        if self.next.is_none() {
            self.next = Some(
                self.prev.next_l1_block().await?.ok_or(PipelineError::MissingL1Data.temp())?,
            );
        }
        let next = self.next.ok_or(PipelineError::MissingL1Data.temp())?;

        match self.provider.next(&next, self.prev.batcher_addr()).await {
            Ok(data) => Ok(data),
            Err(e) => {
                if e.is_eof() {
                    debug!(target: "l1_retrieval", "Exhausted batcher data of L1 block {}", next.number);
                    self.next = None;
                    self.provider.clear();
                } else {
                    warn!(target: "l1_retrieval", "Failed to retrieve batcher data: {e}");
                }
                Err(e)
            }
        }
    }
}

impl<DAP, P> OriginProvider for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<DAP, P> SignalReceiver for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider + Send,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        match signal {
            Signal::Reset(_) | Signal::Activation(_) => {
                // The reset origin is pulled again through the previous stage.
                self.next = None;
                self.provider.signal(signal).await?;
            }
            Signal::L1Finalized(_) => self.provider.signal(signal).await?,
            Signal::FlushChannel => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        stages::l1_traversal::tests::*,
        test_utils::{TestDAP, TestL1RetrievalProvider},
        types::ResetSignal,
    };

    #[tokio::test]
    async fn test_l1_retrieval_flush_channel() {
        let traversal = new_populated_test_traversal();
        let dap = TestDAP::default();
        let mut retrieval = L1Retrieval::new(traversal, dap);
        retrieval.next = Some(BlockInfo::default());
        retrieval.signal(Signal::FlushChannel).await.unwrap();
        assert!(retrieval.next.is_some());
        assert!(retrieval.provider.signals.is_empty());
    }

    #[tokio::test]
    async fn test_l1_retrieval_reset_signal() {
        let traversal = new_populated_test_traversal();
        let dap = TestDAP::default();
        let mut retrieval = L1Retrieval::new(traversal, dap);
        let origin = BlockInfo { number: 3, ..Default::default() };
        retrieval
            .signal(ResetSignal { l1_origin: origin, ..Default::default() }.signal())
            .await
            .unwrap();
        assert_eq!(retrieval.next, None);
        assert_eq!(retrieval.origin(), Some(origin));
        assert_eq!(retrieval.provider.signals.len(), 1);
        assert_eq!(retrieval.prev.next_l1_block().await.unwrap(), Some(origin));
    }

    #[tokio::test]
    async fn test_l1_retrieval_forwards_finalized_signal() {
        let traversal = new_populated_test_traversal();
        let dap = TestDAP::default();
        let mut retrieval = L1Retrieval::new(traversal, dap);
        let finalized = BlockInfo { number: 9, ..Default::default() };
        retrieval.signal(Signal::L1Finalized(finalized)).await.unwrap();
        assert_eq!(retrieval.provider.signals, vec![Signal::L1Finalized(finalized)]);
        assert!(retrieval.next.is_none());
    }

    #[tokio::test]
    async fn test_l1_retrieval_origin() {
        let traversal = new_populated_test_traversal();
        let dap = TestDAP::default();
        let retrieval = L1Retrieval::new(traversal, dap);
        let expected = BlockInfo::default();
        assert_eq!(retrieval.origin(), Some(expected));
    }

    #[tokio::test]
    async fn test_l1_retrieval_next_data() {
        let traversal = new_populated_test_traversal();
        let results = vec![Err(PipelineError::Eof.temp()), Ok(Bytes::default())];
        let dap = TestDAP { results, ..Default::default() };
        let mut retrieval = L1Retrieval::new(traversal, dap);
        assert_eq!(retrieval.next, None);
        let data = retrieval.next_data().await.unwrap();
        assert_eq!(data, Bytes::default());
        assert!(retrieval.next.is_some());
        // Data should be reset to none and the error should be bubbled up.
        let data = retrieval.next_data().await.unwrap_err();
        assert!(data.is_eof());
        assert!(retrieval.next.is_none());
        assert_eq!(retrieval.provider.clears, 1);
    }

    #[tokio::test]
    async fn test_l1_retrieval_existing_data_is_respected() {
        // The previous stage has no block, so it would bubble up an error if called.
        let mut prev = TestL1RetrievalProvider::default();
        prev.done = true;
        let dap = TestDAP { results: vec![Ok(Bytes::from_static(&[0x01]))], ..Default::default() };
        let mut retrieval = L1Retrieval::new(prev, dap);
        retrieval.next = Some(BlockInfo::default());
        let data = retrieval.next_data().await.unwrap();
        assert_eq!(data, Bytes::from_static(&[0x01]));
    }

    #[tokio::test]
    async fn test_l1_retrieval_exhausted_previous_stage() {
        let mut prev = TestL1RetrievalProvider::default();
        prev.done = true;
        let mut retrieval = L1Retrieval::new(prev, TestDAP::default());
        assert!(retrieval.next_data().await.unwrap_err().is_eof());
    }

    #[tokio::test]
    async fn test_l1_retrieval_missing_block() {
        let prev = TestL1RetrievalProvider::default();
        let mut retrieval = L1Retrieval::new(prev, TestDAP::default());
        let err = retrieval.next_data().await.unwrap_err();
        assert_eq!(err, PipelineError::MissingL1Data.temp());
    }
}
