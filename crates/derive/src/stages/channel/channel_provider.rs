//! This module contains the [ChannelProvider] stage.

use super::{ChannelAssembler, ChannelBank, ChannelReaderProvider, NextFrameProvider};
use crate::{
    errors::PipelineError,
    traits::{OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, PipelineResult, RollupConfig, Signal},
};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tracing::info;

/// The [ChannelProvider] stage is a multiplexer over the [ChannelBank] and [ChannelAssembler]
/// stages.
///
/// The [ChannelBank] is active before Holocene and the [ChannelAssembler] after. The active stage
/// is rebuilt from the shared previous stage whenever the L1 origin crosses the activation
/// timestamp, in either direction.
#[derive(Debug)]
pub struct ChannelProvider<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    /// The rollup configuration.
    cfg: Arc<RollupConfig>,
    /// The previous stage, held only until the first active stage is built.
    prev: Option<P>,
    /// The channel bank, active before Holocene.
    ///
    /// Must be [None] if `prev` or `channel_assembler` is [Some].
    channel_bank: Option<ChannelBank<P>>,
    /// The channel assembler, active after Holocene.
    ///
    /// Must be [None] if `prev` or `channel_bank` is [Some].
    channel_assembler: Option<ChannelAssembler<P>>,
}

/// A mutable reference to the active channel stage.
#[derive(Debug)]
pub enum ActiveChannelStage<'a, P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    /// The pre-Holocene [ChannelBank].
    Bank(&'a mut ChannelBank<P>),
    /// The post-Holocene [ChannelAssembler].
    Assembler(&'a mut ChannelAssembler<P>),
}

impl<P> ChannelProvider<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    /// Creates a new [ChannelProvider] with the given configuration and previous stage.
    pub const fn new(cfg: Arc<RollupConfig>, prev: P) -> Self {
        Self { cfg, prev: Some(prev), channel_bank: None, channel_assembler: None }
    }

    /// Builds or swaps the active stage for the current L1 origin.
    fn attempt_update(&mut self) -> PipelineResult<()> {
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;
        let holocene = self.cfg.is_holocene_active(origin.timestamp);

        if let Some(prev) = self.prev.take() {
            if holocene {
                self.channel_assembler = Some(ChannelAssembler::new(self.cfg.clone(), prev));
            } else {
                self.channel_bank = Some(ChannelBank::new(self.cfg.clone(), prev));
            }
        } else if holocene {
            if let Some(bank) = self.channel_bank.take() {
                info!(target: "channel_provider", "Holocene active, switching to channel assembler");
                self.channel_assembler = Some(ChannelAssembler::new(self.cfg.clone(), bank.prev));
            }
        } else if let Some(assembler) = self.channel_assembler.take() {
            info!(target: "channel_provider", "Holocene inactive, switching to channel bank");
            self.channel_bank = Some(ChannelBank::new(self.cfg.clone(), assembler.prev));
        }
        Ok(())
    }

    /// Returns the active stage, updating it for the current L1 origin first.
    pub fn active_stage_mut(&mut self) -> PipelineResult<ActiveChannelStage<'_, P>> {
        self.attempt_update()?;
        if let Some(bank) = self.channel_bank.as_mut() {
            Ok(ActiveChannelStage::Bank(bank))
        } else if let Some(assembler) = self.channel_assembler.as_mut() {
            Ok(ActiveChannelStage::Assembler(assembler))
        } else {
            Err(PipelineError::NotEnoughData.temp())
        }
    }
}

#[async_trait]
impl<P> OriginAdvancer for ChannelProvider<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        match self.active_stage_mut()? {
            ActiveChannelStage::Bank(stage) => stage.advance_origin().await,
            ActiveChannelStage::Assembler(stage) => stage.advance_origin().await,
        }
    }
}

impl<P> OriginProvider for ChannelProvider<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.channel_bank.as_ref().map_or_else(
            || {
                self.channel_assembler.as_ref().map_or_else(
                    || self.prev.as_ref().and_then(|prev| prev.origin()),
                    |assembler| assembler.origin(),
                )
            },
            |bank| bank.origin(),
        )
    }
}

#[async_trait]
impl<P> SignalReceiver for ChannelProvider<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match self.active_stage_mut()? {
            ActiveChannelStage::Bank(stage) => stage.signal(signal).await?,
            ActiveChannelStage::Assembler(stage) => stage.signal(signal).await?,
        }
        // The signal may have moved the origin across the activation boundary.
        self.attempt_update()
    }
}

#[async_trait]
impl<P> ChannelReaderProvider for ChannelProvider<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn next_data(&mut self) -> PipelineResult<Option<Bytes>> {
        match self.active_stage_mut()? {
            ActiveChannelStage::Bank(stage) => stage.next_data().await,
            ActiveChannelStage::Assembler(stage) => stage.next_data().await,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        test_utils::TestNextFrameProvider,
        types::{ActivationSignal, ResetSignal},
    };

    #[test]
    fn test_channel_provider_assembler_active() {
        let provider = TestNextFrameProvider::new(vec![]);
        let cfg = Arc::new(RollupConfig { holocene_time: Some(0), ..Default::default() });
        let mut channel_provider = ChannelProvider::new(cfg, provider);

        let active_stage = channel_provider.active_stage_mut().unwrap();
        assert!(matches!(active_stage, ActiveChannelStage::Assembler(_)));
    }

    #[test]
    fn test_channel_provider_bank_active() {
        let provider = TestNextFrameProvider::new(vec![]);
        let cfg = Arc::new(RollupConfig::default());
        let mut channel_provider = ChannelProvider::new(cfg, provider);

        let active_stage = channel_provider.active_stage_mut().unwrap();
        assert!(matches!(active_stage, ActiveChannelStage::Bank(_)));
    }

    #[test]
    fn test_channel_provider_missing_origin() {
        let mut provider = TestNextFrameProvider::new(vec![]);
        provider.block_info = None;
        let mut channel_provider = ChannelProvider::new(Arc::new(RollupConfig::default()), provider);
        assert_eq!(
            channel_provider.active_stage_mut().unwrap_err(),
            PipelineError::MissingOrigin.crit()
        );
    }

    #[test]
    fn test_channel_provider_transition_stage() {
        let provider = TestNextFrameProvider::new(vec![]);
        let cfg = Arc::new(RollupConfig { holocene_time: Some(2), ..Default::default() });
        let mut channel_provider = ChannelProvider::new(cfg, provider);

        let ActiveChannelStage::Bank(stage) = channel_provider.active_stage_mut().unwrap() else {
            panic!("Expected ChannelBank");
        };

        // Update the L1 origin to Holocene activation.
        stage.prev.block_info = Some(BlockInfo { number: 1, timestamp: 2, ..Default::default() });

        // Transition to the ChannelAssembler stage.
        let ActiveChannelStage::Assembler(stage) = channel_provider.active_stage_mut().unwrap()
        else {
            panic!("Expected ChannelAssembler");
        };
        assert_eq!(stage.origin().unwrap().number, 1);
    }

    #[test]
    fn test_channel_provider_transition_stage_backwards() {
        let provider = TestNextFrameProvider::new(vec![]);
        let cfg = Arc::new(RollupConfig { holocene_time: Some(2), ..Default::default() });
        let mut channel_provider = ChannelProvider::new(cfg, provider);

        let ActiveChannelStage::Bank(stage) = channel_provider.active_stage_mut().unwrap() else {
            panic!("Expected ChannelBank");
        };
        stage.prev.block_info = Some(BlockInfo { number: 1, timestamp: 2, ..Default::default() });

        let ActiveChannelStage::Assembler(stage) = channel_provider.active_stage_mut().unwrap()
        else {
            panic!("Expected ChannelAssembler");
        };
        // Reorg back before Holocene activation.
        stage.prev.block_info = Some(BlockInfo { number: 0, timestamp: 1, ..Default::default() });

        let ActiveChannelStage::Bank(stage) = channel_provider.active_stage_mut().unwrap() else {
            panic!("Expected ChannelBank");
        };
        assert_eq!(stage.origin().unwrap().number, 0);
    }

    #[tokio::test]
    async fn test_channel_provider_reset_bank() {
        let frames = [crate::frame!(0xFF, 0, vec![0xDD; 50], false)];
        let provider = TestNextFrameProvider::new(frames.into_iter().map(Ok).collect());
        let cfg = Arc::new(RollupConfig::default());
        let mut channel_provider = ChannelProvider::new(cfg, provider);

        // Load in the first frame.
        assert_eq!(
            channel_provider.next_data().await.unwrap_err(),
            PipelineError::NotEnoughData.temp()
        );
        let Ok(ActiveChannelStage::Bank(channel_bank)) = channel_provider.active_stage_mut() else {
            panic!("Expected ChannelBank");
        };
        assert_eq!(channel_bank.channel_queue.len(), 1);

        channel_provider.signal(ResetSignal::default().signal()).await.unwrap();
        let Ok(ActiveChannelStage::Bank(channel_bank)) = channel_provider.active_stage_mut() else {
            panic!("Expected ChannelBank");
        };
        assert!(channel_bank.channel_queue.is_empty());
        assert!(channel_bank.prev.reset);
    }

    #[tokio::test]
    async fn test_channel_provider_activation_switches_stage() {
        let provider = TestNextFrameProvider::new(vec![]);
        let cfg = Arc::new(RollupConfig { holocene_time: Some(10), ..Default::default() });
        let mut channel_provider = ChannelProvider::new(cfg, provider);
        assert!(matches!(
            channel_provider.active_stage_mut().unwrap(),
            ActiveChannelStage::Bank(_)
        ));

        let l1_origin = BlockInfo { number: 5, timestamp: 10, ..Default::default() };
        channel_provider
            .signal(ActivationSignal { l1_origin, ..Default::default() }.signal())
            .await
            .unwrap();
        let ActiveChannelStage::Assembler(assembler) = channel_provider.active_stage_mut().unwrap()
        else {
            panic!("Expected ChannelAssembler");
        };
        assert!(assembler.prev.reset);
        assert_eq!(assembler.origin(), Some(l1_origin));
    }
}
