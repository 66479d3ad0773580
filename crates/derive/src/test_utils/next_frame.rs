//! A mock [NextFrameProvider] for the channel stages.

use super::signal_origin;
use crate::{
    errors::PipelineError,
    stages::NextFrameProvider,
    traits::{OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, Frame, PipelineResult, Signal},
};
use async_trait::async_trait;

/// A mock [NextFrameProvider] for testing the [ChannelBank] and [ChannelAssembler] stages.
///
/// [ChannelBank]: crate::stages::ChannelBank
/// [ChannelAssembler]: crate::stages::ChannelAssembler
#[derive(Debug, Default)]
pub struct TestNextFrameProvider {
    /// The data to return.
    pub data: Vec<PipelineResult<Frame>>,
    /// The block info
    pub block_info: Option<BlockInfo>,
    /// Tracks if the provider has been reset.
    pub reset: bool,
}

impl TestNextFrameProvider {
    /// Creates a new [TestNextFrameProvider] with the given data.
    pub fn new(data: Vec<PipelineResult<Frame>>) -> Self {
        Self { data, block_info: Some(BlockInfo::default()), reset: false }
    }
}

impl OriginProvider for TestNextFrameProvider {
    fn origin(&self) -> Option<BlockInfo> {
        self.block_info
    }
}

#[async_trait]
impl NextFrameProvider for TestNextFrameProvider {
    async fn next_frame(&mut self) -> PipelineResult<Frame> {
        self.data.pop().unwrap_or(Err(PipelineError::Eof.temp()))
    }
}

#[async_trait]
impl OriginAdvancer for TestNextFrameProvider {
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        if let Some(origin) = self.block_info.as_mut() {
            origin.number += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl SignalReceiver for TestNextFrameProvider {
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        if let Some(origin) = signal_origin(&signal) {
            self.block_info = Some(origin);
            self.reset = true;
        }
        Ok(())
    }
}
