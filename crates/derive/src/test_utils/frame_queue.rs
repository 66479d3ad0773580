//! Mock types for the [FrameQueue] stage.

use crate::{
    errors::PipelineError,
    stages::FrameQueueProvider,
    traits::{OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, PipelineResult, Signal},
};
use alloy_primitives::Bytes;
use async_trait::async_trait;

/// A mock [FrameQueueProvider] for testing the [FrameQueue] stage.
///
/// [FrameQueue]: crate::stages::FrameQueue
#[derive(Debug, Default)]
pub struct TestFrameQueueProvider {
    /// The data to return.
    pub data: Vec<PipelineResult<Bytes>>,
    /// The origin to return.
    pub origin: Option<BlockInfo>,
    /// Whether a reset-like signal was received.
    pub reset: bool,
    /// The signals received, in order.
    pub signals: Vec<Signal>,
}

impl TestFrameQueueProvider {
    /// Creates a new [TestFrameQueueProvider] with the given data.
    pub const fn new(data: Vec<PipelineResult<Bytes>>) -> Self {
        Self { data, origin: None, reset: false, signals: Vec::new() }
    }

    /// Sets the origin for the [TestFrameQueueProvider].
    pub fn set_origin(&mut self, origin: BlockInfo) {
        self.origin = Some(origin);
    }
}

impl OriginProvider for TestFrameQueueProvider {
    fn origin(&self) -> Option<BlockInfo> {
        self.origin
    }
}

#[async_trait]
impl OriginAdvancer for TestFrameQueueProvider {
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        if let Some(origin) = self.origin.as_mut() {
            origin.number += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl FrameQueueProvider for TestFrameQueueProvider {
    type Item = Bytes;

    async fn next_data(&mut self) -> PipelineResult<Self::Item> {
        self.data.pop().unwrap_or(Err(PipelineError::Eof.temp()))
    }
}

#[async_trait]
impl SignalReceiver for TestFrameQueueProvider {
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.reset |= signal.is_reset_like();
        self.signals.push(signal);
        Ok(())
    }
}
