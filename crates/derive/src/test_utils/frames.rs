//! Builders and assertions for the [FrameQueue] stage.

use crate::{
    errors::{PipelineError, PipelineErrorKind},
    params::DERIVATION_VERSION_0,
    stages::{FrameQueue, NextFrameProvider},
    test_utils::TestFrameQueueProvider,
    traits::OriginProvider,
    types::{BlockInfo, Frame, RollupConfig},
};
use alloy_primitives::Bytes;
use std::sync::Arc;

/// Encodes the frames as a single versioned batcher transaction payload.
pub fn encode_frames(frames: &[Frame]) -> Bytes {
    let mut bytes = vec![DERIVATION_VERSION_0];
    for frame in frames {
        bytes.extend_from_slice(&frame.encode());
    }
    Bytes::from(bytes)
}

/// A [FrameQueue] builder.
#[derive(Debug, Default)]
pub struct FrameQueueBuilder {
    origin: Option<BlockInfo>,
    config: Option<RollupConfig>,
    mock: Option<TestFrameQueueProvider>,
    expected_frames: Vec<Frame>,
    expected_err: Option<PipelineErrorKind>,
}

impl FrameQueueBuilder {
    /// Create a new [FrameQueueBuilder] instance.
    pub const fn new() -> Self {
        Self { origin: None, config: None, mock: None, expected_frames: vec![], expected_err: None }
    }

    /// Sets the rollup config.
    pub fn with_rollup_config(mut self, config: &RollupConfig) -> Self {
        self.config = Some(config.clone());
        self
    }

    /// Set the origin block.
    pub const fn with_origin(mut self, origin: BlockInfo) -> Self {
        self.origin = Some(origin);
        self
    }

    /// With expected frames.
    pub fn with_expected_frames(mut self, frames: &[Frame]) -> Self {
        self.expected_frames = frames.to_vec();
        self
    }

    /// Sets the expected error type.
    pub fn with_expected_err(mut self, err: PipelineErrorKind) -> Self {
        self.expected_err = Some(err);
        self
    }

    /// With a raw batcher payload.
    pub fn with_raw_frames(mut self, raw: Bytes) -> Self {
        self.mock.get_or_insert_with(Default::default).data.insert(0, Ok(raw));
        self
    }

    /// Adds a batcher payload carrying the frames to the mock provider.
    pub fn with_frames(self, frames: &[Frame]) -> Self {
        self.with_raw_frames(encode_frames(frames))
    }

    /// Build the [FrameQueue].
    pub fn build(self) -> FrameQueueAsserter {
        let mut mock = self.mock.unwrap_or_default();
        if let Some(origin) = self.origin {
            mock.set_origin(origin);
        }
        let config = Arc::new(self.config.unwrap_or_default());
        let err = self.expected_err.unwrap_or_else(|| PipelineError::Eof.temp());
        FrameQueueAsserter::new(FrameQueue::new(mock, config), self.expected_frames, err)
    }
}

/// The [FrameQueueAsserter] validates frame queue outputs.
#[derive(Debug)]
pub struct FrameQueueAsserter {
    inner: FrameQueue<TestFrameQueueProvider>,
    expected_frames: Vec<Frame>,
    expected_err: PipelineErrorKind,
}

impl FrameQueueAsserter {
    /// Create a new [FrameQueueAsserter] instance.
    pub const fn new(
        inner: FrameQueue<TestFrameQueueProvider>,
        expected_frames: Vec<Frame>,
        expected_err: PipelineErrorKind,
    ) -> Self {
        Self { inner, expected_frames, expected_err }
    }

    /// Asserts whether holocene is active at the current origin.
    pub fn holocene_active(&self, active: bool) {
        let holocene = self.inner.is_holocene_active(self.inner.origin().unwrap_or_default());
        assert_eq!(holocene, active);
    }

    /// Asserts that the frame queue returns with a missing origin error.
    pub async fn missing_origin(mut self) {
        let err = self.inner.next_frame().await.unwrap_err();
        assert_eq!(err, PipelineError::MissingOrigin.crit());
    }

    /// Asserts that the frame queue produces the expected frames, then the expected error.
    pub async fn next_frames(mut self) {
        for eframe in self.expected_frames.into_iter() {
            let frame = self.inner.next_frame().await.expect("unexpected frame");
            assert_eq!(frame, eframe);
        }
        let err = self.inner.next_frame().await.unwrap_err();
        assert_eq!(err, self.expected_err);
    }
}
