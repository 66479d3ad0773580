//! Stages pertaining to the reading and decoding of channels.
//!
//! Sitting after the [FrameQueue] stage, the [ChannelBank] and [ChannelAssembler] stages are
//! responsible for reading and decoding the [Frame]s into [Channel]s. The [ChannelReader] stage
//! is responsible for decoding the [Channel]s into [Batch]es, forwarding the [Batch]es to the
//! [BatchStream] stage.
//!
//! [Frame]: crate::types::Frame
//! [Channel]: crate::types::Channel
//! [Batch]: crate::batch::Batch
//! [FrameQueue]: crate::stages::FrameQueue
//! [BatchStream]: crate::stages::BatchStream

use crate::types::{Frame, PipelineResult};
use async_trait::async_trait;

pub(crate) mod channel_provider;
pub use channel_provider::{ActiveChannelStage, ChannelProvider};

pub(crate) mod channel_bank;
pub use channel_bank::ChannelBank;

pub(crate) mod channel_assembler;
pub use channel_assembler::ChannelAssembler;

pub(crate) mod channel_reader;
pub use channel_reader::{ChannelReader, ChannelReaderProvider};

/// Provides frames for the [ChannelBank] and [ChannelAssembler] stages.
#[async_trait]
pub trait NextFrameProvider {
    /// Retrieves the next [Frame] from the [FrameQueue] stage.
    ///
    /// [FrameQueue]: crate::stages::FrameQueue
    async fn next_frame(&mut self) -> PipelineResult<Frame>;
}
