//! This module contains the [FrameQueue] stage of the derivation pipeline.

use crate::{
    errors::PipelineError,
    stages::NextFrameProvider,
    traits::{OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, Frame, PipelineResult, RollupConfig, Signal},
};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use std::{collections::VecDeque, fmt::Debug, sync::Arc};
use tracing::{debug, trace, warn};

/// Provides data frames for the [FrameQueue] stage.
#[async_trait]
pub trait FrameQueueProvider {
    /// An item that can be converted into a byte array.
    type Item: Into<Bytes>;

    /// Retrieve the next data item from the L1 retrieval stage.
    /// Returns an error if there is no data.
    async fn next_data(&mut self) -> PipelineResult<Self::Item>;
}

/// The [FrameQueue] stage of the derivation pipeline.
///
/// This stage takes the output of the [L1Retrieval] stage and parses it into frames.
///
/// [L1Retrieval]: crate::stages::L1Retrieval
#[derive(Debug)]
pub struct FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    /// The previous stage in the pipeline.
    pub prev: P,
    /// The current frame queue.
    queue: VecDeque<Frame>,
    /// The rollup config.
    rollup_config: Arc<RollupConfig>,
}

impl<P> FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    /// Create a new [FrameQueue] stage with the given previous [L1Retrieval] stage.
    ///
    /// [L1Retrieval]: crate::stages::L1Retrieval
    pub const fn new(prev: P, cfg: Arc<RollupConfig>) -> Self {
        Self { prev, queue: VecDeque::new(), rollup_config: cfg }
    }

    /// Returns if holocene is active.
    pub fn is_holocene_active(&self, origin: BlockInfo) -> bool {
        self.rollup_config.is_holocene_active(origin.timestamp)
    }

    /// Prunes frames that violate the Holocene ordering rules from the queue.
    ///
    /// The queue only ever holds the frames of a single batcher payload, so the rules apply
    /// within one payload:
    /// - frames of a channel must be numbered sequentially,
    /// - no frame may follow the closing frame of its channel,
    /// - a new channel must start with frame `0`,
    /// - a new channel replaces an unfinished predecessor, whose frames are dropped.
    pub fn prune(&mut self, origin: BlockInfo) {
        if !self.is_holocene_active(origin) {
            return;
        }

        let mut i = 0;
        while i + 1 < self.queue.len() {
            let prev_frame = &self.queue[i];
            let next_frame = &self.queue[i + 1];
            let extends_channel = prev_frame.id == next_frame.id;

            // Non-sequential frame of the same channel, or a frame past the closing one.
            if extends_channel &&
                (prev_frame.number.checked_add(1) != Some(next_frame.number) || prev_frame.is_last)
            {
                trace!(target: "frame_queue", "Pruning out of order frame {}", next_frame.number);
                self.queue.remove(i + 1);
                continue;
            }

            // A different channel must open with its first frame.
            if !extends_channel && next_frame.number != 0 {
                trace!(target: "frame_queue", "Pruning non-first frame {} of a new channel", next_frame.number);
                self.queue.remove(i + 1);
                continue;
            }

            // A new channel starts while the previous one is unfinished: drop the previous one.
            if !extends_channel && !prev_frame.is_last {
                let prev_id = prev_frame.id;
                let first = self.queue.iter().position(|f| f.id == prev_id).unwrap_or(i);
                let drained = self.queue.drain(first..=i).count();
                debug!(target: "frame_queue", "Pruned {drained} frames of an unfinished channel");
                i = i.saturating_sub(drained);
                continue;
            }

            i += 1;
        }
    }

    /// Loads more frames into the [FrameQueue].
    pub async fn load_frames(&mut self) -> PipelineResult<()> {
        // Skip loading frames if the queue is not empty.
        if !self.queue.is_empty() {
            return Ok(());
        }

        let data = match self.prev.next_data().await {
            Ok(data) => data,
            Err(e) => {
                debug!(target: "frame_queue", "Failed to retrieve data: {:?}", e);
                // SAFETY: Bubble up potential EOF error without wrapping.
                return Err(e);
            }
        };

        let data: Bytes = data.into();
        let frames = match Frame::parse_frames(&data) {
            Ok(frames) => frames,
            Err(e) => {
                // There may be more frames in the queue for the pipeline to advance, so don't
                // return an error here.
                warn!(target: "frame_queue", "Dropping batcher payload: {e}");
                crate::inc!(DERIVED_FRAMES_COUNT, &["failed"]);
                return Ok(());
            }
        };
        crate::inc!(DERIVED_FRAMES_COUNT, frames.len() as f64, &["success"]);

        // Optimistically extend the queue with the new frames.
        self.queue.extend(frames);

        // Prune frames if Holocene is active.
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;
        self.prune(origin);

        Ok(())
    }
}

#[async_trait]
impl<P> OriginAdvancer for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

#[async_trait]
impl<P> NextFrameProvider for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn next_frame(&mut self) -> PipelineResult<Frame> {
        self.load_frames().await?;

        // If there are no frames in the queue, return an error.
        match self.queue.pop_front() {
            Some(frame) => Ok(frame),
            None => Err(PipelineError::NotEnoughData.temp()),
        }
    }
}

impl<P> OriginProvider for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> SignalReceiver for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        if signal.is_reset_like() {
            self.queue = VecDeque::default();
        }
        Ok(())
    }
}
