//! This module contains the [ChannelAssembler] stage.

use super::{ChannelReaderProvider, NextFrameProvider};
use crate::{
    errors::PipelineError,
    traits::{OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, Channel, PipelineResult, RollupConfig, Signal},
};
use alloy_primitives::{hex, Bytes};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tracing::{debug, info, warn};

/// The [ChannelAssembler] stage is responsible for assembling the [Frame]s from the [FrameQueue]
/// stage into a raw compressed [Channel].
///
/// Only one channel is staged at a time. A frame numbered `0` opens a new staging channel and
/// discards the previous one, any other frame must directly follow the last frame of the staged
/// channel.
///
/// [Frame]: crate::types::Frame
/// [FrameQueue]: crate::stages::FrameQueue
#[derive(Debug)]
pub struct ChannelAssembler<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    /// The rollup configuration.
    pub(crate) cfg: Arc<RollupConfig>,
    /// The previous stage of the derivation pipeline.
    pub prev: P,
    /// The current [Channel] being assembled.
    pub(crate) channel: Option<Channel>,
}

impl<P> ChannelAssembler<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    /// Creates a new [ChannelAssembler] stage with the given configuration and previous stage.
    pub fn new(cfg: Arc<RollupConfig>, prev: P) -> Self {
        crate::set!(CURRENT_CHANNEL_FRAMES, 0);
        Self { cfg, prev, channel: None }
    }

    /// Returns whether or not the channel currently being assembled has timed out.
    pub fn is_timed_out(&self) -> PipelineResult<bool> {
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;
        let is_timed_out = self
            .channel
            .as_ref()
            .map(|c| c.open_block_number() + self.cfg.channel_timeout(origin.timestamp) < origin.number)
            .unwrap_or_default();

        Ok(is_timed_out)
    }
}

#[async_trait]
impl<P> ChannelReaderProvider for ChannelAssembler<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn next_data(&mut self) -> PipelineResult<Option<Bytes>> {
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;

        // Time out the channel if it has timed out.
        if self.is_timed_out()? {
            if let Some(channel) = self.channel.take() {
                warn!(
                    target: "channel_assembler",
                    "Channel {} timed out at L1 origin {}, open block {}. Discarding channel.",
                    hex::encode(channel.id()),
                    origin.number,
                    channel.open_block_number()
                );
                crate::observe!(CHANNEL_TIMEOUTS, (origin.number - channel.open_block_number()) as f64);
                crate::set!(CURRENT_CHANNEL_FRAMES, 0);
            }
        }

        // Grab the next frame from the previous stage.
        let next_frame = self.prev.next_frame().await?;

        // Start a new channel if the frame number is 0.
        if next_frame.number == 0 {
            if let Some(previous) = self.channel.as_ref() {
                warn!(
                    target: "channel_assembler",
                    "Discarding unfinished channel {} for new channel {}",
                    hex::encode(previous.id()),
                    hex::encode(next_frame.id)
                );
            }
            info!(
                target: "channel_assembler",
                "Starting new channel {} at L1 origin {}",
                hex::encode(next_frame.id),
                origin.number
            );
            self.channel = Some(Channel::new(next_frame.id, origin));
        }

        let Some(channel) = self.channel.as_mut() else {
            warn!(
                target: "channel_assembler",
                "Dropping frame {} of channel {} without a staged channel",
                next_frame.number,
                hex::encode(next_frame.id)
            );
            crate::inc!(DERIVED_FRAMES_COUNT, &["dropped"]);
            return Err(PipelineError::NotEnoughData.temp());
        };

        // Frames must arrive strictly in order.
        if next_frame.id == channel.id() && next_frame.number as usize != channel.len() {
            warn!(
                target: "channel_assembler",
                "Dropping out of order frame {} of channel {}, expected frame {}",
                next_frame.number,
                hex::encode(next_frame.id),
                channel.len()
            );
            crate::inc!(DERIVED_FRAMES_COUNT, &["dropped"]);
            return Err(PipelineError::NotEnoughData.temp());
        }

        // Add the frame to the channel. If this fails, return NotEnoughData and discard the frame.
        debug!(
            target: "channel_assembler",
            "Adding frame {} to channel {}",
            next_frame.number,
            hex::encode(channel.id())
        );
        if let Err(e) = channel.add_frame(next_frame, origin) {
            warn!(target: "channel_assembler", "Failed to add frame to channel {}: {e}", hex::encode(channel.id()));
            crate::inc!(DERIVED_FRAMES_COUNT, &["dropped"]);
            return Err(PipelineError::NotEnoughData.temp());
        }
        crate::set!(CURRENT_CHANNEL_FRAMES, channel.len() as i64);

        // If the channel is ready, forward the channel to the next stage.
        if channel.is_ready() {
            let channel_bytes =
                channel.frame_data().ok_or(PipelineError::ChannelProviderEmpty.crit())?;

            info!(
                target: "channel_assembler",
                "Channel {} ready with {} frames and {} bytes",
                hex::encode(channel.id()),
                channel.len(),
                channel_bytes.len()
            );
            self.channel = None;
            crate::set!(CURRENT_CHANNEL_FRAMES, 0);
            return Ok(Some(channel_bytes));
        }

        // The channel is not ready yet. Drop it if it grew past the RLP budget.
        let max_rlp_bytes = self.cfg.max_rlp_bytes_per_channel(origin.timestamp);
        if channel.size() as u64 > max_rlp_bytes {
            warn!(
                target: "channel_assembler",
                "Channel {} exceeded max size of {max_rlp_bytes} bytes, dropping",
                hex::encode(channel.id())
            );
            self.channel = None;
            crate::set!(CURRENT_CHANNEL_FRAMES, 0);
        }

        Err(PipelineError::NotEnoughData.temp())
    }
}

#[async_trait]
impl<P> OriginAdvancer for ChannelAssembler<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

impl<P> OriginProvider for ChannelAssembler<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> SignalReceiver for ChannelAssembler<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        if signal.is_reset_like() {
            self.channel = None;
            crate::set!(CURRENT_CHANNEL_FRAMES, 0);
        }
        Ok(())
    }
}
