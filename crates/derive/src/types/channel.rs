//! This module contains the [Channel] struct.

use super::{BlockInfo, ChannelId, Frame};
use alloy_primitives::Bytes;
use hashbrown::HashMap;

/// An error adding a [Frame] to a [Channel].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The frame id does not match the channel id.
    #[error("Frame id does not match channel id")]
    FrameIdMismatch,
    /// The channel already received its closing frame.
    #[error("Channel is closed")]
    ChannelClosed,
    /// A frame with the same number is already buffered.
    #[error("Frame number {0} already exists")]
    FrameNumberExists(u16),
    /// The frame number is past the closing frame.
    #[error("Frame number {0} is beyond end frame {1}")]
    FrameBeyondEndFrame(u16, u16),
}

/// A Channel is a set of batches that are split into at least one, but possibly multiple frames.
/// Frames are allowed to be ingested out of order.
/// Each frame is ingested one by one. Once a frame with `closed` is added to the channel, the
/// channel may mark itself as ready for reading once all intervening frames have been added
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channel {
    /// The unique identifier for this channel
    id: ChannelId,
    /// The block that the channel is currently open at
    open_block: BlockInfo,
    /// Estimated memory size, used to drop the channel if we have too much data
    estimated_size: usize,
    /// True if the last frame has been buffered
    closed: bool,
    /// The highest frame number that has been ingested
    highest_frame_number: u16,
    /// The frame number of the frame where `is_last` is true
    /// No other frame number may be higher than this
    last_frame_number: u16,
    /// Store a map of frame number to frame for constant time ordering
    inputs: HashMap<u16, Frame>,
    /// The highest L1 inclusion block that a frame was included in
    highest_l1_inclusion_block: BlockInfo,
}

impl Channel {
    /// Create a new [Channel] with the given [ChannelId] and [BlockInfo].
    pub fn new(id: ChannelId, open_block: BlockInfo) -> Self {
        Self { id, open_block, inputs: HashMap::new(), ..Default::default() }
    }

    /// Returns the current [ChannelId] for the channel.
    pub const fn id(&self) -> ChannelId {
        self.id
    }

    /// Returns the number of frames ingested.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Returns if the channel is empty.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Add a frame to the channel.
    ///
    /// ## Takes
    /// - `frame`: The frame to add to the channel
    /// - `l1_inclusion_block`: The block that the frame was included in
    ///
    /// ## Returns
    /// - `Ok(()):` If the frame was successfully buffered
    /// - `Err(_):` If the frame was invalid
    pub fn add_frame(
        &mut self,
        frame: Frame,
        l1_inclusion_block: BlockInfo,
    ) -> Result<(), ChannelError> {
        if frame.id != self.id {
            return Err(ChannelError::FrameIdMismatch);
        }
        if frame.is_last && self.closed {
            return Err(ChannelError::ChannelClosed);
        }
        if self.inputs.contains_key(&frame.number) {
            return Err(ChannelError::FrameNumberExists(frame.number));
        }
        if self.closed && frame.number >= self.last_frame_number {
            return Err(ChannelError::FrameBeyondEndFrame(frame.number, self.last_frame_number));
        }

        // Guaranteed to succeed at this point. Update the channel state.
        if frame.is_last {
            self.last_frame_number = frame.number;
            self.closed = true;

            // Prune frames with a higher number than the closing frame.
            if self.last_frame_number < self.highest_frame_number {
                let last = self.last_frame_number;
                let mut pruned = 0;
                self.inputs.retain(|number, f| {
                    let keep = *number < last;
                    if !keep {
                        pruned += f.size();
                    }
                    keep
                });
                self.estimated_size -= pruned;
                self.highest_frame_number = last;
            }
        }

        if frame.number > self.highest_frame_number {
            self.highest_frame_number = frame.number;
        }

        if self.highest_l1_inclusion_block.number < l1_inclusion_block.number {
            self.highest_l1_inclusion_block = l1_inclusion_block;
        }

        self.estimated_size += frame.size();
        self.inputs.insert(frame.number, frame);
        Ok(())
    }

    /// Returns the block number of the L1 block that contained the first [Frame] in this channel.
    pub const fn open_block_number(&self) -> u64 {
        self.open_block.number
    }

    /// Returns the highest L1 inclusion block of any buffered frame.
    pub const fn highest_l1_inclusion_block(&self) -> BlockInfo {
        self.highest_l1_inclusion_block
    }

    /// Returns the estimated size of the channel including [Frame] overhead.
    pub const fn size(&self) -> usize {
        self.estimated_size
    }

    /// Returns `true` if the closing frame has been buffered.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns `true` if the channel is ready to be read.
    pub fn is_ready(&self) -> bool {
        // Must have buffered the last frame before the channel is ready.
        if !self.closed {
            return false;
        }

        // Must have the possibility of contiguous frames.
        if self.inputs.len() != (self.last_frame_number as usize + 1) {
            return false;
        }

        // Check for contiguous frames.
        (0..=self.last_frame_number).all(|i| self.inputs.contains_key(&i))
    }

    /// Returns all of the channel's [Frame]s concatenated together.
    ///
    /// ## Returns
    ///
    /// - `Some(Bytes)`: The concatenated frame data
    /// - `None`: If the channel is missing frames
    pub fn frame_data(&self) -> Option<Bytes> {
        if !self.is_ready() {
            return None;
        }
        let mut data = Vec::with_capacity(self.size());
        (0..=self.last_frame_number).try_for_each(|i| {
            let frame = self.inputs.get(&i)?;
            data.extend_from_slice(&frame.data);
            Some(())
        })?;
        Some(data.into())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::FRAME_OVERHEAD;

    fn block(number: u64) -> BlockInfo {
        BlockInfo { number, ..Default::default() }
    }

    #[test]
    fn test_channel_out_of_order_frames() {
        let id = [0xEE; 16];
        let mut channel = Channel::new(id, block(1));

        channel.add_frame(Frame::new(id, 1, b"world".to_vec(), false), block(1)).unwrap();
        assert!(!channel.is_ready());
        channel.add_frame(Frame::new(id, 2, b"!".to_vec(), true), block(2)).unwrap();
        assert!(channel.is_closed());
        assert!(!channel.is_ready());
        channel.add_frame(Frame::new(id, 0, b"hello ".to_vec(), false), block(3)).unwrap();

        assert!(channel.is_ready());
        assert_eq!(channel.frame_data().unwrap().as_ref(), b"hello world!");
        assert_eq!(channel.highest_l1_inclusion_block().number, 3);
        assert_eq!(channel.size(), 12 + 3 * FRAME_OVERHEAD);
    }

    #[test]
    fn test_channel_rejects_invalid_frames() {
        let id = [0xEE; 16];
        let mut channel = Channel::new(id, block(1));

        assert_eq!(
            channel.add_frame(Frame::new([0xFF; 16], 0, vec![], false), block(1)),
            Err(ChannelError::FrameIdMismatch)
        );

        channel.add_frame(Frame::new(id, 0, vec![1], false), block(1)).unwrap();
        assert_eq!(
            channel.add_frame(Frame::new(id, 0, vec![1], false), block(1)),
            Err(ChannelError::FrameNumberExists(0))
        );

        channel.add_frame(Frame::new(id, 2, vec![3], true), block(1)).unwrap();
        assert_eq!(
            channel.add_frame(Frame::new(id, 3, vec![], true), block(1)),
            Err(ChannelError::ChannelClosed)
        );
        assert_eq!(
            channel.add_frame(Frame::new(id, 3, vec![], false), block(1)),
            Err(ChannelError::FrameBeyondEndFrame(3, 2))
        );
    }

    #[test]
    fn test_closing_frame_prunes_higher_frames() {
        let id = [0xEE; 16];
        let mut channel = Channel::new(id, block(1));

        channel.add_frame(Frame::new(id, 0, vec![0], false), block(1)).unwrap();
        channel.add_frame(Frame::new(id, 3, vec![3], false), block(1)).unwrap();
        channel.add_frame(Frame::new(id, 4, vec![4], false), block(1)).unwrap();
        assert_eq!(channel.len(), 3);

        channel.add_frame(Frame::new(id, 1, vec![1], true), block(1)).unwrap();
        assert_eq!(channel.len(), 2);
        assert!(channel.is_ready());
        assert_eq!(channel.size(), 2 * (1 + FRAME_OVERHEAD));
        assert_eq!(channel.frame_data().unwrap().as_ref(), &[0, 1]);
    }
}
