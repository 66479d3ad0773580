//! This module contains the [ChannelBank] stage.

use super::{ChannelReaderProvider, NextFrameProvider};
use crate::{
    errors::PipelineError,
    params::MAX_CHANNEL_BANK_SIZE,
    traits::{OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, Channel, ChannelId, Frame, PipelineResult, RollupConfig, Signal},
};
use alloy_primitives::{hex, Bytes};
use async_trait::async_trait;
use hashbrown::HashMap;
use std::{collections::VecDeque, fmt::Debug, sync::Arc};
use tracing::{debug, trace, warn};

/// [ChannelBank] is a stateful stage that does the following:
/// 1. Unmarshalls frames from L1 transaction data
/// 2. Applies those frames to a channel
/// 3. Attempts to read from the channel when it is ready
/// 4. Prunes channels (not frames) when the channel bank is too large.
///
/// Note: we prune before we ingest data.
/// As we switch between ingesting data & reading, the prune step occurs at an odd point
/// Specifically, the channel bank is not allowed to become too large between successive calls
/// to `IngestData`. This means that we can do an ingest and then do a read while becoming too
/// large. [ChannelBank] buffers channel frames, and emits full channel data
#[derive(Debug)]
pub struct ChannelBank<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    /// The rollup configuration.
    pub(crate) cfg: Arc<RollupConfig>,
    /// Map of channels by ID.
    pub(crate) channels: HashMap<ChannelId, Channel>,
    /// Channels in FIFO order.
    pub(crate) channel_queue: VecDeque<ChannelId>,
    /// The previous stage of the derivation pipeline.
    pub prev: P,
}

impl<P> ChannelBank<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    /// Create a new [ChannelBank] stage.
    pub fn new(cfg: Arc<RollupConfig>, prev: P) -> Self {
        Self { cfg, channels: HashMap::new(), channel_queue: VecDeque::new(), prev }
    }

    /// Returns the size of the channel bank by accumulating over all channels.
    pub fn size(&self) -> usize {
        self.channels.iter().fold(0, |acc, (_, c)| acc + c.size())
    }

    /// Prunes the Channel bank, until it is below [MAX_CHANNEL_BANK_SIZE].
    /// Prunes from the high-priority channel since it failed to be read.
    pub fn prune(&mut self) -> PipelineResult<()> {
        let mut total_size = self.size();
        while total_size > MAX_CHANNEL_BANK_SIZE {
            let id =
                self.channel_queue.pop_front().ok_or(PipelineError::ChannelProviderEmpty.crit())?;
            let channel = self.channels.remove(&id).ok_or(PipelineError::ChannelProviderEmpty.crit())?;
            warn!(target: "channel_bank", "Evicted channel {} of size {}", hex::encode(id), channel.size());
            total_size -= channel.size();
        }
        crate::set!(CHANNEL_BANK_SIZE, total_size as i64);
        Ok(())
    }

    /// Returns true if the channel opened at `open_block_number` has timed out at `origin`.
    fn is_timed_out(&self, open_block_number: u64, origin: &BlockInfo) -> bool {
        open_block_number + self.cfg.channel_timeout(origin.timestamp) < origin.number
    }

    /// Adds new L1 data to the channel bank. Should only be called after all data has been read.
    pub fn ingest_frame(&mut self, frame: Frame) -> PipelineResult<()> {
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;

        // Get the channel for the frame, or create a new one if it doesn't exist.
        if !self.channels.contains_key(&frame.id) {
            debug!(target: "channel_bank", "Opened channel {} at L1 block {}", hex::encode(frame.id), origin.number);
            self.channels.insert(frame.id, Channel::new(frame.id, origin));
            self.channel_queue.push_back(frame.id);
        }
        let open_block_number = self
            .channels
            .get(&frame.id)
            .map(|c| c.open_block_number())
            .ok_or(PipelineError::ChannelProviderEmpty.crit())?;

        // Check if the channel is not timed out. If it has, ignore the frame.
        if self.is_timed_out(open_block_number, &origin) {
            warn!(target: "channel_bank", "Channel {} timed out, ignoring frame {}", hex::encode(frame.id), frame.number);
            crate::inc!(DERIVED_FRAMES_COUNT, &["timed_out"]);
            return Ok(());
        }

        // Ingest the frame. If it fails, ignore the frame.
        let frame_id = frame.id;
        let frame_number = frame.number;
        if let Some(channel) = self.channels.get_mut(&frame_id) {
            if let Err(e) = channel.add_frame(frame, origin) {
                warn!(target: "channel_bank", "Dropping frame {frame_number} of channel {}: {e}", hex::encode(frame_id));
                crate::inc!(DERIVED_FRAMES_COUNT, &["dropped"]);
                return Ok(());
            }
            trace!(target: "channel_bank", "Ingested frame {frame_number} of channel {}", hex::encode(frame_id));
        }

        // Prune the channel bank if it is too large.
        self.prune()
    }

    /// Read the raw data of the first channel, if it's timed-out or closed.
    ///
    /// Returns an error if there is nothing new to read.
    pub fn read(&mut self) -> PipelineResult<Option<Bytes>> {
        // Bail if there are no channels to read from.
        let Some(first) = self.channel_queue.front().copied() else {
            trace!(target: "channel_bank", "No channels to read from");
            return Err(PipelineError::Eof.temp());
        };

        // Return an `Ok(None)` if the first channel is timed out. There may be more timed
        // out channels at the head of the queue and we want to remove them all.
        let channel = self.channels.get(&first).ok_or(PipelineError::ChannelProviderEmpty.crit())?;
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;
        if self.is_timed_out(channel.open_block_number(), &origin) {
            warn!(
                target: "channel_bank",
                "Channel {} timed out at L1 origin {}, open block {}",
                hex::encode(first),
                origin.number,
                channel.open_block_number()
            );
            crate::observe!(CHANNEL_TIMEOUTS, (origin.number - channel.open_block_number()) as f64);
            self.channels.remove(&first);
            self.channel_queue.pop_front();
            return Ok(None);
        }

        // At this point we have removed all timed out channels from the front of the
        // `channel_queue`. Pre-Canyon we simply check the first index.
        // Post-Canyon we read the entire channelQueue for the first ready channel.
        // If no channel is available, we return `PipelineError::Eof`.
        // Canyon is activated when the first L1 block whose time >= CanyonTime, not on the L2
        // timestamp.
        if !self.cfg.is_canyon_active(origin.timestamp) {
            return self.try_read_channel_at_index(0).map(Some);
        }

        let channel_data =
            (0..self.channel_queue.len()).find_map(|i| self.try_read_channel_at_index(i).ok());
        channel_data.map_or_else(|| Err(PipelineError::Eof.temp()), |data| Ok(Some(data)))
    }

    /// Attempts to read the channel at the specified index. If the channel is not ready or timed
    /// out, it will return an error.
    /// If the channel read was successful, it will remove the channel from the channel queue.
    pub fn try_read_channel_at_index(&mut self, index: usize) -> PipelineResult<Bytes> {
        let channel_id = *self.channel_queue.get(index).ok_or(PipelineError::Eof.temp())?;
        let channel =
            self.channels.get(&channel_id).ok_or(PipelineError::ChannelProviderEmpty.crit())?;
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;

        if self.is_timed_out(channel.open_block_number(), &origin) || !channel.is_ready() {
            return Err(PipelineError::Eof.temp());
        }

        let frame_data = channel.frame_data();
        debug!(
            target: "channel_bank",
            "Read channel {} with {} frames",
            hex::encode(channel_id),
            channel.len()
        );
        self.channels.remove(&channel_id);
        self.channel_queue.remove(index);
        crate::set!(CHANNEL_BANK_SIZE, self.size() as i64);

        frame_data.ok_or(PipelineError::ChannelProviderEmpty.crit())
    }
}

#[async_trait]
impl<P> OriginAdvancer for ChannelBank<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

#[async_trait]
impl<P> ChannelReaderProvider for ChannelBank<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn next_data(&mut self) -> PipelineResult<Option<Bytes>> {
        match self.read() {
            Err(e) => {
                if !e.is_eof() {
                    return Err(e);
                }
            }
            data => return data,
        };

        // Load the data into the channel bank
        let frame = self.prev.next_frame().await?;
        self.ingest_frame(frame)?;
        Err(PipelineError::NotEnoughData.temp())
    }
}

impl<P> OriginProvider for ChannelBank<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> SignalReceiver for ChannelBank<P>
where
    P: NextFrameProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        if signal.is_reset_like() {
            self.channels.clear();
            self.channel_queue = VecDeque::with_capacity(10);
            crate::set!(CHANNEL_BANK_SIZE, 0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        frame, frames,
        test_utils::{CollectingLayer, TestNextFrameProvider, TraceStorage},
        types::ResetSignal,
    };
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_try_read_channel_at_index_missing_channel() {
        let mock = TestNextFrameProvider::new(vec![]);
        let mut channel_bank = ChannelBank::new(Arc::new(RollupConfig::default()), mock);
        channel_bank.channel_queue.push_back([0xFF; 16]);
        let err = channel_bank.try_read_channel_at_index(0).unwrap_err();
        assert_eq!(err, PipelineError::ChannelProviderEmpty.crit());
    }

    #[test]
    fn test_try_read_channel_at_index_timed_out() {
        let mut mock = TestNextFrameProvider::new(vec![]);
        mock.block_info = Some(BlockInfo { number: 10, ..Default::default() });
        let mut channel_bank = ChannelBank::new(Arc::new(RollupConfig::default()), mock);
        let id: ChannelId = [0xFF; 16];
        channel_bank.channel_queue.push_back(id);
        channel_bank.channels.insert(id, Channel::new(id, BlockInfo::default()));
        let err = channel_bank.try_read_channel_at_index(0).unwrap_err();
        assert!(err.is_eof());
    }

    #[test]
    fn test_try_read_channel_at_index() {
        let mock = TestNextFrameProvider::new(vec![]);
        let cfg = RollupConfig { channel_timeout: 10, ..Default::default() };
        let mut channel_bank = ChannelBank::new(Arc::new(cfg), mock);
        let id: ChannelId = [0xFF; 16];
        channel_bank.channel_queue.push_back(id);
        let mut channel = Channel::new(id, BlockInfo::default());
        for frame in frames!(0xFF, 0, vec![0xDD; 50], 1) {
            channel.add_frame(frame, BlockInfo::default()).unwrap();
        }
        channel_bank.channels.insert(id, channel);
        let frame_data = channel_bank.try_read_channel_at_index(0).unwrap();
        assert_eq!(frame_data, Bytes::from(vec![0xDD; 50]));
        assert!(channel_bank.channels.is_empty());
        assert!(channel_bank.channel_queue.is_empty());
    }

    #[test]
    fn test_read_empty_channel_bank() {
        let mock = TestNextFrameProvider::new(vec![]);
        let mut channel_bank = ChannelBank::new(Arc::new(RollupConfig::default()), mock);
        let err = channel_bank.read().unwrap_err();
        assert!(err.is_eof());
    }

    #[test]
    fn test_read_drops_timed_out_head() {
        let mut mock = TestNextFrameProvider::new(vec![]);
        mock.block_info = Some(BlockInfo { number: 10, ..Default::default() });
        let cfg = RollupConfig { channel_timeout: 5, ..Default::default() };
        let mut channel_bank = ChannelBank::new(Arc::new(cfg), mock);
        let id: ChannelId = [0xFF; 16];
        channel_bank.channel_queue.push_back(id);
        channel_bank.channels.insert(id, Channel::new(id, BlockInfo::default()));
        assert_eq!(channel_bank.read().unwrap(), None);
        assert!(channel_bank.channels.is_empty());
        assert!(channel_bank.read().unwrap_err().is_eof());
    }

    #[test]
    fn test_ingest_empty_origin() {
        let mut mock = TestNextFrameProvider::new(vec![]);
        mock.block_info = None;
        let mut channel_bank = ChannelBank::new(Arc::new(RollupConfig::default()), mock);
        let frame = Frame::default();
        let err = channel_bank.ingest_frame(frame).unwrap_err();
        assert_eq!(err, PipelineError::MissingOrigin.crit());
    }

    #[test]
    fn test_ingest_invalid_frame() {
        let trace_store: TraceStorage = Default::default();
        let layer = CollectingLayer::new(trace_store.clone());
        let subscriber = tracing_subscriber::Registry::default().with(layer);
        let _guard = tracing::subscriber::set_default(subscriber);

        let mock = TestNextFrameProvider::new(vec![]);
        let mut channel_bank = ChannelBank::new(Arc::new(RollupConfig::default()), mock);
        let frame = Frame { id: [0xEE; 16], number: 0, data: vec![0xDD; 50], is_last: true };
        channel_bank.ingest_frame(frame.clone()).unwrap();
        assert_eq!(channel_bank.size(), crate::params::FRAME_OVERHEAD + 50);
        assert_eq!(channel_bank.channels.len(), 1);
        // This should fail since the frame is already ingested.
        channel_bank.ingest_frame(frame).unwrap();
        assert_eq!(channel_bank.size(), crate::params::FRAME_OVERHEAD + 50);
        assert_eq!(channel_bank.channels.len(), 1);

        let logs = trace_store.get_by_level(Level::WARN);
        assert_eq!(logs.len(), 1);
        assert!(logs[0].contains("Dropping frame 0"));
    }

    #[test]
    fn test_ingest_timed_out_channel_ignores_frames() {
        let mock = TestNextFrameProvider::new(vec![]);
        let cfg = RollupConfig { channel_timeout: 2, ..Default::default() };
        let mut channel_bank = ChannelBank::new(Arc::new(cfg), mock);
        channel_bank.ingest_frame(frame!(0xAA, 0, vec![0xDD; 10], false)).unwrap();
        channel_bank.prev.block_info = Some(BlockInfo { number: 5, ..Default::default() });
        channel_bank.ingest_frame(frame!(0xAA, 1, vec![0xDD; 10], true)).unwrap();
        let channel = channel_bank.channels.get(&[0xAA; 16]).unwrap();
        assert_eq!(channel.len(), 1);
        assert!(!channel.is_ready());
    }

    #[test]
    fn test_channel_bank_prunes_oldest() {
        let mock = TestNextFrameProvider::new(vec![]);
        let mut channel_bank = ChannelBank::new(Arc::new(RollupConfig::default()), mock);
        let half = MAX_CHANNEL_BANK_SIZE / 2;
        channel_bank.ingest_frame(frame!(0x01, 0, vec![0xDD; half], false)).unwrap();
        channel_bank.ingest_frame(frame!(0x02, 0, vec![0xDD; half], false)).unwrap();
        assert_eq!(channel_bank.channels.len(), 1);
        assert_eq!(channel_bank.channel_queue, VecDeque::from([[0x02; 16]]));
        assert!(channel_bank.size() <= MAX_CHANNEL_BANK_SIZE);
    }

    #[tokio::test]
    async fn test_channel_bank_out_of_order_frames_canyon() {
        // Frames are popped from the back of the mock.
        let mut frames = vec![
            Ok(frame!(0x0A, 1, vec![0x01], false)),
            Ok(frame!(0x0B, 0, vec![0x02], true)),
            Ok(frame!(0x0A, 0, vec![0x03], false)),
            Ok(frame!(0x0A, 2, vec![0x04], true)),
        ];
        frames.reverse();
        let mock = TestNextFrameProvider::new(frames);
        let cfg = RollupConfig { canyon_time: Some(0), ..Default::default() };
        let mut channel_bank = ChannelBank::new(Arc::new(cfg), mock);

        let mut emitted = Vec::new();
        loop {
            match channel_bank.next_data().await {
                Ok(Some(data)) => emitted.push(data),
                Ok(None) => {}
                Err(e) if e.is_not_enough_data() => {}
                Err(e) => {
                    assert!(e.is_eof());
                    break;
                }
            }
        }
        assert_eq!(emitted, vec![Bytes::from(vec![0x02]), Bytes::from(vec![0x03, 0x01, 0x04])]);
    }

    #[tokio::test]
    async fn test_channel_bank_pre_canyon_blocks_on_head() {
        let mut frames = vec![
            Ok(frame!(0x0A, 0, vec![0x01], false)),
            Ok(frame!(0x0B, 0, vec![0x02], true)),
        ];
        frames.reverse();
        let mock = TestNextFrameProvider::new(frames);
        let mut channel_bank = ChannelBank::new(Arc::new(RollupConfig::default()), mock);
        assert!(channel_bank.next_data().await.unwrap_err().is_not_enough_data());
        assert!(channel_bank.next_data().await.unwrap_err().is_not_enough_data());
        // Channel B is ready, but channel A blocks the head of the queue before Canyon.
        assert!(channel_bank.next_data().await.unwrap_err().is_eof());
        assert_eq!(channel_bank.channel_queue.len(), 2);
    }

    #[tokio::test]
    async fn test_channel_bank_reset() {
        let mock = TestNextFrameProvider::new(vec![]);
        let mut channel_bank = ChannelBank::new(Arc::new(RollupConfig::default()), mock);
        channel_bank.ingest_frame(frame!(0x0A, 0, vec![0x01], false)).unwrap();
        channel_bank.signal(ResetSignal::default().signal()).await.unwrap();
        assert!(channel_bank.channels.is_empty());
        assert!(channel_bank.channel_queue.is_empty());
        assert!(channel_bank.prev.reset);
    }

    #[tokio::test]
    async fn test_channel_bank_flush_keeps_channels() {
        let mock = TestNextFrameProvider::new(vec![]);
        let mut channel_bank = ChannelBank::new(Arc::new(RollupConfig::default()), mock);
        channel_bank.ingest_frame(frame!(0x0A, 0, vec![0x01], false)).unwrap();
        channel_bank.signal(Signal::FlushChannel).await.unwrap();
        assert_eq!(channel_bank.channels.len(), 1);
    }
}
