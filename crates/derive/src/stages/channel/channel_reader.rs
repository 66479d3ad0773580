//! This module contains the `ChannelReader` struct.

use crate::{
    batch::{Batch, BatchReader},
    errors::PipelineError,
    stages::BatchStreamProvider,
    traits::{OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, PipelineResult, RollupConfig, Signal},
};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tracing::{debug, warn};

/// The [ChannelReader] provider trait.
#[async_trait]
pub trait ChannelReaderProvider {
    /// Pulls the next piece of data from the channel bank. Note that it attempts to pull data out
    /// of the channel bank prior to loading data in (unlike most other stages). This is to
    /// ensure maintain consistency around channel bank pruning which depends upon the order
    /// of operations.
    async fn next_data(&mut self) -> PipelineResult<Option<Bytes>>;
}

/// [ChannelReader] is a stateful stage that reads [Batch]es from `Channel`s.
///
/// The [ChannelReader] pulls `Channel`s from the channel bank as raw data
/// and pipes it into a `BatchReader`. Since the raw data is compressed,
/// the `BatchReader` first decompresses the data using the first bytes as
/// a compression algorithm identifier.
///
/// Once the data is decompressed, it is decoded into a `Batch` and passed
/// to the next stage in the pipeline.
#[derive(Debug)]
pub struct ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    /// The previous stage of the derivation pipeline.
    pub prev: P,
    /// The batch reader.
    pub(crate) next_batch: Option<BatchReader>,
    /// The rollup configuration.
    cfg: Arc<RollupConfig>,
}

impl<P> ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    /// Create a new [ChannelReader] stage.
    pub const fn new(prev: P, cfg: Arc<RollupConfig>) -> Self {
        Self { prev, next_batch: None, cfg }
    }

    /// Creates the batch reader from available channel data.
    async fn set_batch_reader(&mut self) -> PipelineResult<()> {
        if self.next_batch.is_none() {
            let channel =
                self.prev.next_data().await?.ok_or(PipelineError::ChannelReaderEmpty.temp())?;

            let origin = self.prev.origin().ok_or(PipelineError::MissingOrigin.crit())?;
            let max_rlp_bytes_per_channel = self.cfg.max_rlp_bytes_per_channel(origin.timestamp);
            let brotli_allowed = self.cfg.is_fjord_active(origin.timestamp);

            debug!(
                target: "channel_reader",
                "Loaded channel of {} bytes at L1 origin {}",
                channel.len(),
                origin.number
            );
            self.next_batch =
                Some(BatchReader::new(channel, max_rlp_bytes_per_channel as usize, brotli_allowed));
        }
        Ok(())
    }

    /// Forces the read to continue with the next channel, resetting any
    /// decoding / decompression state to a fresh start.
    pub fn next_channel(&mut self) {
        self.next_batch = None;
    }
}

#[async_trait]
impl<P> OriginAdvancer for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

#[async_trait]
impl<P> BatchStreamProvider for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send + Debug,
{
    /// Drops the channel being read. Called once a span batch of the channel is found invalid
    /// after Holocene.
    fn flush(&mut self) {
        debug!(target: "channel_reader", "Flushing channel");
        self.next_channel();
    }

    async fn next_batch(&mut self) -> PipelineResult<Batch> {
        if let Err(e) = self.set_batch_reader().await {
            debug!(target: "channel_reader", "Failed to set batch reader: {:?}", e);
            self.next_channel();
            return Err(e);
        }

        let cfg = self.cfg.clone();
        let next = self.next_batch.as_mut().and_then(|reader| reader.next_batch(cfg.as_ref()));
        match next {
            Some(batch) => Ok(batch),
            None => {
                // The channel is exhausted or malformed. Either way, move on.
                self.next_channel();
                crate::inc!(BATCH_READER_ERRORS, &["exhausted"]);
                Err(PipelineError::NotEnoughData.temp())
            }
        }
    }
}

impl<P> OriginProvider for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> SignalReceiver for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + SignalReceiver + Debug + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match signal {
            Signal::FlushChannel => {
                // Drop the current in-progress channel.
                warn!(target: "channel_reader", "Flushed channel");
                self.next_batch = None;
            }
            s => {
                self.prev.signal(s).await?;
                self.next_channel();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        batch::SingleBatch,
        errors::PipelineErrorKind,
        test_utils::{brotli_compress_batches, compress_batches, TestChannelReaderProvider},
        types::ResetSignal,
    };
    use alloy_primitives::B256;

    fn single_batches() -> Vec<Batch> {
        (0..3)
            .map(|i| {
                Batch::Single(SingleBatch {
                    parent_hash: B256::repeat_byte(i),
                    epoch_num: 1,
                    epoch_hash: B256::repeat_byte(0xEE),
                    timestamp: 10 + 2 * i as u64,
                    transactions: vec![Bytes::from(vec![0x02, i])],
                })
            })
            .collect()
    }

    fn new_compressed_batch_data() -> Bytes {
        compress_batches(&single_batches())
    }

    #[tokio::test]
    async fn test_flush_channel_reader() {
        let mock = TestChannelReaderProvider::new(vec![Ok(Some(new_compressed_batch_data()))]);
        let mut reader = ChannelReader::new(mock, Arc::new(RollupConfig::default()));
        reader.next_batch = Some(BatchReader::new(new_compressed_batch_data(), 10_000_000, false));
        reader.signal(Signal::FlushChannel).await.unwrap();
        assert!(reader.next_batch.is_none());
        assert!(!reader.prev.reset);
    }

    #[tokio::test]
    async fn test_reset_channel_reader() {
        let mock = TestChannelReaderProvider::new(vec![Ok(None)]);
        let mut reader = ChannelReader::new(mock, Arc::new(RollupConfig::default()));
        reader.next_batch = Some(BatchReader::new(vec![0x00, 0x01, 0x02], 10_000_000, false));
        assert!(!reader.prev.reset);
        reader.signal(ResetSignal::default().signal()).await.unwrap();
        assert!(reader.next_batch.is_none());
        assert!(reader.prev.reset);
    }

    #[tokio::test]
    async fn test_next_batch_batch_reader_set_fails() {
        let mock = TestChannelReaderProvider::new(vec![Err(PipelineError::Eof.temp())]);
        let mut reader = ChannelReader::new(mock, Arc::new(RollupConfig::default()));
        assert_eq!(reader.next_batch().await, Err(PipelineError::Eof.temp()));
        assert!(reader.next_batch.is_none());
    }

    #[tokio::test]
    async fn test_next_batch_batch_reader_no_data() {
        let mock = TestChannelReaderProvider::new(vec![Ok(None)]);
        let mut reader = ChannelReader::new(mock, Arc::new(RollupConfig::default()));
        assert!(matches!(
            reader.next_batch().await.unwrap_err(),
            PipelineErrorKind::Temporary(PipelineError::ChannelReaderEmpty)
        ));
        assert!(reader.next_batch.is_none());
    }

    #[tokio::test]
    async fn test_next_batch_unknown_channel_version() {
        let garbage = Bytes::from_static(&[0x02, 0x00, 0x00]);
        let mock = TestChannelReaderProvider::new(vec![Ok(Some(garbage))]);
        let mut reader = ChannelReader::new(mock, Arc::new(RollupConfig::default()));
        assert_eq!(reader.next_batch().await, Err(PipelineError::NotEnoughData.temp()));
        assert!(reader.next_batch.is_none());
    }

    #[tokio::test]
    async fn test_next_batch_reads_whole_channel() {
        let mock = TestChannelReaderProvider::new(vec![Ok(Some(new_compressed_batch_data()))]);
        let mut reader = ChannelReader::new(mock, Arc::new(RollupConfig::default()));
        for expected in single_batches() {
            assert_eq!(reader.next_batch().await.unwrap(), expected);
            assert!(reader.next_batch.is_some());
        }
        // The channel is exhausted and dropped.
        assert_eq!(reader.next_batch().await, Err(PipelineError::NotEnoughData.temp()));
        assert!(reader.next_batch.is_none());
        assert!(reader.next_batch().await.unwrap_err().is_eof());
    }

    #[tokio::test]
    async fn test_brotli_channel_requires_fjord() {
        let raw = brotli_compress_batches(&single_batches());
        let mock = TestChannelReaderProvider::new(vec![Ok(Some(raw))]);
        let mut reader = ChannelReader::new(mock, Arc::new(RollupConfig::default()));
        assert_eq!(reader.next_batch().await, Err(PipelineError::NotEnoughData.temp()));
        assert!(reader.next_batch.is_none());
    }

    #[tokio::test]
    async fn test_brotli_channel_post_fjord() {
        let raw = brotli_compress_batches(&single_batches());
        let mock = TestChannelReaderProvider::new(vec![Ok(Some(raw))]);
        let cfg = RollupConfig { fjord_time: Some(0), ..Default::default() };
        let mut reader = ChannelReader::new(mock, Arc::new(cfg));
        assert_eq!(reader.next_batch().await.unwrap(), single_batches()[0]);
    }

    #[tokio::test]
    async fn test_flush_post_holocene() {
        let raw = new_compressed_batch_data();
        let config = Arc::new(RollupConfig { holocene_time: Some(0), ..RollupConfig::default() });
        let mock = TestChannelReaderProvider::new(vec![Ok(Some(raw))]);
        let mut reader = ChannelReader::new(mock, config);
        let res = reader.next_batch().await.unwrap();
        assert!(matches!(res, Batch::Single(_)));
        assert!(reader.next_batch.is_some());
        reader.flush();
        assert!(reader.next_batch.is_none());
    }
}
