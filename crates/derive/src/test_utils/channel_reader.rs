//! Test utilities for the [ChannelReader] stage.
//!
//! [ChannelReader]: crate::stages::ChannelReader

use super::signal_origin;
use crate::{
    batch::Batch,
    errors::PipelineError,
    params::CHANNEL_VERSION_BROTLI,
    stages::ChannelReaderProvider,
    traits::{OriginAdvancer, OriginProvider, SignalReceiver},
    types::{BlockInfo, PipelineResult, Signal},
};
use alloy_primitives::Bytes;
use alloy_rlp::Encodable;
use async_trait::async_trait;
use miniz_oxide::deflate::compress_to_vec_zlib;
use std::io::Write;

/// A mock [ChannelReaderProvider] for testing the [ChannelReader] stage.
///
/// [ChannelReader]: crate::stages::ChannelReader
#[derive(Debug, Default)]
pub struct TestChannelReaderProvider {
    /// The data to return.
    pub data: Vec<PipelineResult<Option<Bytes>>>,
    /// The origin block info
    pub block_info: Option<BlockInfo>,
    /// Tracks if the channel reader provider has been reset.
    pub reset: bool,
}

impl TestChannelReaderProvider {
    /// Creates a new [TestChannelReaderProvider] with the given data.
    pub fn new(data: Vec<PipelineResult<Option<Bytes>>>) -> Self {
        Self { data, block_info: Some(BlockInfo::default()), reset: false }
    }
}

impl OriginProvider for TestChannelReaderProvider {
    fn origin(&self) -> Option<BlockInfo> {
        self.block_info
    }
}

#[async_trait]
impl OriginAdvancer for TestChannelReaderProvider {
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ChannelReaderProvider for TestChannelReaderProvider {
    async fn next_data(&mut self) -> PipelineResult<Option<Bytes>> {
        self.data.pop().unwrap_or(Err(PipelineError::Eof.temp()))
    }
}

#[async_trait]
impl SignalReceiver for TestChannelReaderProvider {
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        if let Some(origin) = signal_origin(&signal) {
            self.block_info = Some(origin);
            self.reset = true;
        }
        Ok(())
    }
}

/// Returns the uncompressed channel body of the given batches: each batch RLP-wrapped as a byte
/// string.
pub fn channel_body(batches: &[Batch]) -> Vec<u8> {
    let mut body = Vec::new();
    for batch in batches {
        let mut encoded = Vec::new();
        batch.encode(&mut encoded).expect("batch encodes");
        Bytes::from(encoded).encode(&mut body);
    }
    body
}

/// Compresses the given batches into a zlib channel body.
pub fn compress_batches(batches: &[Batch]) -> Bytes {
    compress_to_vec_zlib(&channel_body(batches), 9).into()
}

/// Compresses the given batches into a brotli channel body, prefixed with its version byte.
pub fn brotli_compress_batches(batches: &[Batch]) -> Bytes {
    let mut out = vec![CHANNEL_VERSION_BROTLI];
    {
        let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 9, 22);
        writer.write_all(&channel_body(batches)).expect("brotli write");
    }
    out.into()
}
