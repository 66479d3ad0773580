//! Streams [Batch]es out of a compressed channel body.

use super::Batch;
use crate::{
    errors::ChannelDecompressionError,
    params::{CHANNEL_VERSION_BROTLI, ZLIB_DEFLATE_COMPRESSION_METHOD, ZLIB_RESERVED_COMPRESSION_METHOD},
    types::RollupConfig,
};
use alloy_primitives::Bytes;
use alloy_rlp::Decodable;
use miniz_oxide::inflate::{decompress_to_vec_zlib_with_limit, TINFLStatus};
use std::io::Read;
use tracing::{debug, warn};

/// Decompresses a channel body, reading at most `max_bytes` of output.
///
/// The first byte selects the codec: a zlib header (compression method 8) or the brotli version
/// byte. Output beyond `max_bytes` is cut off; the batches it contained are lost.
pub fn decompress_channel(
    data: &[u8],
    max_bytes: usize,
    brotli_allowed: bool,
) -> Result<Vec<u8>, ChannelDecompressionError> {
    let Some(&first) = data.first() else {
        return Err(ChannelDecompressionError::Empty);
    };

    let method = first & 0x0F;
    if method == ZLIB_DEFLATE_COMPRESSION_METHOD || method == ZLIB_RESERVED_COMPRESSION_METHOD {
        return match decompress_to_vec_zlib_with_limit(data, max_bytes) {
            Ok(out) => Ok(out),
            Err(e) if e.status == TINFLStatus::HasMoreOutput => {
                debug!(target: "batch_reader", "channel body exceeds the RLP budget, truncating");
                Ok(e.output)
            }
            // A truncated or corrupt stream still yields the batches inflated before the fault.
            Err(e) if !e.output.is_empty() => {
                debug!(target: "batch_reader", "channel body is corrupt ({:?}), reading what was inflated", e.status);
                Ok(e.output)
            }
            Err(e) => Err(ChannelDecompressionError::Zlib(format!("{:?}", e.status))),
        };
    }

    if first == CHANNEL_VERSION_BROTLI {
        if !brotli_allowed {
            return Err(ChannelDecompressionError::BrotliBeforeFjord);
        }
        let mut out = Vec::new();
        let decoder = brotli::Decompressor::new(&data[1..], 4096);
        return match decoder.take(max_bytes as u64).read_to_end(&mut out) {
            Ok(_) => Ok(out),
            Err(_) if !out.is_empty() => Ok(out),
            Err(e) => Err(ChannelDecompressionError::Brotli(e.to_string())),
        };
    }

    Err(ChannelDecompressionError::UnsupportedVersion(first))
}

/// Batch Reader provides a function that iteratively consumes batches from the reader.
/// The L1Inclusion block is also provided at creation time.
/// Warning: the batch reader can read every batch-type.
/// The caller of the batch-reader should filter the results.
#[derive(Debug)]
pub struct BatchReader {
    /// The raw data to decode.
    data: Option<Vec<u8>>,
    /// Decompressed data.
    decompressed: Vec<u8>,
    /// The current cursor in the `decompressed` data.
    cursor: usize,
    /// The maximum RLP bytes per channel.
    max_rlp_bytes_per_channel: usize,
    /// Whether brotli channels may be read.
    brotli_allowed: bool,
}

impl BatchReader {
    /// Creates a new [BatchReader] from the compressed channel body.
    pub fn new<T>(data: T, max_rlp_bytes_per_channel: usize, brotli_allowed: bool) -> Self
    where
        T: Into<Vec<u8>>,
    {
        Self {
            data: Some(data.into()),
            decompressed: Vec::new(),
            cursor: 0,
            max_rlp_bytes_per_channel,
            brotli_allowed,
        }
    }

    /// Pulls out the next batch from the reader.
    ///
    /// Returns `None` once the channel is exhausted or on the first malformed batch; either way the
    /// rest of the channel is unusable.
    pub fn next_batch(&mut self, cfg: &RollupConfig) -> Option<Batch> {
        if let Some(data) = self.data.take() {
            match decompress_channel(&data, self.max_rlp_bytes_per_channel, self.brotli_allowed) {
                Ok(decompressed) => self.decompressed = decompressed,
                Err(e) => {
                    warn!(target: "batch_reader", "failed to decompress channel: {e}");
                    return None;
                }
            }
        }

        let mut reader = self.decompressed.get(self.cursor..)?;
        if reader.is_empty() {
            return None;
        }
        let remaining = reader.len();
        let bytes = match Bytes::decode(&mut reader) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(target: "batch_reader", "failed to decode batch RLP string: {e}");
                self.cursor = self.decompressed.len();
                return None;
            }
        };
        self.cursor += remaining - reader.len();

        match Batch::decode(&mut bytes.as_ref(), cfg) {
            Ok(batch) => Some(batch),
            Err(e) => {
                warn!(target: "batch_reader", "failed to decode batch: {e}");
                self.cursor = self.decompressed.len();
                None
            }
        }
    }

    /// Returns true if every batch of the channel has been read.
    pub fn is_exhausted(&self) -> bool {
        self.data.is_none() && self.cursor >= self.decompressed.len()
    }
}
