//! The span batch prefix.

use super::{SpanBatchError, SpanDecodingError};
use alloy_primitives::FixedBytes;

/// The fixed fields heading a span batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanBatchPrefix {
    /// Relative timestamp of the first block: `first_timestamp - genesis_l2_time`.
    pub rel_timestamp: u64,
    /// L1 origin number of the last block of the span.
    pub l1_origin_num: u64,
    /// First 20 bytes of the parent hash of the first block.
    pub parent_check: FixedBytes<20>,
    /// First 20 bytes of the L1 origin hash of the last block.
    pub l1_origin_check: FixedBytes<20>,
}

impl SpanBatchPrefix {
    /// Decodes a [SpanBatchPrefix] from a reader.
    pub fn decode_prefix(r: &mut &[u8]) -> Result<Self, SpanBatchError> {
        let rel_timestamp = Self::decode_uvarint(r, SpanDecodingError::RelativeTimestamp)?;
        let l1_origin_num = Self::decode_uvarint(r, SpanDecodingError::L1OriginNumber)?;
        let parent_check = Self::decode_check(r, SpanDecodingError::ParentCheck)?;
        let l1_origin_check = Self::decode_check(r, SpanDecodingError::L1OriginCheck)?;
        Ok(Self { rel_timestamp, l1_origin_num, parent_check, l1_origin_check })
    }

    /// Encodes the [SpanBatchPrefix] into a writer.
    pub fn encode_prefix(&self, w: &mut Vec<u8>) {
        let mut buf = [0u8; 10];
        w.extend_from_slice(unsigned_varint::encode::u64(self.rel_timestamp, &mut buf));
        w.extend_from_slice(unsigned_varint::encode::u64(self.l1_origin_num, &mut buf));
        w.extend_from_slice(self.parent_check.as_slice());
        w.extend_from_slice(self.l1_origin_check.as_slice());
    }

    fn decode_uvarint(r: &mut &[u8], err: SpanDecodingError) -> Result<u64, SpanBatchError> {
        let (value, remaining) = unsigned_varint::decode::u64(r).map_err(|_| err)?;
        *r = remaining;
        Ok(value)
    }

    fn decode_check(
        r: &mut &[u8],
        err: SpanDecodingError,
    ) -> Result<FixedBytes<20>, SpanBatchError> {
        if r.len() < 20 {
            return Err(err.into());
        }
        let (check, rest) = r.split_at(20);
        *r = rest;
        Ok(FixedBytes::from_slice(check))
    }
}
