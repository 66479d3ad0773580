//! This module contains the [Frame] type used within the derivation pipeline.

use crate::params::{CHANNEL_ID_LENGTH, DERIVATION_VERSION_0, FRAME_OVERHEAD, MAX_FRAME_LEN};

/// A channel identifier.
pub type ChannelId = [u8; CHANNEL_ID_LENGTH];

/// Fixed part of an encoded frame: id, number, data length and the is_last flag.
const BASE_FRAME_LEN: usize = CHANNEL_ID_LENGTH + 2 + 4 + 1;

/// An error decoding frames out of a batcher payload.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameDecodingError {
    /// The payload is empty.
    #[error("No frames to parse")]
    NoFrames,
    /// The payload does not start with the supported derivation version.
    #[error("Unsupported derivation version {0}")]
    UnsupportedVersion(u8),
    /// The payload ended in the middle of a frame.
    #[error("Frame too short to decode")]
    Truncated,
    /// The frame data exceeds [MAX_FRAME_LEN].
    #[error("Frame data too large: {0}")]
    DataTooLarge(usize),
    /// The `is_last` byte is neither 0 nor 1.
    #[error("Invalid is_last byte {0}")]
    InvalidIsLast(u8),
}

/// A channel frame is a segment of a channel's data.
///
/// *Encoding*
/// frame = `channel_id ++ frame_number ++ frame_data_length ++ frame_data ++ is_last`
/// * channel_id        = bytes16
/// * frame_number      = uint16
/// * frame_data_length = uint32
/// * frame_data        = bytes
/// * is_last           = bool
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// The unique identifier for the frame.
    pub id: ChannelId,
    /// The number of the frame.
    pub number: u16,
    /// The data within the frame.
    pub data: Vec<u8>,
    /// Whether or not the frame is the last in the sequence.
    pub is_last: bool,
}

impl Frame {
    /// Creates a new [Frame].
    pub const fn new(id: ChannelId, number: u16, data: Vec<u8>, is_last: bool) -> Self {
        Self { id, number, data, is_last }
    }

    /// Encode the frame into a byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(BASE_FRAME_LEN + self.data.len());
        encoded.extend_from_slice(&self.id);
        encoded.extend_from_slice(&self.number.to_be_bytes());
        encoded.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        encoded.extend_from_slice(&self.data);
        encoded.push(self.is_last as u8);
        encoded
    }

    /// Decode a frame from a byte slice, returning the number of bytes consumed.
    pub fn decode(encoded: &[u8]) -> Result<(usize, Self), FrameDecodingError> {
        if encoded.len() < BASE_FRAME_LEN {
            return Err(FrameDecodingError::Truncated);
        }

        let mut id = [0u8; CHANNEL_ID_LENGTH];
        id.copy_from_slice(&encoded[..CHANNEL_ID_LENGTH]);
        let number = u16::from_be_bytes([encoded[16], encoded[17]]);
        let data_len =
            u32::from_be_bytes([encoded[18], encoded[19], encoded[20], encoded[21]]) as usize;

        if data_len > MAX_FRAME_LEN {
            return Err(FrameDecodingError::DataTooLarge(data_len));
        }
        if encoded.len() < BASE_FRAME_LEN + data_len {
            return Err(FrameDecodingError::Truncated);
        }

        let data = encoded[22..22 + data_len].to_vec();
        let is_last = match encoded[22 + data_len] {
            0 => false,
            1 => true,
            b => return Err(FrameDecodingError::InvalidIsLast(b)),
        };
        Ok((BASE_FRAME_LEN + data_len, Self { id, number, data, is_last }))
    }

    /// Parses the on chain serialization of frame(s) in an L1 transaction. Only version 0 of the
    /// serialization format is supported. All frames must be parsed without error, there must not
    /// be any left over data and there must be at least one frame.
    ///
    /// Frames are stored in L1 transactions with the following format:
    /// * `data = DerivationVersion0 ++ Frame(s)` Where there is one or more frames concatenated
    ///   together.
    pub fn parse_frames(encoded: &[u8]) -> Result<Vec<Self>, FrameDecodingError> {
        let (version, data) = encoded.split_first().ok_or(FrameDecodingError::NoFrames)?;
        if *version != DERIVATION_VERSION_0 {
            return Err(FrameDecodingError::UnsupportedVersion(*version));
        }

        let mut frames = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let (frame_length, frame) = Self::decode(&data[offset..])?;
            frames.push(frame);
            offset += frame_length;
        }

        if frames.is_empty() {
            return Err(FrameDecodingError::NoFrames);
        }

        Ok(frames)
    }

    /// Calculates the size of the frame + overhead for storing the frame. The sum of the frame size
    /// of each frame in a channel determines the channel's size. The sum of the channel sizes
    /// is used for pruning & compared against the max channel bank size.
    pub fn size(&self) -> usize {
        self.data.len() + FRAME_OVERHEAD
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_frame_roundtrip() {
        let frame = Frame { id: [0xFF; 16], number: 0xEE, data: vec![0xDD; 50], is_last: true };

        let (_, frame_decoded) = Frame::decode(&frame.encode()).unwrap();
        assert_eq!(frame, frame_decoded);
    }

    #[test]
    fn test_decode_many() {
        let frame = Frame { id: [0xFF; 16], number: 0xEE, data: vec![0xDD; 50], is_last: true };
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[DERIVATION_VERSION_0]);
        (0..5).for_each(|_| {
            bytes.extend_from_slice(&frame.encode());
        });

        let frames = Frame::parse_frames(bytes.as_slice()).unwrap();
        assert_eq!(frames.len(), 5);
        (0..5).for_each(|i| {
            assert_eq!(frames[i], frame);
        });
    }

    #[test]
    fn test_parse_frames_rejects_bad_payloads() {
        assert_eq!(Frame::parse_frames(&[]), Err(FrameDecodingError::NoFrames));
        assert_eq!(Frame::parse_frames(&[DERIVATION_VERSION_0]), Err(FrameDecodingError::NoFrames));
        assert_eq!(Frame::parse_frames(&[1, 2, 3]), Err(FrameDecodingError::UnsupportedVersion(1)));

        let frame = Frame { id: [0x01; 16], number: 1, data: vec![0xAA; 4], is_last: false };
        let mut bytes = vec![DERIVATION_VERSION_0];
        bytes.extend_from_slice(&frame.encode());
        // Trailing garbage that cannot form a frame.
        bytes.extend_from_slice(&[0xFF; 3]);
        assert_eq!(Frame::parse_frames(&bytes), Err(FrameDecodingError::Truncated));
    }

    #[test]
    fn test_decode_invalid_is_last() {
        let frame = Frame { id: [0x01; 16], number: 1, data: vec![0xAA; 4], is_last: true };
        let mut encoded = frame.encode();
        *encoded.last_mut().unwrap() = 2;
        assert_eq!(Frame::decode(&encoded), Err(FrameDecodingError::InvalidIsLast(2)));
    }

    #[test]
    fn test_decode_data_too_large() {
        let mut encoded = vec![0u8; BASE_FRAME_LEN];
        encoded[18..22].copy_from_slice(&((MAX_FRAME_LEN as u32) + 1).to_be_bytes());
        assert_eq!(
            Frame::decode(&encoded),
            Err(FrameDecodingError::DataTooLarge(MAX_FRAME_LEN + 1))
        );
    }

    #[test]
    fn test_decode_truncated_data() {
        let frame = Frame { id: [0x01; 16], number: 1, data: vec![0xAA; 40], is_last: true };
        let encoded = frame.encode();
        assert_eq!(Frame::decode(&encoded[..30]), Err(FrameDecodingError::Truncated));
    }

    fn arb_frame() -> impl Strategy<Value = Frame> {
        (any::<[u8; 16]>(), any::<u16>(), prop::collection::vec(any::<u8>(), 0..512), any::<bool>())
            .prop_map(|(id, number, data, is_last)| Frame { id, number, data, is_last })
    }

    proptest! {
        #[test]
        fn test_parse_serialized_frames(frames in prop::collection::vec(arb_frame(), 1..8)) {
            let mut payload = vec![DERIVATION_VERSION_0];
            frames.iter().for_each(|f| payload.extend_from_slice(&f.encode()));
            prop_assert_eq!(Frame::parse_frames(&payload).unwrap(), frames);
        }
    }
}
