//! EIP4844 Blob Type

use crate::errors::BlobDecodingError;
use alloy_eips::eip4844::{Blob, BYTES_PER_BLOB, VERSIONED_HASH_VERSION_KZG};
use alloy_primitives::{Bytes, FixedBytes, B256};
use sha2::{Digest, Sha256};

/// The blob encoding version
pub const BLOB_ENCODING_VERSION: u8 = 0;

/// Maximum blob data size
pub const BLOB_MAX_DATA_SIZE: usize = (4 * 31 + 3) * 1024 - 4; // 130044

/// Blob Encoding/Decoding Rounds
pub const BLOB_ENCODING_ROUNDS: usize = 1024;

/// A Blob hash
#[derive(Default, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexedBlobHash {
    /// The index of the blob
    pub index: usize,
    /// The hash of the blob
    pub hash: B256,
}

/// A blob sidecar as served by the beacon node, reduced to the fields derivation needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobSidecar {
    /// The index of the blob within the block.
    pub index: u64,
    /// The blob.
    pub blob: Box<Blob>,
    /// The KZG commitment of the blob.
    pub kzg_commitment: FixedBytes<48>,
    /// The KZG proof of the blob.
    pub kzg_proof: FixedBytes<48>,
}

impl BlobSidecar {
    /// Returns the versioned hash of the sidecar's commitment: `0x01 || sha256(commitment)[1..]`.
    pub fn versioned_hash(&self) -> B256 {
        let mut hash: [u8; 32] = Sha256::digest(self.kzg_commitment.as_slice()).into();
        hash[0] = VERSIONED_HASH_VERSION_KZG;
        B256::from(hash)
    }

    /// Returns true if the sidecar's commitment hashes to the given versioned hash.
    pub fn verify_versioned_hash(&self, expected: &B256) -> bool {
        self.versioned_hash() == *expected
    }
}

/// The Blob Data
#[derive(Default, Clone, Debug)]
pub struct BlobData {
    /// The blob data
    pub data: Option<Bytes>,
    /// The calldata
    pub calldata: Option<Bytes>,
}

impl BlobData {
    /// Decodes the blob into raw byte data.
    /// Returns a [BlobDecodingError] if the blob is invalid.
    pub fn decode(&self) -> Result<Bytes, BlobDecodingError> {
        let data = self.data.as_ref().ok_or(BlobDecodingError::MissingData)?;
        if data.len() != BYTES_PER_BLOB {
            return Err(BlobDecodingError::InvalidLength);
        }

        // Validate the blob encoding version
        if data[VERSIONED_HASH_VERSION_KZG as usize] != BLOB_ENCODING_VERSION {
            return Err(BlobDecodingError::InvalidEncodingVersion);
        }

        // Decode the 3 byte big endian length value into a 4 byte integer
        let length = u32::from_be_bytes([0, data[2], data[3], data[4]]) as usize;

        if length > BLOB_MAX_DATA_SIZE {
            return Err(BlobDecodingError::InvalidLength);
        }

        // Round 0 copies the remaining 27 bytes of the first field element
        let mut output = vec![0u8; BLOB_MAX_DATA_SIZE];
        output[0..27].copy_from_slice(&data[5..32]);

        // Process the remaining 3 field elements to complete round 0
        let mut output_pos = 28;
        let mut input_pos = 32;
        let mut encoded_byte = [0u8; 4];
        encoded_byte[0] = data[0];

        for b in encoded_byte.iter_mut().skip(1) {
            let (enc, opos, ipos) = Self::decode_field_element(data, output_pos, input_pos, &mut output)?;
            *b = enc;
            output_pos = opos;
            input_pos = ipos;
        }

        // Reassemble the 4 by 6 bit encoded chunks into 3 bytes of output
        output_pos = Self::reassemble_bytes(output_pos, &encoded_byte, &mut output);

        // In each remaining round, decode 4 field elements (128 bytes) of the
        // input into 127 bytes of output
        for _ in 1..BLOB_ENCODING_ROUNDS {
            if output_pos >= length {
                break;
            }

            for d in &mut encoded_byte {
                let (enc, opos, ipos) =
                    Self::decode_field_element(data, output_pos, input_pos, &mut output)?;
                *d = enc;
                output_pos = opos;
                input_pos = ipos;
            }
            output_pos = Self::reassemble_bytes(output_pos, &encoded_byte, &mut output);
        }

        // Bytes past the declared length must be zero.
        if output.iter().skip(length).any(|o| *o != 0) {
            return Err(BlobDecodingError::InvalidFieldElement);
        }
        output.truncate(length);
        if data[input_pos..].iter().any(|b| *b != 0) {
            return Err(BlobDecodingError::InvalidFieldElement);
        }

        Ok(Bytes::from(output))
    }

    /// Decodes the next input field element by writing its lower 31 bytes into its
    /// appropriate place in the output and checking the high order byte is valid.
    /// Returns a [BlobDecodingError] if a field element is seen with either of its
    /// two high order bits set.
    fn decode_field_element(
        data: &[u8],
        output_pos: usize,
        input_pos: usize,
        output: &mut [u8],
    ) -> Result<(u8, usize, usize), BlobDecodingError> {
        // two highest order bits of the first byte of each field element should always be 0
        if data[input_pos] & 0b1100_0000 != 0 {
            return Err(BlobDecodingError::InvalidFieldElement);
        }
        output[output_pos..output_pos + 31].copy_from_slice(&data[input_pos + 1..input_pos + 32]);
        Ok((data[input_pos], output_pos + 32, input_pos + 32))
    }

    /// Reassemble 4 by 6 bit encoded chunks into 3 bytes of output and place them in their
    /// appropriate output positions.
    fn reassemble_bytes(mut output_pos: usize, encoded_byte: &[u8], output: &mut [u8]) -> usize {
        output_pos -= 1;
        let x = (encoded_byte[0] & 0b0011_1111) | ((encoded_byte[1] & 0b0011_0000) << 2);
        let y = (encoded_byte[1] & 0b0000_1111) | ((encoded_byte[3] & 0b0000_1111) << 4);
        let z = (encoded_byte[2] & 0b0011_1111) | ((encoded_byte[3] & 0b0011_0000) << 2);
        output[output_pos - 32] = z;
        output[output_pos - (32 * 2)] = y;
        output[output_pos - (32 * 3)] = x;
        output_pos
    }

    /// Encodes raw data into a blob, the inverse of [BlobData::decode].
    pub fn encode(data: &[u8]) -> Result<Box<Blob>, BlobDecodingError> {
        if data.len() > BLOB_MAX_DATA_SIZE {
            return Err(BlobDecodingError::InvalidLength);
        }

        let mut blob = vec![0u8; BYTES_PER_BLOB];
        let mut read_offset = 0usize;
        let mut write_offset = 0usize;
        let mut buf31 = [0u8; 31];

        let read1 = |offset: &mut usize| -> u8 {
            if *offset >= data.len() {
                return 0;
            }
            *offset += 1;
            data[*offset - 1]
        };
        let read31 = |offset: &mut usize, buf: &mut [u8; 31]| {
            let n = data.len().saturating_sub(*offset).min(31);
            buf.fill(0);
            buf[..n].copy_from_slice(&data[*offset..*offset + n]);
            *offset += n;
        };
        let mut write = |offset: &mut usize, b: u8, buf: &[u8; 31]| {
            blob[*offset] = b;
            blob[*offset + 1..*offset + 32].copy_from_slice(buf);
            *offset += 32;
        };

        let mut round = 0;
        while round < BLOB_ENCODING_ROUNDS && (round == 0 || read_offset < data.len()) {
            if round == 0 {
                buf31[0] = BLOB_ENCODING_VERSION;
                let len = data.len() as u32;
                buf31[1..4].copy_from_slice(&len.to_be_bytes()[1..]);
                let n = data.len().min(27);
                buf31[4..].fill(0);
                buf31[4..4 + n].copy_from_slice(&data[..n]);
                read_offset += n;
            } else {
                read31(&mut read_offset, &mut buf31);
            }

            let x = read1(&mut read_offset);
            write(&mut write_offset, x & 0b0011_1111, &buf31);

            read31(&mut read_offset, &mut buf31);
            let y = read1(&mut read_offset);
            write(&mut write_offset, (y & 0b0000_1111) | ((x & 0b1100_0000) >> 2), &buf31);

            read31(&mut read_offset, &mut buf31);
            let z = read1(&mut read_offset);
            write(&mut write_offset, z & 0b0011_1111, &buf31);

            read31(&mut read_offset, &mut buf31);
            write(
                &mut write_offset,
                ((z & 0b1100_0000) >> 2) | ((y & 0b1111_0000) >> 4),
                &buf31,
            );
            round += 1;
        }

        Ok(Box::new(Blob::from_slice(&blob)))
    }

    /// Fills in the pointers to the fetched blob bodies.
    /// There should be exactly one placeholder blobOrCalldata
    /// element for each blob, otherwise an error is returned.
    pub fn fill(&mut self, blobs: &[Box<Blob>], index: usize) -> Result<(), BlobDecodingError> {
        // Do not fill if there is no calldata to fill
        if self.calldata.as_ref().map_or(false, |data| data.is_empty()) {
            return Ok(());
        }

        if index >= blobs.len() {
            return Err(BlobDecodingError::InvalidLength);
        }

        if blobs[index].is_zero() {
            return Err(BlobDecodingError::MissingData);
        }

        self.data = Some(Bytes::copy_from_slice(blobs[index].as_slice()));
        Ok(())
    }

    /// Returns if a blob is empty.
    pub const fn is_empty(&self) -> bool {
        self.data.is_none() && self.calldata.is_none()
    }

    /// Turns the blob into its inner data.
    pub fn inner(&self) -> Result<Bytes, BlobDecodingError> {
        if let Some(data) = &self.calldata {
            return Ok(data.clone());
        }
        if let Some(data) = &self.data {
            return Ok(data.clone());
        }
        Err(BlobDecodingError::MissingData)
    }
}
