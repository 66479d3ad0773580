//! Module for working with span batch bits.

use super::{SpanBatchError, SpanDecodingError};
use crate::params::MAX_SPAN_BATCH_ELEMENT_COUNT;
use core::cmp::Ordering;

/// Type for span batch bits.
///
/// A bitlist is a big-endian integer, left-padded with zeroes to a multiple of 8 bits; bit `i`
/// is the `i`-th least significant bit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpanBatchBits(pub Vec<u8>);

impl AsRef<[u8]> for SpanBatchBits {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl SpanBatchBits {
    /// Returns the max amount of bytes that can be stored in the bitlist.
    pub const fn max_bytes() -> usize {
        MAX_SPAN_BATCH_ELEMENT_COUNT as usize / 8
    }

    /// Decodes a standard span-batch bitlist of `bit_length` bits from a reader.
    pub fn decode(b: &mut &[u8], bit_length: usize) -> Result<Self, SpanBatchError> {
        let buffer_len = bit_length.div_ceil(8);
        if buffer_len > Self::max_bytes() {
            return Err(SpanBatchError::TooBigSpanBatchSize);
        }
        if b.len() < buffer_len {
            return Err(SpanDecodingError::Bitlist.into());
        }

        let (bits, rest) = b.split_at(buffer_len);
        *b = rest;
        let sb_bits = Self(bits.to_vec());

        if sb_bits.bit_len() > bit_length {
            return Err(SpanBatchError::BitfieldTooLong);
        }

        Ok(sb_bits)
    }

    /// Encodes a standard span-batch bitlist of `bit_length` bits.
    pub fn encode(w: &mut Vec<u8>, bit_length: usize, bits: &Self) -> Result<(), SpanBatchError> {
        if bits.bit_len() > bit_length {
            return Err(SpanBatchError::BitfieldTooLong);
        }

        let buf_len = bit_length.div_ceil(8);
        if buf_len > Self::max_bytes() {
            return Err(SpanBatchError::TooBigSpanBatchSize);
        }
        // Leading zero bytes beyond the declared length carry no bits.
        let significant = bits.0.len().min(buf_len);
        let mut buf = vec![0; buf_len];
        buf[buf_len - significant..].copy_from_slice(&bits.0[bits.0.len() - significant..]);
        w.extend_from_slice(&buf);
        Ok(())
    }

    /// Get a bit from the [SpanBatchBits] bitlist.
    pub fn get_bit(&self, index: usize) -> Option<u8> {
        let byte_index = index / 8;
        let bit_index = index % 8;

        if byte_index < self.0.len() {
            let byte = self.0[self.0.len() - byte_index - 1];
            Some(if byte & (1 << bit_index) != 0 { 1 } else { 0 })
        } else {
            None
        }
    }

    /// Sets a bit in the [SpanBatchBits] bitlist.
    pub fn set_bit(&mut self, index: usize, value: bool) {
        let byte_index = index / 8;
        let bit_index = index % 8;

        if byte_index >= self.0.len() {
            Self::resize_from_right(&mut self.0, byte_index + 1);
        }

        let len = self.0.len();
        let byte = &mut self.0[len - byte_index - 1];

        if value {
            *byte |= 1 << bit_index;
        } else {
            *byte &= !(1 << bit_index);
        }
    }

    /// Calculates the bit length of the [SpanBatchBits] bitfield.
    pub fn bit_len(&self) -> usize {
        for (i, &byte) in self.0.iter().enumerate() {
            if byte != 0 {
                let msb_index = 7 - byte.leading_zeros() as usize;
                return msb_index + 1 + ((self.0.len() - i - 1) * 8);
            }
        }
        0
    }

    /// Returns the number of set bits.
    pub fn count_ones(&self) -> u64 {
        self.0.iter().map(|b| b.count_ones() as u64).sum()
    }

    /// Resizes an array from the right. Useful for big-endian zero extension.
    fn resize_from_right<T: Default + Clone>(vec: &mut Vec<T>, new_size: usize) {
        let current_size = vec.len();
        match new_size.cmp(&current_size) {
            Ordering::Less => {
                let remove_count = current_size - new_size;
                vec.drain(0..remove_count);
            }
            Ordering::Greater => {
                let additional = new_size - current_size;
                let mut prepend_elements = vec![T::default(); additional];
                prepend_elements.append(vec);
                *vec = prepend_elements;
            }
            Ordering::Equal => {}
        }
    }
}
