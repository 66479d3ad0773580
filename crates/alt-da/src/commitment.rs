//! Alt-DA commitments.

use crate::errors::CommitmentError;
use alloy_primitives::{hex, keccak256, Bytes, B256};
use core::fmt;

/// The version byte of batcher transactions carrying an alt-DA commitment.
///
/// It must not collide with the frame derivation version, which is still parsed downstream.
pub const TX_DATA_VERSION_1: u8 = 1;

/// The maximum size of an input behind a keccak256 commitment.
///
/// Bigger inputs could not be resolved on L1 by the challenge contract. Changing it requires a
/// hard fork.
pub const MAX_INPUT_SIZE: usize = 130_672;

/// The kind of an alt-DA commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CommitmentType {
    /// The keccak256 hash of the input. Challengeable on L1.
    Keccak256 = 0,
    /// An opaque commitment understood only by the DA service.
    Generic = 1,
}

impl TryFrom<u8> for CommitmentType {
    type Error = CommitmentError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Keccak256),
            1 => Ok(Self::Generic),
            other => Err(CommitmentError::UnknownType(other)),
        }
    }
}

/// A commitment to an alt-DA input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Commitment {
    /// A keccak256 commitment.
    Keccak256(B256),
    /// A generic commitment.
    Generic(Bytes),
}

impl Commitment {
    /// Creates the keccak256 commitment of `input`.
    pub fn keccak256(input: &[u8]) -> Self {
        Self::Keccak256(keccak256(input))
    }

    /// Decodes a commitment from its type byte and body.
    pub fn decode(data: &[u8]) -> Result<Self, CommitmentError> {
        let (&kind, body) = data.split_first().ok_or(CommitmentError::Empty)?;
        match CommitmentType::try_from(kind)? {
            CommitmentType::Keccak256 => {
                if body.len() != B256::len_bytes() {
                    return Err(CommitmentError::InvalidLength(body.len()));
                }
                Ok(Self::Keccak256(B256::from_slice(body)))
            }
            CommitmentType::Generic => {
                if body.is_empty() {
                    return Err(CommitmentError::InvalidLength(0));
                }
                Ok(Self::Generic(Bytes::copy_from_slice(body)))
            }
        }
    }

    /// Returns the kind of the commitment.
    pub const fn commitment_type(&self) -> CommitmentType {
        match self {
            Self::Keccak256(_) => CommitmentType::Keccak256,
            Self::Generic(_) => CommitmentType::Generic,
        }
    }

    /// Encodes the commitment as its type byte followed by its body.
    pub fn encode(&self) -> Bytes {
        let body: &[u8] = match self {
            Self::Keccak256(hash) => hash.as_slice(),
            Self::Generic(body) => body.as_ref(),
        };
        let mut out = Vec::with_capacity(body.len() + 1);
        out.push(self.commitment_type() as u8);
        out.extend_from_slice(body);
        out.into()
    }

    /// Encodes the commitment as batcher transaction data.
    pub fn tx_data(&self) -> Bytes {
        [&[TX_DATA_VERSION_1][..], &self.encode()].concat().into()
    }

    /// Checks that `input` is the pre-image of the commitment.
    ///
    /// Generic commitments are opaque and always verify.
    pub fn verify(&self, input: &[u8]) -> Result<(), CommitmentError> {
        match self {
            Self::Keccak256(hash) if keccak256(input) != *hash => {
                Err(CommitmentError::Mismatch(*hash))
            }
            _ => Ok(()),
        }
    }

    /// Returns the maximum input size for the commitment, if any.
    pub const fn max_input_size(&self) -> Option<usize> {
        match self {
            Self::Keccak256(_) => Some(MAX_INPUT_SIZE),
            Self::Generic(_) => None,
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_prefixed(self.encode()))
    }
}
