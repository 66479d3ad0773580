//! Decoding of the `DataAvailabilityChallenge` contract events and calls.

use crate::{errors::ChallengeDecodingError, ChallengeStatus, Commitment};
use alloy_primitives::{Address, Bytes, Log, B256, U256};
use alloy_sol_types::{sol, SolCall, SolEvent};

sol! {
    /// Emitted when the status of a challenge changes.
    event ChallengeStatusChanged(
        uint256 indexed challengedBlockNumber,
        bytes challengedCommitment,
        uint8 status
    );

    /// Publishes the input behind a challenged commitment.
    function resolve(
        uint256 challengedBlockNumber,
        bytes challengedCommitment,
        bytes resolveData
    );
}

/// The topic of the `ChallengeStatusChanged` event.
pub const CHALLENGE_STATUS_EVENT_ABI_HASH: B256 = ChallengeStatusChanged::SIGNATURE_HASH;

/// A decoded `ChallengeStatusChanged` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeEvent {
    /// The number of the L1 block including the challenged commitment.
    pub block_number: u64,
    /// The challenged commitment.
    pub commitment: Commitment,
    /// The new status of the challenge.
    pub status: ChallengeStatus,
}

impl ChallengeEvent {
    /// Decodes the event from a log of the challenge contract.
    pub fn decode(log: &Log) -> Result<Self, ChallengeDecodingError> {
        let event = ChallengeStatusChanged::decode_log_data(&log.data, true)
            .map_err(|e| ChallengeDecodingError::InvalidEvent(e.to_string()))?;
        let status = ChallengeStatus::try_from(event.status)
            .map_err(ChallengeDecodingError::UnknownStatus)?;
        let block_number = u64::try_from(event.challengedBlockNumber).map_err(|_| {
            ChallengeDecodingError::InvalidEvent("block number overflows u64".to_string())
        })?;
        let commitment = Commitment::decode(&event.challengedCommitment)?;
        Ok(Self { block_number, commitment, status })
    }

    /// Encodes the event as a log of the contract at `address`.
    pub fn to_log(&self, address: Address) -> Log {
        let event = ChallengeStatusChanged {
            challengedBlockNumber: U256::from(self.block_number),
            challengedCommitment: self.commitment.encode(),
            status: self.status as u8,
        };
        Log { address, data: event.encode_log_data() }
    }
}

/// Decodes the input published by a `resolve` call.
pub fn decode_resolved_input(calldata: &[u8]) -> Result<Bytes, ChallengeDecodingError> {
    let call = resolveCall::abi_decode(calldata, true)
        .map_err(|e| ChallengeDecodingError::InvalidCall(e.to_string()))?;
    if call.resolveData.is_empty() {
        return Err(ChallengeDecodingError::EmptyResolveData);
    }
    Ok(call.resolveData)
}

/// Encodes a `resolve` call publishing `input` for the commitment included in `block_number`.
pub fn encode_resolve_call(block_number: u64, commitment: &Commitment, input: Bytes) -> Bytes {
    resolveCall {
        challengedBlockNumber: U256::from(block_number),
        challengedCommitment: commitment.encode(),
        resolveData: input,
    }
    .abi_encode()
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, keccak256};

    #[test]
    fn test_event_signature() {
        assert_eq!(
            CHALLENGE_STATUS_EVENT_ABI_HASH,
            keccak256("ChallengeStatusChanged(uint256,bytes,uint8)")
        );
    }

    #[test]
    fn test_challenge_event_log() {
        let event = ChallengeEvent {
            block_number: 5,
            commitment: Commitment::keccak256(b"input"),
            status: ChallengeStatus::Active,
        };
        let log = event.to_log(address!("0000000000000000000000000000000000000da0"));
        assert_eq!(log.data.topics()[0], CHALLENGE_STATUS_EVENT_ABI_HASH);
        assert_eq!(ChallengeEvent::decode(&log), Ok(event));
    }

    #[test]
    fn test_challenge_event_unknown_status() {
        let event = ChallengeStatusChanged {
            challengedBlockNumber: U256::from(5),
            challengedCommitment: Commitment::keccak256(b"input").encode(),
            status: 9,
        };
        let log = Log { address: Default::default(), data: event.encode_log_data() };
        assert_eq!(ChallengeEvent::decode(&log), Err(ChallengeDecodingError::UnknownStatus(9)));
    }

    #[test]
    fn test_resolved_input() {
        let commitment = Commitment::keccak256(b"input");
        let calldata = encode_resolve_call(5, &commitment, Bytes::from_static(b"input"));
        assert_eq!(decode_resolved_input(&calldata).unwrap(), Bytes::from_static(b"input"));

        let empty = encode_resolve_call(5, &commitment, Bytes::new());
        assert_eq!(decode_resolved_input(&empty), Err(ChallengeDecodingError::EmptyResolveData));
        assert!(matches!(
            decode_resolved_input(&[0xde, 0xad]),
            Err(ChallengeDecodingError::InvalidCall(_))
        ));
    }
}
