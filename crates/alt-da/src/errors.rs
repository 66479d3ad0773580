//! Errors of the alt-DA crate.

use alloy_primitives::B256;
use mako_derive::errors::{PipelineError, PipelineErrorKind, ResetError};

/// An error decoding or verifying a [Commitment].
///
/// [Commitment]: crate::Commitment
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitmentError {
    /// The commitment has no type byte.
    #[error("Empty commitment")]
    Empty,
    /// The commitment type byte is unknown.
    #[error("Unknown commitment type: {0}")]
    UnknownType(u8),
    /// The commitment body has the wrong length for its type.
    #[error("Invalid commitment length: {0}")]
    InvalidLength(usize),
    /// The input does not hash to the commitment.
    #[error("Input does not match commitment {0}")]
    Mismatch(B256),
}

/// An error of the [DaStorage] backend.
///
/// [DaStorage]: crate::DaStorage
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DaStorageError {
    /// The storage has no input for the commitment.
    #[error("Input not found")]
    NotFound,
    /// The storage could not be reached.
    #[error("DA storage request failed: {0}")]
    Backend(String),
}

/// An error decoding a challenge contract event or call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChallengeDecodingError {
    /// The log is not a `ChallengeStatusChanged` event.
    #[error("Invalid challenge event: {0}")]
    InvalidEvent(String),
    /// The calldata is not a `resolve` call.
    #[error("Invalid resolve call: {0}")]
    InvalidCall(String),
    /// The resolve call carries no input.
    #[error("Empty resolve data")]
    EmptyResolveData,
    /// The event carries an unknown challenge status.
    #[error("Unknown challenge status: {0}")]
    UnknownStatus(u8),
    /// The challenged commitment could not be decoded.
    #[error(transparent)]
    Commitment(#[from] CommitmentError),
}

/// An error of the [AltDaManager].
///
/// [AltDaManager]: crate::AltDaManager
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AltDaError {
    /// The input is missing but can still be challenged or resolved.
    #[error("Input not found, pending challenge")]
    PendingChallenge,
    /// The commitment was challenged and the challenge expired unresolved.
    #[error("Challenge expired")]
    ExpiredChallenge,
    /// The input is missing and can no longer be challenged.
    #[error("Input missing past the challenge window")]
    MissingPastWindow,
    /// A challenge on an already derived commitment expired.
    #[error("Reorg required")]
    ReorgRequired,
    /// A challenge event does not match a tracked challenge.
    #[error("Invalid challenge: {0}")]
    InvalidChallenge(String),
    /// The DA storage failed.
    #[error(transparent)]
    Storage(#[from] DaStorageError),
    /// The L1 provider failed.
    #[error("L1 provider error: {0}")]
    Provider(String),
}

impl From<AltDaError> for PipelineErrorKind {
    fn from(err: AltDaError) -> Self {
        match err {
            AltDaError::ReorgRequired => ResetError::ReorgRequired.reset(),
            AltDaError::PendingChallenge => PipelineError::NotEnoughData.temp(),
            AltDaError::MissingPastWindow => {
                PipelineError::DataUnavailable(err.to_string()).crit()
            }
            _ => PipelineError::Provider(err.to_string()).temp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alt_da_error_classes() {
        assert_eq!(
            PipelineErrorKind::from(AltDaError::ReorgRequired),
            ResetError::ReorgRequired.reset()
        );
        assert!(PipelineErrorKind::from(AltDaError::PendingChallenge).is_not_enough_data());
        assert_eq!(PipelineErrorKind::from(AltDaError::MissingPastWindow).class(), "critical");
        let storage = AltDaError::Storage(DaStorageError::Backend("timeout".into()));
        assert_eq!(PipelineErrorKind::from(storage).class(), "temporary");
    }
}
