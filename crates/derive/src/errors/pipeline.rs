//! This module contains derivation errors thrown within the pipeline.

use crate::{
    batch::SpanBatchError,
    errors::BuilderError,
    types::{DepositError, SystemConfigUpdateError},
};
use alloy_primitives::B256;

/// [crate::ensure] is a short-hand for bubbling up errors in the case of a condition not being met.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err);
        }
    };
}

/// A top level filter for [PipelineError] that sorts by severity.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineErrorKind {
    /// A temporary error.
    #[error("Temporary error: {0}")]
    Temporary(#[source] PipelineError),
    /// A critical error.
    #[error("Critical error: {0}")]
    Critical(#[source] PipelineError),
    /// A reset error.
    #[error("Pipeline reset: {0}")]
    Reset(#[source] ResetError),
}

impl PipelineErrorKind {
    /// Returns true if the error is the temporary end-of-data marker.
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Temporary(PipelineError::Eof))
    }

    /// Returns true if the error is the temporary not-enough-data marker.
    pub const fn is_not_enough_data(&self) -> bool {
        matches!(self, Self::Temporary(PipelineError::NotEnoughData))
    }

    /// A short, stable label for the error class.
    pub const fn class(&self) -> &'static str {
        match self {
            Self::Temporary(PipelineError::Eof) => "eof",
            Self::Temporary(PipelineError::NotEnoughData) => "not_enough_data",
            Self::Temporary(_) => "temporary",
            Self::Critical(_) => "critical",
            Self::Reset(_) => "reset",
        }
    }
}

impl From<ResetError> for PipelineErrorKind {
    fn from(err: ResetError) -> Self {
        Self::Reset(err)
    }
}

/// An error encountered during the processing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// There is no data to read from the stage until the L1 origin advances.
    #[error("EOF")]
    Eof,
    /// There is not enough data to complete the processing of the stage. If the operation is
    /// re-tried, more data will come in allowing the pipeline to progress, or eventually a
    /// [PipelineError::Eof] will be encountered.
    #[error("Not enough data")]
    NotEnoughData,
    /// No channel is buffered by the channel provider.
    #[error("The channel provider is empty")]
    ChannelProviderEmpty,
    /// No channel is loaded into the [ChannelReader].
    ///
    /// [ChannelReader]: crate::stages::ChannelReader
    #[error("The channel reader has no channel available")]
    ChannelReaderEmpty,
    /// The batch queue has no batch to pop from its span buffer.
    #[error("The batch queue has no batches available")]
    BatchQueueEmpty,
    /// Missing L1 origin.
    #[error("Missing L1 origin from previous stage")]
    MissingOrigin,
    /// Missing data from [L1Retrieval].
    ///
    /// [L1Retrieval]: crate::stages::L1Retrieval
    #[error("L1 Retrieval missing data")]
    MissingL1Data,
    /// Invalid batch type passed.
    #[error("Invalid batch type passed to stage")]
    InvalidBatchType,
    /// Invalid batch validity variant.
    #[error("Invalid batch validity")]
    InvalidBatchValidity,
    /// [SystemConfig] update error.
    ///
    /// [SystemConfig]: crate::types::SystemConfig
    #[error("Error updating system config: {0}")]
    SystemConfigUpdate(SystemConfigUpdateError),
    /// Attributes builder error variant, with [BuilderError].
    #[error("Attributes builder error: {0}")]
    AttributesBuilder(#[from] BuilderError),
    /// [PipelineEncodingError] variant.
    #[error("Decode error: {0}")]
    BadEncoding(#[from] PipelineEncodingError),
    /// The data source can no longer provide any more data.
    #[error("Data source exhausted")]
    EndOfSource,
    /// Provider error variant.
    #[error("Provider error: {0}")]
    Provider(String),
    /// Data referenced on L1 is permanently unavailable.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),
}

impl PipelineError {
    /// Wrap [PipelineError] as a [PipelineErrorKind::Critical].
    pub const fn crit(self) -> PipelineErrorKind {
        PipelineErrorKind::Critical(self)
    }

    /// Wrap [PipelineError] as a [PipelineErrorKind::Temporary].
    pub const fn temp(self) -> PipelineErrorKind {
        PipelineErrorKind::Temporary(self)
    }
}

/// A reset error
#[derive(thiserror::Error, Clone, Debug, Eq, PartialEq)]
pub enum ResetError {
    /// The batch has a bad parent hash.
    /// The first argument is the expected parent hash, and the second argument is the actual
    /// parent hash.
    #[error("Bad parent hash: expected {0}, got {1}")]
    BadParentHash(B256, B256),
    /// The batch has a bad timestamp.
    /// The first argument is the expected timestamp, and the second argument is the actual
    /// timestamp.
    #[error("Bad timestamp: expected {0}, got {1}")]
    BadTimestamp(u64, u64),
    /// L1 origin mismatch.
    #[error("L1 origin mismatch. Expected {0:?}, got {1:?}")]
    L1OriginMismatch(u64, u64),
    /// The stage detected a block reorg.
    /// The first argument is the expected block hash.
    /// The second argument is the parent_hash of the next l1 origin block.
    #[error("L1 reorg detected: expected {0}, got {1}")]
    ReorgDetected(B256, B256),
    /// Attributes builder error variant, with [BuilderError].
    #[error("Attributes builder error: {0}")]
    AttributesBuilder(BuilderError),
    /// The channel and batch stages need to be swapped for Holocene.
    #[error("Holocene activation reset")]
    HoloceneActivation,
    /// A challenge on an already derived alt-DA commitment expired unresolved.
    #[error("New expired challenge")]
    NewExpiredChallenge,
    /// The alt-DA manager detached from the pipeline origin and requires a reorg.
    #[error("Alt-DA reorg required")]
    ReorgRequired,
}

impl ResetError {
    /// Wrap [ResetError] as a [PipelineErrorKind::Reset].
    pub const fn reset(self) -> PipelineErrorKind {
        PipelineErrorKind::Reset(self)
    }
}

/// A decoding error.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineEncodingError {
    /// The buffer is empty.
    #[error("Empty buffer")]
    EmptyBuffer,
    /// Deposit decoding error.
    #[error("Error decoding deposit: {0}")]
    DepositError(#[from] DepositError),
    /// The batch type byte is unknown.
    #[error("Invalid batch type: {0}")]
    InvalidBatchType(u8),
    /// Alloy RLP Encoding Error.
    #[error("RLP error: {0}")]
    AlloyRlpError(alloy_rlp::Error),
    /// Span Batch Error.
    #[error("{0}")]
    SpanBatchError(#[from] SpanBatchError),
}
