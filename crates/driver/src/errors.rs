//! Contains driver-related error types.

use alloy_primitives::B256;
use mako_derive::errors::{PipelineError, PipelineErrorKind};
use thiserror::Error;

/// A [Result] type for the [DriverError].
pub type DriverResult<T, E> = Result<T, DriverError<E>>;

/// An error that stops the driver.
#[derive(Error, Debug)]
pub enum DriverError<E>
where
    E: core::error::Error,
{
    /// A critical pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineErrorKind),
    /// An error returned by the [EngineController].
    ///
    /// [EngineController]: crate::EngineController
    #[error("Engine error: {0}")]
    Engine(E),
    /// The L1 chain could not serve a block the driver needs.
    #[error("L1 provider error: {0}")]
    L1(String),
    /// The walk back from the unsafe head met a finalized block other than the finalized head.
    #[error("Finalized block #{number} mismatch: expected {expected}, got {got}")]
    FinalizedMismatch {
        /// The number of the finalized block.
        number: u64,
        /// The hash of the finalized head.
        expected: B256,
        /// The hash found on the walked chain.
        got: B256,
    },
    /// The walked L2 chain is not linked by parent hashes.
    #[error("L2 block #{number} does not link to its parent {parent_hash}")]
    BrokenL2Chain {
        /// The number of the child block.
        number: u64,
        /// The parent hash of the child block.
        parent_hash: B256,
    },
    /// The genesis block of the walked chain is not the configured one.
    #[error("Unexpected L2 genesis: expected {expected}, got {got}")]
    GenesisMismatch {
        /// The configured genesis hash.
        expected: B256,
        /// The genesis hash of the engine.
        got: B256,
    },
    /// The reorg reaches deeper than the driver is willing to walk.
    #[error("L2 reorg is too deep: unsafe head origin #{unsafe_origin}, reached origin #{reached}")]
    ReorgTooDeep {
        /// The L1 origin number of the previous unsafe head.
        unsafe_origin: u64,
        /// The L1 origin number of the block the walk stopped at.
        reached: u64,
    },
    /// The safe head is older than its own L1 origin.
    #[error("Safe head time {l2_time} is before its L1 origin time {l1_time}")]
    SafeHeadBeforeOrigin {
        /// The safe head timestamp.
        l2_time: u64,
        /// The L1 origin timestamp.
        l1_time: u64,
    },
}

impl<E: core::error::Error> DriverError<E> {
    /// Returns true if the error is the pipeline running out of L1 data.
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Pipeline(PipelineErrorKind::Temporary(PipelineError::Eof)))
    }
}

/// An error returned by the [InMemoryEngine](crate::InMemoryEngine).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No canonical block with the given number.
    #[error("L2 block #{0} not found")]
    BlockNotFound(u64),
    /// No block with the given hash.
    #[error("Unknown L2 block {0}")]
    UnknownHash(B256),
    /// A payload does not extend the block it claims as parent.
    #[error("Payload #{number} does not extend {parent_hash}")]
    UnknownParent {
        /// The number of the payload.
        number: u64,
        /// The claimed parent hash.
        parent_hash: B256,
    },
    /// A transaction is not a valid EIP-2718 envelope.
    #[error("Invalid transaction at index {0}")]
    InvalidTransaction(usize),
    /// The payload does not open with an L1 info deposit.
    #[error("Invalid L1 info deposit: {0}")]
    InvalidL1Info(String),
}

/// How the [Driver](crate::Driver) recovers from a failed engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// The engine could not serve the call for now; it is retried after a backoff.
    Temporary,
    /// The engine does not hold the state the call builds on; the driver resets.
    Reset,
    /// The engine rejected the payload; derived attributes are retried as a deposit-only block.
    InvalidPayload,
}

/// An engine error that knows its [EngineErrorKind].
pub trait EngineErrorClass {
    /// Returns the kind of the error.
    fn kind(&self) -> EngineErrorKind;
}

impl EngineErrorClass for EngineError {
    fn kind(&self) -> EngineErrorKind {
        match self {
            Self::BlockNotFound(_) | Self::UnknownHash(_) | Self::UnknownParent { .. } => {
                EngineErrorKind::Reset
            }
            Self::InvalidTransaction(_) | Self::InvalidL1Info(_) => EngineErrorKind::InvalidPayload,
        }
    }
}

impl From<EngineError> for PipelineErrorKind {
    fn from(e: EngineError) -> Self {
        PipelineError::Provider(e.to_string()).temp()
    }
}

/// An error pushing into the [UnsafePayloadQueue](crate::UnsafePayloadQueue).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsafePayloadError {
    /// The payload is already queued.
    #[error("Payload {0} is already queued")]
    Duplicate(B256),
    /// The payload alone exceeds the byte budget.
    #[error("Payload of {size} bytes exceeds the queue budget of {max} bytes")]
    TooLarge {
        /// The memory footprint of the payload.
        size: u64,
        /// The byte budget of the queue.
        max: u64,
    },
}
