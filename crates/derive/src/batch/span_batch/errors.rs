//! Span Batch Errors

/// Span Batch Errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SpanBatchError {
    /// The span batch is too big
    #[error("The span batch is too big.")]
    TooBigSpanBatchSize,
    /// The bit field is too long
    #[error("The bit field is too long")]
    BitfieldTooLong,
    /// Empty Span Batch
    #[error("Empty span batch")]
    EmptySpanBatch,
    /// Missing L1 origin
    #[error("Missing L1 origin")]
    MissingL1Origin,
    /// A span element after the safe head references an L1 origin older than the safe head's.
    #[error("L1 origin of span element is before the safe head's")]
    L1OriginBeforeSafeHead,
    /// Elements appended to a span batch must be ordered by timestamp.
    #[error("Singular batch is not ordered after the span")]
    UnorderedBatch,
    /// A transaction was signed for a different chain.
    #[error("Transaction chain id {0} does not match {1}")]
    ChainIdMismatch(u64, u64),
    /// Decoding errors
    #[error("Span batch decoding error: {0}")]
    Decoding(#[from] SpanDecodingError),
}

/// Decoding Error
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SpanDecodingError {
    /// Failed to decode relative timestamp
    #[error("Failed to decode relative timestamp")]
    RelativeTimestamp,
    /// Failed to decode L1 origin number
    #[error("Failed to decode L1 origin number")]
    L1OriginNumber,
    /// Failed to decode parent check
    #[error("Failed to decode parent check")]
    ParentCheck,
    /// Failed to decode L1 origin check
    #[error("Failed to decode L1 origin check")]
    L1OriginCheck,
    /// Failed to decode block count
    #[error("Failed to decode block count")]
    BlockCount,
    /// Failed to decode block tx counts
    #[error("Failed to decode block tx counts")]
    BlockTxCounts,
    /// A bitlist is shorter than its declared length.
    #[error("Failed to decode bitlist")]
    Bitlist,
    /// Failed to decode transaction signatures
    #[error("Failed to decode transaction signatures")]
    TxSigs,
    /// Failed to decode transaction recipients
    #[error("Failed to decode transaction recipients")]
    TxTos,
    /// Failed to decode transaction nonces
    #[error("Failed to decode transaction nonces")]
    TxNonces,
    /// Failed to decode transaction gas limits
    #[error("Failed to decode transaction gas limits")]
    TxGases,
    /// Mismatch in length between the transaction type and signature arrays in a span batch
    /// transaction payload.
    #[error("Mismatch in length between the transaction type and signature arrays")]
    TypeSignatureLenMismatch,
    /// Invalid transaction type
    #[error("Invalid transaction type")]
    InvalidTransactionType,
    /// Invalid transaction data
    #[error("Invalid transaction data")]
    InvalidTransactionData,
    /// Invalid transaction signature
    #[error("Invalid transaction signature")]
    InvalidTransactionSignature,
}
