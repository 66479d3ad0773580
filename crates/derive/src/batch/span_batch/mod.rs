//! Contains all Span Batch types and logic.
//!
//! ## Batch format
//!
//! ```text
//! [SPAN_BATCH_TYPE] = 1
//! span_batch = [SPAN_BATCH_TYPE] ++ prefix ++ payload
//! prefix = rel_timestamp ++ l1_origin_num ++ parent_check ++ l1_origin_check
//! payload = block_count ++ origin_bits ++ block_tx_counts ++ txs
//! txs = contract_creation_bits ++ y_parity_bits ++ tx_sigs ++ tx_tos ++ tx_datas ++ tx_nonces ++ tx_gases ++ protected_bits
//! ```

mod batch;
pub use batch::SpanBatch;

mod bits;
pub use bits::SpanBatchBits;

mod payload;
pub use payload::SpanBatchPayload;

mod prefix;
pub use prefix::SpanBatchPrefix;

mod errors;
pub use errors::{SpanBatchError, SpanDecodingError};

mod raw;
pub use raw::RawSpanBatch;

mod element;
pub use element::SpanBatchElement;

mod tx_data;
pub use tx_data::{
    read_tx_data, SpanBatchSignature, SpanBatchTransactionData, SplitTransaction,
    EIP1559_TX_TYPE, EIP2930_TX_TYPE, LEGACY_TX_TYPE,
};

mod transactions;
pub use transactions::SpanBatchTransactions;
