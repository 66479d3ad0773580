//! An L1 transaction as seen by the data sources.

use alloy_primitives::{Address, Bytes, B256};

/// The EIP-2718 type of a blob carrying transaction.
pub const BLOB_TX_TYPE: u8 = 0x03;

/// The subset of an L1 transaction that the data sources inspect.
///
/// The sender is the recovered signer; chain providers are responsible for recovering it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct L1Transaction {
    /// The transaction hash.
    pub hash: B256,
    /// The EIP-2718 transaction type.
    #[cfg_attr(feature = "serde", serde(default))]
    pub tx_type: u8,
    /// The recovered sender.
    pub from: Address,
    /// The recipient; `None` for contract creations.
    pub to: Option<Address>,
    /// The calldata.
    #[cfg_attr(feature = "serde", serde(default))]
    pub input: Bytes,
    /// The versioned hashes of the blobs carried by the transaction.
    #[cfg_attr(feature = "serde", serde(default))]
    pub blob_versioned_hashes: Vec<B256>,
}

impl L1Transaction {
    /// Returns true if the transaction carries blobs.
    pub const fn is_blob_tx(&self) -> bool {
        self.tx_type == BLOB_TX_TYPE
    }

    /// Returns true if the transaction was sent by `sender` to `inbox`.
    pub fn is_batcher_tx(&self, inbox: Address, sender: Address) -> bool {
        self.to == Some(inbox) && self.from == sender
    }
}
