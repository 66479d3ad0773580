//! Contains Payload Attribute Types.

use super::L2BlockInfo;
use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::{Address, Bytes, B256, B64};

/// Payload attributes: the input of one L2 block handed to the execution engine.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PayloadAttributes {
    /// Value for the timestamp field of the new payload.
    pub timestamp: u64,
    /// Value for the random field of the new payload.
    pub prev_randao: B256,
    /// Suggested value for the coinbase field of the new payload.
    pub suggested_fee_recipient: Address,
    /// Withdrawals to include into the block. Empty after Canyon, absent before.
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// Parent beacon block root, set after Ecotone.
    pub parent_beacon_block_root: Option<B256>,
    /// Transactions to force into the block (always at the start of the transactions list).
    pub transactions: Vec<Bytes>,
    /// NoTxPool to disable adding any transactions from the transaction-pool.
    pub no_tx_pool: bool,
    /// GasLimit override.
    pub gas_limit: Option<u64>,
    /// EIP-1559 parameters, set after Holocene.
    pub eip_1559_params: Option<B64>,
}

impl PayloadAttributes {
    /// Returns the number of deposit transactions at the head of the transaction list.
    pub fn deposit_count(&self) -> usize {
        self.transactions
            .iter()
            .take_while(|tx| tx.first() == Some(&crate::params::DEPOSIT_TX_TYPE))
            .count()
    }
}

/// Payload Attributes with parent block reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributesWithParent {
    /// The payload attributes.
    pub attributes: PayloadAttributes,
    /// The parent block reference.
    pub parent: L2BlockInfo,
    /// Whether the current batch is the last in its span.
    pub is_last_in_span: bool,
}

impl AttributesWithParent {
    /// Create a new [AttributesWithParent] instance.
    pub const fn new(
        attributes: PayloadAttributes,
        parent: L2BlockInfo,
        is_last_in_span: bool,
    ) -> Self {
        Self { attributes, parent, is_last_in_span }
    }

    /// Returns the payload attributes.
    pub const fn attributes(&self) -> &PayloadAttributes {
        &self.attributes
    }

    /// Returns the parent block reference.
    pub const fn parent(&self) -> &L2BlockInfo {
        &self.parent
    }

    /// Returns whether the current batch is the last in its span.
    pub const fn is_last_in_span(&self) -> bool {
        self.is_last_in_span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_count() {
        let attributes = PayloadAttributes {
            transactions: vec![
                Bytes::from(vec![0x7E, 0x01]),
                Bytes::from(vec![0x7E, 0x02]),
                Bytes::from(vec![0x02, 0x03]),
                Bytes::from(vec![0x7E, 0x04]),
            ],
            ..Default::default()
        };
        assert_eq!(attributes.deposit_count(), 2);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_payload_attributes_serde_names() {
        let attributes = PayloadAttributes { no_tx_pool: true, ..Default::default() };
        let json = serde_json::to_value(&attributes).unwrap();
        assert_eq!(json["noTxPool"], serde_json::Value::Bool(true));
        assert!(json.get("suggestedFeeRecipient").is_some());
        let back: PayloadAttributes = serde_json::from_value(json).unwrap();
        assert_eq!(back, attributes);
    }
}
