//! Span batch transaction data: the parts of a transaction that are not stored in a dedicated
//! column of the span batch, and the conversion to and from full EIP-2718 transactions.

use super::{SpanBatchError, SpanDecodingError};
use crate::params::MAX_SPAN_BATCH_ELEMENT_COUNT;
use alloy_eips::eip2930::AccessList;
use alloy_primitives::{Address, Bytes, TxKind, U256};
use alloy_rlp::{Buf, Decodable, Encodable, Header};

/// The EIP-2718 type of a legacy transaction.
pub const LEGACY_TX_TYPE: u8 = 0x00;
/// The EIP-2718 type of an EIP-2930 transaction.
pub const EIP2930_TX_TYPE: u8 = 0x01;
/// The EIP-2718 type of an EIP-1559 transaction.
pub const EIP1559_TX_TYPE: u8 = 0x02;

/// The signature values stored in a span batch: `r` and `s`, and the `v` value recovered from the
/// y-parity and protected bits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpanBatchSignature {
    /// The `v` value, in the transaction type's own convention.
    pub v: u64,
    /// The `r` value.
    pub r: U256,
    /// The `s` value.
    pub s: U256,
}

/// The transaction fields kept in the `tx_datas` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanBatchTransactionData {
    /// Legacy transaction data: `rlp([value, gas_price, data])`.
    Legacy {
        /// Value sent.
        value: U256,
        /// Gas price.
        gas_price: u128,
        /// Calldata.
        data: Bytes,
    },
    /// EIP-2930 transaction data: `0x01 ++ rlp([value, gas_price, data, access_list])`.
    Eip2930 {
        /// Value sent.
        value: U256,
        /// Gas price.
        gas_price: u128,
        /// Calldata.
        data: Bytes,
        /// Access list.
        access_list: AccessList,
    },
    /// EIP-1559 transaction data:
    /// `0x02 ++ rlp([value, max_priority_fee_per_gas, max_fee_per_gas, data, access_list])`.
    Eip1559 {
        /// Value sent.
        value: U256,
        /// Priority fee cap.
        max_priority_fee_per_gas: u128,
        /// Fee cap.
        max_fee_per_gas: u128,
        /// Calldata.
        data: Bytes,
        /// Access list.
        access_list: AccessList,
    },
}

/// A full transaction split into its span batch columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitTransaction {
    /// The `tx_datas` entry.
    pub data: SpanBatchTransactionData,
    /// The nonce.
    pub nonce: u64,
    /// The gas limit.
    pub gas: u64,
    /// The recipient; `None` for contract creations.
    pub to: Option<Address>,
    /// The signature.
    pub signature: SpanBatchSignature,
    /// The chain id the transaction was signed for, if any.
    pub chain_id: Option<u64>,
    /// Whether a legacy transaction is EIP-155 protected.
    pub protected: bool,
}

fn invalid_data() -> SpanBatchError {
    SpanBatchError::Decoding(SpanDecodingError::InvalidTransactionData)
}

fn rlp_list(fields: &[&dyn Encodable], out: &mut Vec<u8>) {
    let payload_length = fields.iter().map(|f| f.length()).sum();
    Header { list: true, payload_length }.encode(out);
    for field in fields {
        field.encode(out);
    }
}

/// Strips the list header off `buf`, returning the list payload.
fn list_payload<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], SpanBatchError> {
    let header = Header::decode(buf).map_err(|_| invalid_data())?;
    if !header.list || buf.len() < header.payload_length {
        return Err(invalid_data());
    }
    let (payload, rest) = buf.split_at(header.payload_length);
    *buf = rest;
    Ok(payload)
}

fn field<T: Decodable>(buf: &mut &[u8]) -> Result<T, SpanBatchError> {
    T::decode(buf).map_err(|_| invalid_data())
}

/// Reads one `tx_datas` entry from the reader, returning the raw bytes and the transaction type.
///
/// An entry is an optional EIP-2718 type byte followed by an RLP list.
pub fn read_tx_data(r: &mut &[u8]) -> Result<(Vec<u8>, u8), SpanBatchError> {
    let first = *r.first().ok_or_else(invalid_data)?;
    let mut tx_data = Vec::new();
    let mut tx_type = LEGACY_TX_TYPE;
    if first <= 0x7F {
        tx_type = first;
        tx_data.push(first);
        r.advance(1);
    }

    let mut peek = *r;
    let header = Header::decode(&mut peek).map_err(|_| invalid_data())?;
    if !header.list {
        return Err(invalid_data());
    }
    if header.payload_length as u64 > MAX_SPAN_BATCH_ELEMENT_COUNT {
        return Err(SpanBatchError::TooBigSpanBatchSize);
    }
    let total = (r.len() - peek.len()) + header.payload_length;
    if r.len() < total {
        return Err(invalid_data());
    }
    tx_data.extend_from_slice(&r[..total]);
    r.advance(total);
    Ok((tx_data, tx_type))
}

impl SpanBatchTransactionData {
    /// Returns the EIP-2718 type of the transaction.
    pub const fn tx_type(&self) -> u8 {
        match self {
            Self::Legacy { .. } => LEGACY_TX_TYPE,
            Self::Eip2930 { .. } => EIP2930_TX_TYPE,
            Self::Eip1559 { .. } => EIP1559_TX_TYPE,
        }
    }

    /// Decodes a `tx_datas` entry.
    pub fn decode(mut buf: &[u8]) -> Result<Self, SpanBatchError> {
        let first = *buf.first().ok_or_else(invalid_data)?;
        let tx_type = if first <= 0x7F {
            buf.advance(1);
            first
        } else {
            LEGACY_TX_TYPE
        };
        let mut payload = list_payload(&mut buf)?;
        let data = match tx_type {
            LEGACY_TX_TYPE => Self::Legacy {
                value: field(&mut payload)?,
                gas_price: field(&mut payload)?,
                data: field(&mut payload)?,
            },
            EIP2930_TX_TYPE => Self::Eip2930 {
                value: field(&mut payload)?,
                gas_price: field(&mut payload)?,
                data: field(&mut payload)?,
                access_list: field(&mut payload)?,
            },
            EIP1559_TX_TYPE => Self::Eip1559 {
                value: field(&mut payload)?,
                max_priority_fee_per_gas: field(&mut payload)?,
                max_fee_per_gas: field(&mut payload)?,
                data: field(&mut payload)?,
                access_list: field(&mut payload)?,
            },
            _ => return Err(SpanDecodingError::InvalidTransactionType.into()),
        };
        if !payload.is_empty() || !buf.is_empty() {
            return Err(invalid_data());
        }
        Ok(data)
    }

    /// Encodes the `tx_datas` entry.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Legacy { value, gas_price, data } => rlp_list(&[value, gas_price, data], out),
            Self::Eip2930 { value, gas_price, data, access_list } => {
                out.push(EIP2930_TX_TYPE);
                rlp_list(&[value, gas_price, data, access_list], out);
            }
            Self::Eip1559 { value, max_priority_fee_per_gas, max_fee_per_gas, data, access_list } => {
                out.push(EIP1559_TX_TYPE);
                rlp_list(
                    &[value, max_priority_fee_per_gas, max_fee_per_gas, data, access_list],
                    out,
                );
            }
        }
    }

    /// Builds the EIP-2718 encoding of the full signed transaction.
    pub fn to_full_tx(
        &self,
        nonce: u64,
        gas: u64,
        to: Option<Address>,
        chain_id: u64,
        signature: SpanBatchSignature,
    ) -> Result<Vec<u8>, SpanBatchError> {
        let to = to.map_or(TxKind::Create, TxKind::Call);
        let SpanBatchSignature { v, r, s } = signature;
        let mut out = Vec::new();
        match self {
            Self::Legacy { value, gas_price, data } => {
                rlp_list(&[&nonce, gas_price, &gas, &to, value, data, &v, &r, &s], &mut out);
            }
            Self::Eip2930 { value, gas_price, data, access_list } => {
                if v > 1 {
                    return Err(SpanDecodingError::InvalidTransactionSignature.into());
                }
                out.push(EIP2930_TX_TYPE);
                rlp_list(
                    &[&chain_id, &nonce, gas_price, &gas, &to, value, data, access_list, &v, &r, &s],
                    &mut out,
                );
            }
            Self::Eip1559 { value, max_priority_fee_per_gas, max_fee_per_gas, data, access_list } => {
                if v > 1 {
                    return Err(SpanDecodingError::InvalidTransactionSignature.into());
                }
                out.push(EIP1559_TX_TYPE);
                rlp_list(
                    &[
                        &chain_id,
                        &nonce,
                        max_priority_fee_per_gas,
                        max_fee_per_gas,
                        &gas,
                        &to,
                        value,
                        data,
                        access_list,
                        &v,
                        &r,
                        &s,
                    ],
                    &mut out,
                );
            }
        }
        Ok(out)
    }

    /// Splits an EIP-2718 encoded signed transaction into its span batch columns.
    pub fn split_full_tx(mut buf: &[u8]) -> Result<SplitTransaction, SpanBatchError> {
        let first = *buf.first().ok_or_else(invalid_data)?;
        let tx_type = if first <= 0x7F {
            buf.advance(1);
            first
        } else {
            LEGACY_TX_TYPE
        };
        let mut p = list_payload(&mut buf)?;
        if !buf.is_empty() {
            return Err(invalid_data());
        }

        let split = match tx_type {
            LEGACY_TX_TYPE => {
                let nonce = field(&mut p)?;
                let gas_price = field(&mut p)?;
                let gas = field(&mut p)?;
                let to: TxKind = field(&mut p)?;
                let value = field(&mut p)?;
                let data = field(&mut p)?;
                let v: u64 = field(&mut p)?;
                let r = field(&mut p)?;
                let s = field(&mut p)?;
                let (protected, chain_id) = match v {
                    27 | 28 => (false, None),
                    v if v >= 35 => (true, Some((v - 35) / 2)),
                    _ => return Err(SpanDecodingError::InvalidTransactionSignature.into()),
                };
                SplitTransaction {
                    data: Self::Legacy { value, gas_price, data },
                    nonce,
                    gas,
                    to: to.to().copied(),
                    signature: SpanBatchSignature { v, r, s },
                    chain_id,
                    protected,
                }
            }
            EIP2930_TX_TYPE => {
                let chain_id = field(&mut p)?;
                let nonce = field(&mut p)?;
                let gas_price = field(&mut p)?;
                let gas = field(&mut p)?;
                let to: TxKind = field(&mut p)?;
                let value = field(&mut p)?;
                let data = field(&mut p)?;
                let access_list = field(&mut p)?;
                let v = field(&mut p)?;
                let r = field(&mut p)?;
                let s = field(&mut p)?;
                SplitTransaction {
                    data: Self::Eip2930 { value, gas_price, data, access_list },
                    nonce,
                    gas,
                    to: to.to().copied(),
                    signature: SpanBatchSignature { v, r, s },
                    chain_id: Some(chain_id),
                    protected: true,
                }
            }
            EIP1559_TX_TYPE => {
                let chain_id = field(&mut p)?;
                let nonce = field(&mut p)?;
                let max_priority_fee_per_gas = field(&mut p)?;
                let max_fee_per_gas = field(&mut p)?;
                let gas = field(&mut p)?;
                let to: TxKind = field(&mut p)?;
                let value = field(&mut p)?;
                let data = field(&mut p)?;
                let access_list = field(&mut p)?;
                let v = field(&mut p)?;
                let r = field(&mut p)?;
                let s = field(&mut p)?;
                SplitTransaction {
                    data: Self::Eip1559 {
                        value,
                        max_priority_fee_per_gas,
                        max_fee_per_gas,
                        data,
                        access_list,
                    },
                    nonce,
                    gas,
                    to: to.to().copied(),
                    signature: SpanBatchSignature { v, r, s },
                    chain_id: Some(chain_id),
                    protected: true,
                }
            }
            _ => return Err(SpanDecodingError::InvalidTransactionType.into()),
        };
        if !p.is_empty() {
            return Err(invalid_data());
        }
        Ok(split)
    }

    /// Returns the y-parity of the signature value `v` of a transaction of this type.
    pub const fn y_parity(&self, v: u64) -> u64 {
        match self {
            Self::Legacy { .. } => {
                if v == 27 || v == 28 {
                    v - 27
                } else {
                    (v - 35) % 2
                }
            }
            _ => v,
        }
    }
}
