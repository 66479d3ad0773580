//! This module contains the [SpanBatchTransactions] type and logic for encoding and decoding
//! transactions in a span batch.

use super::{
    read_tx_data, SpanBatchBits, SpanBatchError, SpanBatchSignature, SpanBatchTransactionData,
    SpanDecodingError, LEGACY_TX_TYPE,
};
use crate::params::MAX_SPAN_BATCH_ELEMENT_COUNT;
use alloy_primitives::{Address, Bytes, U256};
use alloy_rlp::Buf;

/// The transactions of a span batch, stored column by column.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpanBatchTransactions {
    /// The total number of transactions in a span batch. Must be manually set.
    pub total_block_tx_count: u64,
    /// The contract creation bits, standard span-batch bitlist.
    pub contract_creation_bits: SpanBatchBits,
    /// The y parity bits, standard span-batch bitlist.
    pub y_parity_bits: SpanBatchBits,
    /// The transaction signatures.
    pub tx_sigs: Vec<SpanBatchSignature>,
    /// The transaction nonces
    pub tx_nonces: Vec<u64>,
    /// The transaction gas limits.
    pub tx_gases: Vec<u64>,
    /// The `to` addresses of the non-creation transactions.
    pub tx_tos: Vec<Address>,
    /// The transaction data entries.
    pub tx_datas: Vec<Vec<u8>>,
    /// The protected bits, standard span-batch bitlist over the legacy transactions.
    pub protected_bits: SpanBatchBits,
    /// The EIP-2718 types of the transactions.
    pub tx_types: Vec<u8>,
    /// Total legacy transaction count in the span batch.
    pub legacy_tx_count: u64,
}

impl SpanBatchTransactions {
    /// Encodes the [SpanBatchTransactions] into a writer.
    pub fn encode(&self, w: &mut Vec<u8>) -> Result<(), SpanBatchError> {
        SpanBatchBits::encode(w, self.total_block_tx_count as usize, &self.contract_creation_bits)?;
        SpanBatchBits::encode(w, self.total_block_tx_count as usize, &self.y_parity_bits)?;
        for sig in &self.tx_sigs {
            w.extend_from_slice(&sig.r.to_be_bytes::<32>());
            w.extend_from_slice(&sig.s.to_be_bytes::<32>());
        }
        for to in &self.tx_tos {
            w.extend_from_slice(to.as_slice());
        }
        for data in &self.tx_datas {
            w.extend_from_slice(data);
        }
        let mut buf = [0u8; 10];
        for nonce in &self.tx_nonces {
            w.extend_from_slice(unsigned_varint::encode::u64(*nonce, &mut buf));
        }
        for gas in &self.tx_gases {
            w.extend_from_slice(unsigned_varint::encode::u64(*gas, &mut buf));
        }
        SpanBatchBits::encode(w, self.legacy_tx_count as usize, &self.protected_bits)
    }

    /// Decodes the [SpanBatchTransactions] from a reader. `total_block_tx_count` must be set.
    pub fn decode(&mut self, r: &mut &[u8]) -> Result<(), SpanBatchError> {
        self.decode_contract_creation_bits(r)?;
        self.decode_y_parity_bits(r)?;
        self.decode_tx_sigs_rs(r)?;
        self.decode_tx_tos(r)?;
        self.decode_tx_datas(r)?;
        self.tx_nonces = Self::decode_uvarints(r, self.total_block_tx_count, SpanDecodingError::TxNonces)?;
        self.tx_gases = Self::decode_uvarints(r, self.total_block_tx_count, SpanDecodingError::TxGases)?;
        self.decode_protected_bits(r)
    }

    /// Decode the contract creation bits from a reader.
    pub fn decode_contract_creation_bits(&mut self, r: &mut &[u8]) -> Result<(), SpanBatchError> {
        if self.total_block_tx_count > MAX_SPAN_BATCH_ELEMENT_COUNT {
            return Err(SpanBatchError::TooBigSpanBatchSize);
        }
        self.contract_creation_bits = SpanBatchBits::decode(r, self.total_block_tx_count as usize)?;
        Ok(())
    }

    /// Decode the y parity bits from a reader.
    pub fn decode_y_parity_bits(&mut self, r: &mut &[u8]) -> Result<(), SpanBatchError> {
        self.y_parity_bits = SpanBatchBits::decode(r, self.total_block_tx_count as usize)?;
        Ok(())
    }

    /// Decode the protected bits from a reader.
    pub fn decode_protected_bits(&mut self, r: &mut &[u8]) -> Result<(), SpanBatchError> {
        if self.legacy_tx_count > MAX_SPAN_BATCH_ELEMENT_COUNT {
            return Err(SpanBatchError::TooBigSpanBatchSize);
        }
        self.protected_bits = SpanBatchBits::decode(r, self.legacy_tx_count as usize)?;
        Ok(())
    }

    /// Decode the `r` and `s` signature values from a reader. `v` is recovered later.
    pub fn decode_tx_sigs_rs(&mut self, r: &mut &[u8]) -> Result<(), SpanBatchError> {
        let count = self.total_block_tx_count as usize;
        if r.len() < count.saturating_mul(64) {
            return Err(SpanDecodingError::TxSigs.into());
        }
        let mut sigs = Vec::with_capacity(count);
        for _ in 0..count {
            let r_val = U256::from_be_slice(&r[..32]);
            let s_val = U256::from_be_slice(&r[32..64]);
            sigs.push(SpanBatchSignature { v: 0, r: r_val, s: s_val });
            r.advance(64);
        }
        self.tx_sigs = sigs;
        Ok(())
    }

    /// Decode the `to` addresses of the non-creation transactions from a reader.
    pub fn decode_tx_tos(&mut self, r: &mut &[u8]) -> Result<(), SpanBatchError> {
        let count = self
            .total_block_tx_count
            .checked_sub(self.contract_creation_bits.count_ones())
            .ok_or(SpanBatchError::BitfieldTooLong)? as usize;
        if r.len() < count.saturating_mul(20) {
            return Err(SpanDecodingError::TxTos.into());
        }
        let mut tos = Vec::with_capacity(count);
        for _ in 0..count {
            tos.push(Address::from_slice(&r[..20]));
            r.advance(20);
        }
        self.tx_tos = tos;
        Ok(())
    }

    /// Decode the transaction data entries from a reader, counting the legacy transactions.
    pub fn decode_tx_datas(&mut self, r: &mut &[u8]) -> Result<(), SpanBatchError> {
        let mut tx_datas = Vec::with_capacity(self.total_block_tx_count as usize);
        let mut tx_types = Vec::with_capacity(self.total_block_tx_count as usize);
        let mut legacy_tx_count = 0;
        for _ in 0..self.total_block_tx_count {
            let (tx_data, tx_type) = read_tx_data(r)?;
            if tx_type == LEGACY_TX_TYPE {
                legacy_tx_count += 1;
            }
            tx_datas.push(tx_data);
            tx_types.push(tx_type);
        }
        self.tx_datas = tx_datas;
        self.tx_types = tx_types;
        self.legacy_tx_count = legacy_tx_count;
        Ok(())
    }

    fn decode_uvarints(
        r: &mut &[u8],
        count: u64,
        err: SpanDecodingError,
    ) -> Result<Vec<u64>, SpanBatchError> {
        let mut values = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (value, remaining) =
                unsigned_varint::decode::u64(r).map_err(|_| SpanBatchError::Decoding(err.clone()))?;
            values.push(value);
            *r = remaining;
        }
        Ok(values)
    }

    /// Recover the `v` values of the transaction signatures from the y-parity and protected bits.
    pub fn recover_v(&mut self, chain_id: u64) -> Result<(), SpanBatchError> {
        if self.tx_sigs.len() != self.tx_types.len() {
            return Err(SpanDecodingError::TypeSignatureLenMismatch.into());
        }
        let mut protected_bits_idx = 0;
        for (i, (sig, tx_type)) in self.tx_sigs.iter_mut().zip(&self.tx_types).enumerate() {
            let parity = self.y_parity_bits.get_bit(i).unwrap_or(0) as u64;
            sig.v = match *tx_type {
                LEGACY_TX_TYPE => {
                    let protected = self.protected_bits.get_bit(protected_bits_idx).unwrap_or(0);
                    protected_bits_idx += 1;
                    if protected == 0 {
                        27 + parity
                    } else {
                        chain_id * 2 + 35 + parity
                    }
                }
                super::EIP2930_TX_TYPE | super::EIP1559_TX_TYPE => parity,
                _ => return Err(SpanDecodingError::InvalidTransactionType.into()),
            };
        }
        Ok(())
    }

    /// Rebuilds the EIP-2718 encoded transactions. `v` values must have been recovered.
    pub fn full_txs(&self, chain_id: u64) -> Result<Vec<Vec<u8>>, SpanBatchError> {
        let invalid = || SpanBatchError::Decoding(SpanDecodingError::InvalidTransactionData);
        let mut txs = Vec::with_capacity(self.total_block_tx_count as usize);
        let mut tos = self.tx_tos.iter();
        for idx in 0..self.total_block_tx_count as usize {
            let data = SpanBatchTransactionData::decode(
                self.tx_datas.get(idx).ok_or_else(invalid)?,
            )?;
            let nonce = *self.tx_nonces.get(idx).ok_or_else(invalid)?;
            let gas = *self.tx_gases.get(idx).ok_or_else(invalid)?;
            let to = if self.contract_creation_bits.get_bit(idx).unwrap_or(0) == 0 {
                Some(*tos.next().ok_or_else(invalid)?)
            } else {
                None
            };
            let sig = *self.tx_sigs.get(idx).ok_or_else(invalid)?;
            txs.push(data.to_full_tx(nonce, gas, to, chain_id, sig)?);
        }
        Ok(txs)
    }

    /// Splits raw EIP-2718 transactions into the columns, appending them after the existing ones.
    pub fn add_txs(&mut self, txs: Vec<Bytes>, chain_id: u64) -> Result<(), SpanBatchError> {
        let offset = self.total_block_tx_count as usize;
        for (i, tx) in txs.iter().enumerate() {
            let split = SpanBatchTransactionData::split_full_tx(tx)?;
            if split.protected {
                let tx_chain_id = split
                    .chain_id
                    .ok_or(SpanBatchError::Decoding(SpanDecodingError::InvalidTransactionData))?;
                if tx_chain_id != chain_id {
                    return Err(SpanBatchError::ChainIdMismatch(tx_chain_id, chain_id));
                }
            }

            let tx_type = split.data.tx_type();
            if tx_type == LEGACY_TX_TYPE {
                self.protected_bits.set_bit(self.legacy_tx_count as usize, split.protected);
                self.legacy_tx_count += 1;
            }
            let y_parity = split.data.y_parity(split.signature.v);
            if y_parity > 1 {
                return Err(SpanDecodingError::InvalidTransactionSignature.into());
            }

            match split.to {
                Some(to) => self.tx_tos.push(to),
                None => self.contract_creation_bits.set_bit(offset + i, true),
            }
            self.y_parity_bits.set_bit(offset + i, y_parity == 1);

            let mut tx_data = Vec::new();
            split.data.encode(&mut tx_data);
            self.tx_sigs.push(split.signature);
            self.tx_nonces.push(split.nonce);
            self.tx_gases.push(split.gas);
            self.tx_datas.push(tx_data);
            self.tx_types.push(tx_type);
        }
        self.total_block_tx_count += txs.len() as u64;
        Ok(())
    }
}
